//! greenlight-state — durable team state for the switch orchestrator.
//!
//! Backed by [redb](https://docs.rs/redb). Each team has a versioned
//! environment record and a versioned circuit-breaker record; all
//! mutation goes through compare-and-set keyed on the record version,
//! so concurrent switch attempts for the same team serialize at the
//! store and losers see a conflict instead of a lost update.
//!
//! A structurally invalid persisted record fails closed: reads for
//! that team return [`StoreError::Corrupt`] until an operator restores
//! it from a snapshot. The store never fabricates default state —
//! doing so could mask an unintended environment flip.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StoreError, StoreResult};
pub use store::{StateStore, Version};
