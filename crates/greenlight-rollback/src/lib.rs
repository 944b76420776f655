//! Rollback controller — watches post-switch health per team and
//! reverses a bad release automatically.
//!
//! A background task per team polls live metrics and evaluates the
//! trigger conditions. On breach it submits a rollback switch request
//! targeting the previously active environment; the request bypasses
//! pre-switch validation (the bad release may be causing exactly the
//! conditions that would block it) but still passes the circuit
//! breaker. A rollback that itself fails is escalated as fatal and
//! never retried automatically.

mod monitor;
mod trigger;

pub use monitor::{MetricsFuture, MetricsProvider, RollbackMonitor};
pub use trigger::{HealthMetrics, evaluate_triggers};
