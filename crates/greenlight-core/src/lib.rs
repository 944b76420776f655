//! greenlight-core — shared domain types and configuration.
//!
//! Defines the vocabulary of the blue-green switch orchestrator:
//! environments, team identities, switch requests and outcomes, and
//! the explicit, immutable [`OrchestratorConfig`] that every component
//! receives at construction instead of reading ambient globals.

pub mod config;
pub mod types;

pub use config::{
    BreakerConfig, HooksConfig, OrchestratorConfig, RollbackConfig, SwitchConfig, TeamConfig,
    ValidatorThresholds,
};
pub use types::*;
