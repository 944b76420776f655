pub mod certs;
pub mod monitor;
pub mod routing;
pub mod show;
pub mod switch;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use greenlight_breaker::CircuitBreaker;
use greenlight_core::{OrchestratorConfig, TeamEnvironmentState, TeamName};
use greenlight_state::{StateStore, StoreError};
use greenlight_switch::{Orchestrator, SwitchExecutor};

use crate::certstore::active_bundle_path;
use crate::hooks::HookRuntime;
use crate::sink::FileSink;

/// Opens the state database and registers any configured team that is
/// not in it yet, so the store always covers the config's team list.
pub fn open_store(config: &OrchestratorConfig) -> anyhow::Result<StateStore> {
    let store = StateStore::open(Path::new(&config.db_path))?;
    for team_config in &config.teams {
        let team = TeamName::new(&team_config.team_name)?;
        match store.get_team(&team) {
            Ok(_) => {}
            Err(StoreError::NotFound(_)) => {
                let mut state = TeamEnvironmentState::new(
                    team,
                    team_config.active_environment,
                    team_config.port,
                );
                state.blue_green_enabled = team_config.blue_green_enabled;
                store.register_team(&state)?;
            }
            Err(e) => return Err(e.into()),
        }
    }
    certs::warn_if_rotation_needed(config);
    Ok(store)
}

pub fn build_orchestrator(config: &OrchestratorConfig, store: StateStore) -> Orchestrator {
    let runtime = Arc::new(HookRuntime::new(config.hooks.clone()));
    let breaker = CircuitBreaker::new(store.clone(), config.breaker.clone());
    let executor = SwitchExecutor::new(runtime.clone(), config.switch.clone());
    Orchestrator::new(
        store,
        breaker,
        executor,
        runtime,
        Arc::new(FileSink::new(&config.routing_file)),
        config.validator.clone(),
        active_bundle_path(&config.cert_dir),
    )
}

pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
