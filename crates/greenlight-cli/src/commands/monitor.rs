use std::sync::Arc;

use tracing::info;

use greenlight_core::{OrchestratorConfig, TeamName};
use greenlight_rollback::RollbackMonitor;

use crate::hooks::HookMetrics;

use super::{build_orchestrator, open_store};

/// Runs the rollback watch for every configured team until Ctrl-C.
pub async fn run(config: &OrchestratorConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let orchestrator = build_orchestrator(config, store);
    let metrics = Arc::new(HookMetrics::new(config.hooks.clone()));
    let monitor = RollbackMonitor::new(orchestrator, metrics, config.rollback.clone());

    for team_config in &config.teams {
        let team = TeamName::new(&team_config.team_name)?;
        monitor.start_monitor(&team).await;
    }
    info!(
        teams = config.teams.len(),
        interval_secs = config.rollback.poll_interval_secs,
        "rollback monitor running, Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    monitor.stop_all().await;
    Ok(())
}
