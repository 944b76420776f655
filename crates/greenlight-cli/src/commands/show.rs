use greenlight_breaker::CircuitBreaker;
use greenlight_core::{BreakerState, OrchestratorConfig, TeamName};

use super::open_store;

pub fn run(config: &OrchestratorConfig, team: Option<&str>) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let breaker = CircuitBreaker::new(store.clone(), config.breaker.clone());

    let mut states = store.list_teams()?;
    states.sort_by(|a, b| a.team_name.cmp(&b.team_name));
    if let Some(name) = team {
        let wanted = TeamName::new(name)?;
        states.retain(|s| s.team_name == wanted);
        if states.is_empty() {
            anyhow::bail!("Team '{name}' not found");
        }
    }

    println!(
        "{:<16} {:<8} {:<8} {:<9} {:<9} {}",
        "TEAM", "ACTIVE", "ENABLED", "SWITCHES", "BREAKER", "LAST ROLLBACK"
    );
    for state in &states {
        let record = breaker.current(&state.team_name)?;
        let breaker_str = match record.state {
            BreakerState::Closed => "closed".to_string(),
            BreakerState::Open => format!("open({})", record.failure_count),
            BreakerState::HalfOpen => "half_open".to_string(),
        };
        let rollback = state
            .last_rollback_reason
            .as_deref()
            .unwrap_or("-");
        println!(
            "{:<16} {:<8} {:<8} {:<9} {:<9} {}",
            state.team_name.as_str(),
            state.active_environment.as_str(),
            if state.blue_green_enabled { "yes" } else { "no" },
            state.switch_count,
            breaker_str,
            rollback
        );
    }
    Ok(())
}
