//! greenlight-validate — pre-switch validation.
//!
//! A stateless gate over a candidate switch: every check runs, every
//! failure is collected, and the request is allowed only when all
//! checks pass. No short-circuiting — the operator sees every blocking
//! condition at once.
//!
//! Rollback-initiated switches bypass this gate entirely (the bad
//! release under rollback may itself be the cause of the failing
//! conditions); the orchestrator enforces that bypass.

use tracing::debug;

use greenlight_core::{
    Environment, EnvironmentHealth, TeamEnvironmentState, ValidationResult, ValidatorThresholds,
};

/// Run the full battery of pre-switch checks.
///
/// `now` is the caller's clock (unix seconds) used for the signal
/// staleness check; signals older than the configured limit are
/// treated as unavailable and fail validation closed.
pub fn validate_switch(
    state: &TeamEnvironmentState,
    target: Environment,
    health: &EnvironmentHealth,
    thresholds: &ValidatorThresholds,
    now: u64,
) -> ValidationResult {
    let mut reasons = Vec::new();

    if !state.blue_green_enabled {
        reasons.push(format!(
            "Blue-green deployment not enabled for team '{}'",
            state.team_name
        ));
    }

    if state.active_environment == target {
        reasons.push(format!(
            "Team '{}' is already on environment '{}'",
            state.team_name, target
        ));
    }

    let age = now.saturating_sub(health.observed_at);
    if age > thresholds.signal_max_age_secs {
        // Stale signals could hide a just-started build or a health
        // regression; treat them as unavailable.
        reasons.push(format!(
            "Health signals stale: {}s old (max: {}s)",
            age, thresholds.signal_max_age_secs
        ));
    }

    if !health.active_builds.is_empty() {
        reasons.push(format!("Active builds: {}", health.active_builds.join(", ")));
    }

    if health.queue_size > thresholds.max_queue_size {
        reasons.push(format!(
            "Queue too large: {} items (max: {})",
            health.queue_size, thresholds.max_queue_size
        ));
    }

    if !health.is_healthy() {
        reasons.push(format!("Target unhealthy: HTTP {}", health.status));
    }

    if health.cpu_pct > thresholds.max_cpu_pct {
        reasons.push(format!(
            "CPU usage too high: {}% (max: {}%)",
            health.cpu_pct, thresholds.max_cpu_pct
        ));
    }

    if health.mem_pct > thresholds.max_mem_pct {
        reasons.push(format!(
            "Memory usage too high: {}% (max: {}%)",
            health.mem_pct, thresholds.max_mem_pct
        ));
    }

    if reasons.is_empty() {
        debug!(team = %state.team_name, target = %target, "pre-switch validation passed");
        ValidationResult::pass()
    } else {
        debug!(
            team = %state.team_name,
            target = %target,
            blocking = reasons.len(),
            "pre-switch validation blocked"
        );
        ValidationResult::blocked(reasons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenlight_core::TeamName;

    const NOW: u64 = 10_000;

    fn state() -> TeamEnvironmentState {
        TeamEnvironmentState::new(TeamName::new("devops").unwrap(), Environment::Blue, 8081)
    }

    fn healthy() -> EnvironmentHealth {
        EnvironmentHealth {
            status: 200,
            active_builds: vec![],
            queue_size: 2,
            cpu_pct: 50.0,
            mem_pct: 60.0,
            observed_at: NOW,
        }
    }

    fn thresholds() -> ValidatorThresholds {
        ValidatorThresholds::default()
    }

    #[test]
    fn clean_target_passes() {
        let result = validate_switch(&state(), Environment::Green, &healthy(), &thresholds(), NOW);
        assert!(result.allowed(), "reasons: {:?}", result.reasons());
    }

    #[test]
    fn active_builds_block_with_identifiers() {
        let mut health = healthy();
        health.active_builds = vec!["test-job#1".to_string(), "deploy#42".to_string()];

        let result = validate_switch(&state(), Environment::Green, &health, &thresholds(), NOW);
        assert!(!result.allowed());
        assert_eq!(result.reasons(), &["Active builds: test-job#1, deploy#42"]);
    }

    #[test]
    fn oversized_queue_blocks_with_counts() {
        let mut health = healthy();
        health.queue_size = 10;

        let result = validate_switch(&state(), Environment::Green, &health, &thresholds(), NOW);
        assert_eq!(result.reasons(), &["Queue too large: 10 items (max: 5)"]);
    }

    #[test]
    fn queue_at_threshold_passes() {
        let mut health = healthy();
        health.queue_size = 5;

        let result = validate_switch(&state(), Environment::Green, &health, &thresholds(), NOW);
        assert!(result.allowed());
    }

    #[test]
    fn unhealthy_target_blocks_with_status() {
        let mut health = healthy();
        health.status = 503;

        let result = validate_switch(&state(), Environment::Green, &health, &thresholds(), NOW);
        assert_eq!(result.reasons(), &["Target unhealthy: HTTP 503"]);
    }

    #[test]
    fn high_cpu_blocks() {
        let mut health = healthy();
        health.cpu_pct = 90.0;

        let result = validate_switch(&state(), Environment::Green, &health, &thresholds(), NOW);
        assert_eq!(result.reasons(), &["CPU usage too high: 90% (max: 80%)"]);
    }

    #[test]
    fn high_memory_blocks() {
        let mut health = healthy();
        health.mem_pct = 95.0;

        let result = validate_switch(&state(), Environment::Green, &health, &thresholds(), NOW);
        assert_eq!(result.reasons(), &["Memory usage too high: 95% (max: 85%)"]);
    }

    #[test]
    fn both_resource_violations_reported() {
        let mut health = healthy();
        health.cpu_pct = 90.0;
        health.mem_pct = 95.0;

        let result = validate_switch(&state(), Environment::Green, &health, &thresholds(), NOW);
        assert_eq!(result.reasons().len(), 2);
        assert!(result.reasons()[0].contains("CPU usage too high"));
        assert!(result.reasons()[1].contains("Memory usage too high"));
    }

    #[test]
    fn all_failures_collected_not_short_circuited() {
        let mut health = healthy();
        health.status = 503;
        health.active_builds = vec!["job#1".to_string()];
        health.queue_size = 9;
        health.cpu_pct = 99.0;
        health.mem_pct = 99.0;

        let result = validate_switch(&state(), Environment::Green, &health, &thresholds(), NOW);
        assert_eq!(result.reasons().len(), 5);
    }

    #[test]
    fn disabled_team_blocks() {
        let mut s = state();
        s.blue_green_enabled = false;

        let result = validate_switch(&s, Environment::Green, &healthy(), &thresholds(), NOW);
        assert!(result.reasons()[0].contains("not enabled"));
    }

    #[test]
    fn switch_to_current_environment_blocks() {
        let result = validate_switch(&state(), Environment::Blue, &healthy(), &thresholds(), NOW);
        assert!(result.reasons()[0].contains("already on environment 'blue'"));
    }

    #[test]
    fn stale_signals_fail_closed() {
        let mut health = healthy();
        health.observed_at = NOW - 45; // Default limit is 30s.

        let result = validate_switch(&state(), Environment::Green, &health, &thresholds(), NOW);
        assert_eq!(result.reasons(), &["Health signals stale: 45s old (max: 30s)"]);
    }

    #[test]
    fn fresh_signals_pass_staleness() {
        let mut health = healthy();
        health.observed_at = NOW - 30; // Exactly at the limit.

        let result = validate_switch(&state(), Environment::Green, &health, &thresholds(), NOW);
        assert!(result.allowed());
    }
}
