//! Shell-hook adapters to the deployment substrate.
//!
//! The orchestrator's seams ([`EnvironmentRuntime`], `MetricsProvider`)
//! are driven here by operator-configured shell commands, the same way
//! the surrounding infrastructure scripts manage the environments.
//! Each hook receives `GREENLIGHT_TEAM` and `GREENLIGHT_ENV`; an unset
//! lifecycle hook is a no-op, while unset `health`/`metrics` hooks
//! fail closed since there is nothing to decide on without signals.

use tokio::process::Command;
use tracing::debug;

use greenlight_core::{Environment, EnvironmentHealth, HooksConfig, TeamName};
use greenlight_rollback::{HealthMetrics, MetricsFuture, MetricsProvider};
use greenlight_switch::{EnvironmentRuntime, RuntimeFuture};

/// Runs one hook command through `sh -c`, returning stdout.
async fn run_hook(cmd: &str, team: &TeamName, env: Environment) -> Result<String, String> {
    debug!(team = %team, env = %env, cmd, "running hook");
    let output = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .env("GREENLIGHT_TEAM", team.as_str())
        .env("GREENLIGHT_ENV", env.as_str())
        .output()
        .await
        .map_err(|e| format!("failed to spawn hook: {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "hook exited with {}: {}",
            output.status,
            stderr.trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

async fn run_optional(cmd: Option<&str>, team: &TeamName, env: Environment) -> Result<(), String> {
    match cmd {
        Some(cmd) => run_hook(cmd, team, env).await.map(|_| ()),
        None => Ok(()),
    }
}

/// [`EnvironmentRuntime`] backed by the configured shell hooks.
pub struct HookRuntime {
    hooks: HooksConfig,
}

impl HookRuntime {
    pub fn new(hooks: HooksConfig) -> Self {
        Self { hooks }
    }
}

impl EnvironmentRuntime for HookRuntime {
    fn enable<'a>(&'a self, team: &'a TeamName, env: Environment) -> RuntimeFuture<'a, ()> {
        Box::pin(run_optional(self.hooks.enable.as_deref(), team, env))
    }

    fn begin_drain<'a>(&'a self, team: &'a TeamName, env: Environment) -> RuntimeFuture<'a, ()> {
        Box::pin(run_optional(self.hooks.drain.as_deref(), team, env))
    }

    fn route_to<'a>(&'a self, team: &'a TeamName, env: Environment) -> RuntimeFuture<'a, ()> {
        Box::pin(run_optional(self.hooks.route.as_deref(), team, env))
    }

    fn disable<'a>(&'a self, team: &'a TeamName, env: Environment) -> RuntimeFuture<'a, ()> {
        Box::pin(run_optional(self.hooks.disable.as_deref(), team, env))
    }

    fn health<'a>(
        &'a self,
        team: &'a TeamName,
        env: Environment,
    ) -> RuntimeFuture<'a, EnvironmentHealth> {
        Box::pin(async move {
            let cmd = self
                .hooks
                .health
                .as_deref()
                .ok_or_else(|| "no health hook configured".to_string())?;
            let stdout = run_hook(cmd, team, env).await?;
            serde_json::from_str(&stdout).map_err(|e| format!("invalid health JSON: {e}"))
        })
    }
}

/// `MetricsProvider` backed by the configured metrics hook. The hook
/// samples the team's active environment, so no environment argument
/// is passed through.
pub struct HookMetrics {
    hooks: HooksConfig,
}

impl HookMetrics {
    pub fn new(hooks: HooksConfig) -> Self {
        Self { hooks }
    }
}

impl MetricsProvider for HookMetrics {
    fn metrics<'a>(&'a self, team: &'a TeamName) -> MetricsFuture<'a> {
        Box::pin(async move {
            let cmd = self
                .hooks
                .metrics
                .as_deref()
                .ok_or_else(|| "no metrics hook configured".to_string())?;
            debug!(team = %team, cmd, "running metrics hook");
            let output = Command::new("sh")
                .arg("-c")
                .arg(cmd)
                .env("GREENLIGHT_TEAM", team.as_str())
                .output()
                .await
                .map_err(|e| format!("failed to spawn hook: {e}"))?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(format!(
                    "hook exited with {}: {}",
                    output.status,
                    stderr.trim()
                ));
            }
            let stdout = String::from_utf8_lossy(&output.stdout);
            serde_json::from_str::<HealthMetrics>(&stdout)
                .map_err(|e| format!("invalid metrics JSON: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team() -> TeamName {
        TeamName::new("devops").unwrap()
    }

    #[tokio::test]
    async fn unset_lifecycle_hook_is_a_no_op() {
        let runtime = HookRuntime::new(HooksConfig::default());
        assert!(runtime.enable(&team(), Environment::Green).await.is_ok());
        assert!(runtime.disable(&team(), Environment::Blue).await.is_ok());
    }

    #[tokio::test]
    async fn hook_receives_team_and_environment() {
        let runtime = HookRuntime::new(HooksConfig {
            enable: Some(r#"test "$GREENLIGHT_TEAM" = devops -a "$GREENLIGHT_ENV" = green"#.to_string()),
            ..HooksConfig::default()
        });
        assert!(runtime.enable(&team(), Environment::Green).await.is_ok());
    }

    #[tokio::test]
    async fn failing_hook_reports_stderr() {
        let runtime = HookRuntime::new(HooksConfig {
            enable: Some("echo boom >&2; exit 3".to_string()),
            ..HooksConfig::default()
        });
        let err = runtime.enable(&team(), Environment::Green).await.unwrap_err();
        assert!(err.contains("boom"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn health_hook_parses_json() {
        let runtime = HookRuntime::new(HooksConfig {
            health: Some(
                r#"echo '{"status":200,"active_builds":[],"queue_size":1,"cpu_pct":12.5,"mem_pct":40.0,"observed_at":1700000000}'"#
                    .to_string(),
            ),
            ..HooksConfig::default()
        });
        let health = runtime.health(&team(), Environment::Green).await.unwrap();
        assert_eq!(health.status, 200);
        assert_eq!(health.queue_size, 1);
        assert_eq!(health.observed_at, 1_700_000_000);
    }

    #[tokio::test]
    async fn unset_health_hook_fails_closed() {
        let runtime = HookRuntime::new(HooksConfig::default());
        let err = runtime.health(&team(), Environment::Green).await.unwrap_err();
        assert_eq!(err, "no health hook configured");
    }

    #[tokio::test]
    async fn metrics_hook_parses_json() {
        let metrics = HookMetrics::new(HooksConfig {
            metrics: Some(
                r#"echo '{"error_rate":0.02,"avg_response_ms":300,"availability":0.99}'"#
                    .to_string(),
            ),
            ..HooksConfig::default()
        });
        let sample = metrics.metrics(&team()).await.unwrap();
        assert_eq!(sample.avg_response_ms, 300);
    }

    #[tokio::test]
    async fn garbage_health_output_is_an_error() {
        let runtime = HookRuntime::new(HooksConfig {
            health: Some("echo not-json".to_string()),
            ..HooksConfig::default()
        });
        let err = runtime.health(&team(), Environment::Green).await.unwrap_err();
        assert!(err.starts_with("invalid health JSON"));
    }
}
