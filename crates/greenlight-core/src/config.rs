//! Orchestrator configuration.
//!
//! One immutable value with named fields, loaded once and injected
//! into each component at construction. Thresholds default to the
//! operational values the switch protocol was tuned against.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::Environment;

/// Top-level configuration for the switch orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Base domain for routing and certificates (e.g. "company.com").
    pub base_domain: String,
    /// Path to the state database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Where the rendered routing configuration is written.
    #[serde(default = "default_routing_file")]
    pub routing_file: String,
    /// Directory holding the active/staged/backup certificate bundles.
    #[serde(default = "default_cert_dir")]
    pub cert_dir: String,
    #[serde(default)]
    pub validator: ValidatorThresholds,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub switch: SwitchConfig,
    #[serde(default)]
    pub rollback: RollbackConfig,
    #[serde(default)]
    pub hooks: HooksConfig,
    /// Teams managed by this orchestrator.
    #[serde(default)]
    pub teams: Vec<TeamConfig>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            base_domain: String::new(),
            db_path: default_db_path(),
            routing_file: default_routing_file(),
            cert_dir: default_cert_dir(),
            validator: ValidatorThresholds::default(),
            breaker: BreakerConfig::default(),
            switch: SwitchConfig::default(),
            rollback: RollbackConfig::default(),
            hooks: HooksConfig::default(),
            teams: Vec::new(),
        }
    }
}

fn default_db_path() -> String {
    "greenlight.redb".to_string()
}

fn default_routing_file() -> String {
    "haproxy.cfg".to_string()
}

fn default_cert_dir() -> String {
    "certs".to_string()
}

/// Shell commands the operator surface runs against the deployment
/// substrate. Each receives the team and environment through
/// `GREENLIGHT_TEAM` / `GREENLIGHT_ENV`; an unset command is a no-op,
/// except `health` and `metrics` which must produce JSON on stdout
/// and fail closed when unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HooksConfig {
    pub enable: Option<String>,
    pub disable: Option<String>,
    pub drain: Option<String>,
    pub route: Option<String>,
    pub health: Option<String>,
    pub metrics: Option<String>,
    /// Issues cert and key for the SAN list in `GREENLIGHT_DOMAINS`,
    /// writing `cert.pem` and `key.pem` into the cert directory.
    pub issue_cert: Option<String>,
    /// Checks the staged bundle; non-zero exit fails rotation.
    pub verify_cert: Option<String>,
}

/// Pre-switch validation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorThresholds {
    /// Maximum pending work-queue length on the target.
    pub max_queue_size: u32,
    /// Maximum CPU utilization on the target, percent.
    pub max_cpu_pct: f64,
    /// Maximum memory utilization on the target, percent.
    pub max_mem_pct: f64,
    /// Health signals older than this are treated as unavailable.
    pub signal_max_age_secs: u64,
}

impl Default for ValidatorThresholds {
    fn default() -> Self {
        Self {
            max_queue_size: 5,
            max_cpu_pct: 80.0,
            max_mem_pct: 85.0,
            signal_max_age_secs: 30,
        }
    }
}

/// Circuit breaker tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,
    /// Cooldown after opening, seconds.
    pub cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 1800,
        }
    }
}

/// Switch executor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchConfig {
    /// How long to let in-flight work drain before disabling the old
    /// environment, seconds.
    pub drain_secs: u64,
    /// Timeout applied to each individual step, seconds.
    pub step_timeout_secs: u64,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            drain_secs: 30,
            step_timeout_secs: 60,
        }
    }
}

/// Rollback trigger thresholds and monitor cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackConfig {
    /// Trailing-window error rate above this triggers rollback (0.0–1.0).
    pub max_error_rate: f64,
    /// Average response time above this triggers rollback, milliseconds.
    pub max_response_ms: u64,
    /// Availability below this triggers rollback (0.0–1.0).
    pub min_availability: f64,
    /// Monitor polling interval, seconds.
    pub poll_interval_secs: u64,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        Self {
            max_error_rate: 0.05,
            max_response_ms: 5000,
            min_availability: 0.95,
            poll_interval_secs: 30,
        }
    }
}

/// Static configuration for one team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    pub team_name: String,
    pub blue_green_enabled: bool,
    pub active_environment: Environment,
    pub port: u16,
}

impl OrchestratorConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: OrchestratorConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Look up a team's static configuration by name.
    pub fn team(&self, name: &str) -> Option<&TeamConfig> {
        self.teams.iter().find(|t| t.team_name == name)
    }

    /// Validate a team's configuration completeness.
    ///
    /// Required: known team, blue-green enabled, a port assignment.
    /// Returns the list of problems, empty when valid.
    pub fn validate_team(&self, name: &str) -> Vec<String> {
        let mut problems = Vec::new();
        match self.team(name) {
            None => problems.push(format!("Team '{name}' not found in configuration")),
            Some(team) => {
                if !team.blue_green_enabled {
                    problems.push(format!(
                        "Team '{name}' does not have blue-green deployment enabled"
                    ));
                }
                if team.port == 0 {
                    problems.push(format!("Team '{name}' has no port assignment"));
                } else if team.port == u16::MAX {
                    // Green always listens one port above blue.
                    problems.push(format!(
                        "Team '{name}' port {} leaves no room for the green listener",
                        team.port
                    ));
                }
            }
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_operational_values() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.validator.max_queue_size, 5);
        assert_eq!(cfg.validator.max_cpu_pct, 80.0);
        assert_eq!(cfg.validator.max_mem_pct, 85.0);
        assert_eq!(cfg.breaker.failure_threshold, 3);
        assert_eq!(cfg.breaker.cooldown_secs, 1800);
        assert_eq!(cfg.switch.drain_secs, 30);
        assert_eq!(cfg.rollback.max_error_rate, 0.05);
        assert_eq!(cfg.rollback.max_response_ms, 5000);
        assert_eq!(cfg.rollback.min_availability, 0.95);
    }

    #[test]
    fn parses_minimal_toml() {
        let toml_str = r#"
base_domain = "company.com"

[[teams]]
team_name = "devops"
blue_green_enabled = true
active_environment = "blue"
port = 8081

[[teams]]
team_name = "qa"
blue_green_enabled = true
active_environment = "green"
port = 8082
"#;
        let cfg: OrchestratorConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.base_domain, "company.com");
        assert_eq!(cfg.teams.len(), 2);
        assert_eq!(cfg.team("qa").unwrap().active_environment, Environment::Green);
        // Omitted sections fall back to defaults.
        assert_eq!(cfg.validator.max_queue_size, 5);
        assert_eq!(cfg.db_path, "greenlight.redb");
        assert_eq!(cfg.routing_file, "haproxy.cfg");
        assert!(cfg.hooks.enable.is_none());
    }

    #[test]
    fn toml_roundtrip() {
        let mut cfg = OrchestratorConfig::default();
        cfg.base_domain = "test.local".to_string();
        cfg.teams.push(TeamConfig {
            team_name: "devops".to_string(),
            blue_green_enabled: true,
            active_environment: Environment::Blue,
            port: 8081,
        });

        let rendered = cfg.to_toml_string().unwrap();
        let back: OrchestratorConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(back.base_domain, "test.local");
        assert_eq!(back.teams.len(), 1);
    }

    #[test]
    fn validate_team_reports_all_problems() {
        let mut cfg = OrchestratorConfig::default();
        cfg.teams.push(TeamConfig {
            team_name: "ma".to_string(),
            blue_green_enabled: false,
            active_environment: Environment::Blue,
            port: 0,
        });

        let problems = cfg.validate_team("ma");
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("blue-green deployment enabled"));
        assert!(problems[1].contains("port assignment"));

        assert_eq!(cfg.validate_team("nope").len(), 1);
    }

    #[test]
    fn validate_team_rejects_top_of_range_port() {
        let mut cfg = OrchestratorConfig::default();
        cfg.teams.push(TeamConfig {
            team_name: "edge".to_string(),
            blue_green_enabled: true,
            active_environment: Environment::Blue,
            port: u16::MAX,
        });

        let problems = cfg.validate_team("edge");
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("no room for the green listener"));
    }

    #[test]
    fn validate_team_passes_complete_config() {
        let mut cfg = OrchestratorConfig::default();
        cfg.teams.push(TeamConfig {
            team_name: "devops".to_string(),
            blue_green_enabled: true,
            active_environment: Environment::Blue,
            port: 8081,
        });
        assert!(cfg.validate_team("devops").is_empty());
    }
}
