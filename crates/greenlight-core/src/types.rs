//! Domain types shared across Greenlight crates.
//!
//! Environments are a closed two-value enum and team identity is a
//! validated opaque type — invalid values cannot propagate past this
//! boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the two parallel deployments a team owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Blue,
    Green,
}

impl Environment {
    /// The peer environment.
    pub fn other(self) -> Self {
        match self {
            Environment::Blue => Environment::Green,
            Environment::Green => Environment::Blue,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Blue => "blue",
            Environment::Green => "green",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blue" => Ok(Environment::Blue),
            "green" => Ok(Environment::Green),
            other => Err(DomainError::InvalidEnvironment(other.to_string())),
        }
    }
}

/// Validated team identifier.
///
/// Non-empty, lowercase alphanumeric plus `-` and `_`. Constructed
/// only through [`TeamName::new`], so a held value is always valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TeamName(String);

impl TeamName {
    pub fn new(name: &str) -> Result<Self, DomainError> {
        if name.is_empty() {
            return Err(DomainError::InvalidTeamName("empty".to_string()));
        }
        let valid = name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !valid {
            return Err(DomainError::InvalidTeamName(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TeamName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TeamName::new(s)
    }
}

impl TryFrom<String> for TeamName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TeamName::new(&value)
    }
}

impl From<TeamName> for String {
    fn from(value: TeamName) -> Self {
        value.0
    }
}

/// Errors constructing domain values.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid environment: {0} (must be 'blue' or 'green')")]
    InvalidEnvironment(String),

    #[error("invalid team name: {0}")]
    InvalidTeamName(String),
}

/// Persisted per-team environment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamEnvironmentState {
    pub team_name: TeamName,
    pub active_environment: Environment,
    pub blue_green_enabled: bool,
    /// Incremented exactly once per completed switch, rollbacks included.
    pub switch_count: u64,
    /// Unix timestamp (seconds) of the last successful switch.
    pub last_switch_time: Option<u64>,
    /// Set only by a successful rollback switch.
    pub last_rollback_time: Option<u64>,
    pub last_rollback_reason: Option<String>,
    /// Assigned frontend port for this team's pair of environments.
    pub port: u16,
}

impl TeamEnvironmentState {
    /// Fresh record for a newly registered team.
    pub fn new(team_name: TeamName, active_environment: Environment, port: u16) -> Self {
        Self {
            team_name,
            active_environment,
            blue_green_enabled: true,
            switch_count: 0,
            last_switch_time: None,
            last_rollback_time: None,
            last_rollback_reason: None,
            port,
        }
    }
}

/// Live signals reported by the Environment Runtime for one
/// environment (spec'd health endpoint plus build/queue/resource data).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentHealth {
    /// HTTP status of the environment's health endpoint.
    pub status: u16,
    /// In-progress builds as `job#build` identifiers.
    pub active_builds: Vec<String>,
    /// Pending work-queue length.
    pub queue_size: u32,
    /// CPU utilization, percent.
    pub cpu_pct: f64,
    /// Memory utilization, percent.
    pub mem_pct: f64,
    /// Unix timestamp (seconds) when these signals were sampled.
    pub observed_at: u64,
}

impl EnvironmentHealth {
    pub fn is_healthy(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Circuit breaker admission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Persisted per-team circuit breaker record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerRecord {
    pub state: BreakerState,
    /// Consecutive failures; reset to zero on any success.
    pub failure_count: u32,
    /// Unix timestamp (seconds); meaningful only while open.
    pub cooldown_until: u64,
    /// Unix timestamp (seconds) after which an in-flight half-open
    /// trial counts as abandoned and its slot may be reclaimed;
    /// meaningful only while half-open.
    #[serde(default)]
    pub trial_deadline: u64,
}

impl Default for BreakerRecord {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            cooldown_until: 0,
            trial_deadline: 0,
        }
    }
}

/// Who asked for a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchInitiator {
    /// Operator- or API-driven switch; fully validated.
    UserRequested,
    /// Emitted by the rollback controller; skips pre-switch validation
    /// but still passes through the circuit breaker.
    RollbackTriggered,
}

/// One switch attempt, created per invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchRequest {
    pub team: TeamName,
    pub target: Environment,
    pub initiator: SwitchInitiator,
    pub reason: String,
}

impl SwitchRequest {
    pub fn user(team: TeamName, target: Environment, reason: &str) -> Self {
        Self {
            team,
            target,
            initiator: SwitchInitiator::UserRequested,
            reason: reason.to_string(),
        }
    }

    pub fn rollback(team: TeamName, target: Environment, reason: &str) -> Self {
        Self {
            team,
            target,
            initiator: SwitchInitiator::RollbackTriggered,
            reason: reason.to_string(),
        }
    }

    pub fn is_rollback(&self) -> bool {
        self.initiator == SwitchInitiator::RollbackTriggered
    }
}

/// Verdict of the pre-switch validator.
///
/// The verdict and the reason list cannot disagree: an allowed result
/// has no reasons, a blocked one has at least one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    reasons: Vec<String>,
}

impl ValidationResult {
    /// All checks passed.
    pub fn pass() -> Self {
        Self { reasons: Vec::new() }
    }

    /// One or more checks failed; reasons preserve check order.
    pub fn blocked(reasons: Vec<String>) -> Self {
        debug_assert!(!reasons.is_empty());
        Self { reasons }
    }

    pub fn allowed(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }
}

/// Terminal result of one switch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SwitchOutcome {
    /// The cutover completed and the state store was updated.
    Success { state: TeamEnvironmentState },
    /// Pre-switch validation or breaker admission refused the request.
    Blocked { reasons: Vec<String> },
    /// A step of the executor sequence failed; state unchanged.
    Failed { step: String, cause: String },
    /// Lost a compare-and-set race; caller must re-read and decide.
    Conflict,
}
