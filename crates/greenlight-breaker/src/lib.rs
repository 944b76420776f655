//! greenlight-breaker — per-team circuit breaker for switch admission.
//!
//! Tracks consecutive switch failures per team and refuses further
//! attempts once a threshold is crossed, until a cooldown elapses and
//! a single trial switch proves the path healthy again:
//!
//! ```text
//! closed ──(threshold consecutive failures)──▶ open
//! open ──(cooldown elapsed, one trial admitted)──▶ half_open
//! half_open ──(trial success)──▶ closed
//! half_open ──(trial failure)──▶ open (cooldown restarts)
//! ```
//!
//! Breaker state is persisted per team through the state store's
//! compare-and-set discipline, so two concurrent failure reports can
//! never double-increment and two concurrent requests can never both
//! win the half-open trial slot. One team's breaker never affects
//! another team's eligibility.
//!
//! A trial whose holder never reports an outcome is reclaimed once its
//! deadline passes, so a process that crashed mid-trial cannot pin the
//! breaker half-open forever.

use thiserror::Error;
use tracing::{debug, info, warn};

use greenlight_core::{BreakerConfig, BreakerRecord, BreakerState, TeamName};
use greenlight_state::{StateStore, StoreError};

/// How many times `record_*` re-reads and retries a contended CAS
/// before surfacing the conflict.
const CAS_ATTEMPTS: u32 = 4;

/// How long a claimed half-open trial slot stays reserved. A holder
/// that crashes before reporting an outcome would otherwise pin the
/// breaker half-open forever; past this bound the slot is reclaimed
/// by the next admission attempt. Generous against the executor's
/// worst case of five timed steps plus the drain window.
const TRIAL_TIMEOUT_SECS: u64 = 600;

/// Result type alias for breaker operations.
pub type BreakerResult<T> = Result<T, BreakerError>;

/// Errors surfaced by breaker admission and outcome recording.
#[derive(Debug, Error)]
pub enum BreakerError {
    /// The breaker is open and the cooldown has not elapsed.
    #[error("Circuit breaker open - cooldown active ({retry_after}s remaining)")]
    Open { retry_after: u64 },

    /// A half-open trial switch is already in flight.
    #[error("Circuit breaker half-open - trial switch already in progress")]
    TrialInProgress,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a successful admission claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Breaker closed; ordinary attempt.
    Closed,
    /// Breaker was open past its cooldown; this attempt holds the
    /// single half-open trial slot and must release it if it never
    /// reaches the executor.
    HalfOpenTrial,
}

/// Per-team circuit breaker over persisted records.
#[derive(Clone)]
pub struct CircuitBreaker {
    store: StateStore,
    config: BreakerConfig,
}

impl CircuitBreaker {
    pub fn new(store: StateStore, config: BreakerConfig) -> Self {
        Self { store, config }
    }

    /// Decide whether a switch attempt for `team` may proceed.
    ///
    /// An open breaker whose cooldown has elapsed transitions to
    /// half-open here, via CAS, admitting exactly one trial: a losing
    /// concurrent request observes the conflict, re-reads half-open,
    /// and is refused.
    pub fn admit(&self, team: &TeamName, now: u64) -> BreakerResult<Admission> {
        let (record, version) = self.store.get_breaker(team)?;
        match record.state {
            BreakerState::Closed => Ok(Admission::Closed),
            BreakerState::HalfOpen => {
                if now < record.trial_deadline {
                    return Err(BreakerError::TrialInProgress);
                }
                // The previous trial holder never reported back;
                // reclaim its slot for this attempt.
                warn!(team = %team, "half-open trial abandoned; reclaiming slot");
                self.claim_trial(team, &record, version, now)
            }
            BreakerState::Open => {
                if now < record.cooldown_until {
                    debug!(
                        team = %team,
                        cooldown_until = record.cooldown_until,
                        "switch refused: breaker open"
                    );
                    return Err(BreakerError::Open {
                        retry_after: record.cooldown_until - now,
                    });
                }
                self.claim_trial(team, &record, version, now)
            }
        }
    }

    /// Takes the single half-open trial slot via CAS. A losing
    /// concurrent claimant is refused; whoever won holds the slot.
    fn claim_trial(
        &self,
        team: &TeamName,
        record: &BreakerRecord,
        version: greenlight_state::Version,
        now: u64,
    ) -> BreakerResult<Admission> {
        let trial = BreakerRecord {
            state: BreakerState::HalfOpen,
            trial_deadline: now + TRIAL_TIMEOUT_SECS,
            ..record.clone()
        };
        match self.store.compare_and_set_breaker(team, version, &trial) {
            Ok(_) => {
                info!(team = %team, "breaker half-open: trial switch admitted");
                Ok(Admission::HalfOpenTrial)
            }
            Err(StoreError::Conflict(_)) => Err(BreakerError::TrialInProgress),
            Err(e) => Err(e.into()),
        }
    }

    /// Return an admitted half-open trial slot that never reached the
    /// executor (the request was refused after admission). The breaker
    /// reverts to open with its elapsed cooldown intact, so the next
    /// attempt is admitted as a fresh trial rather than refused as
    /// "trial in progress" forever.
    pub fn release_trial(&self, team: &TeamName) -> BreakerResult<()> {
        self.update(team, |record| {
            if record.state == BreakerState::HalfOpen {
                BreakerRecord {
                    state: BreakerState::Open,
                    trial_deadline: 0,
                    ..record.clone()
                }
            } else {
                record.clone()
            }
        })?;
        Ok(())
    }

    /// Record a successful switch: failure count resets, breaker closes.
    pub fn record_success(&self, team: &TeamName) -> BreakerResult<BreakerRecord> {
        self.update(team, |record| {
            if record.state != BreakerState::Closed {
                info!(team = %team, "breaker closed after successful switch");
            }
            BreakerRecord::default()
        })
    }

    /// Record a failed switch attempt.
    ///
    /// A half-open trial failure reopens immediately; otherwise the
    /// consecutive-failure count grows and the breaker opens at the
    /// configured threshold.
    pub fn record_failure(&self, team: &TeamName, now: u64) -> BreakerResult<BreakerRecord> {
        let threshold = self.config.failure_threshold;
        let cooldown = self.config.cooldown_secs;
        self.update(team, |record| {
            let failure_count = record.failure_count + 1;
            let opens = record.state == BreakerState::HalfOpen || failure_count >= threshold;
            if opens {
                warn!(
                    team = %team,
                    failure_count,
                    cooldown_secs = cooldown,
                    "breaker opened"
                );
                BreakerRecord {
                    state: BreakerState::Open,
                    failure_count,
                    cooldown_until: now + cooldown,
                    trial_deadline: 0,
                }
            } else {
                BreakerRecord {
                    state: record.state,
                    failure_count,
                    cooldown_until: record.cooldown_until,
                    trial_deadline: 0,
                }
            }
        })
    }

    /// Current breaker record for a team (closed if never used).
    pub fn current(&self, team: &TeamName) -> BreakerResult<BreakerRecord> {
        Ok(self.store.get_breaker(team)?.0)
    }

    /// Read-modify-CAS with bounded retry. Each retry re-reads, so a
    /// transition is applied exactly once even under contention.
    fn update(
        &self,
        team: &TeamName,
        f: impl Fn(&BreakerRecord) -> BreakerRecord,
    ) -> BreakerResult<BreakerRecord> {
        let mut last_conflict = None;
        for _ in 0..CAS_ATTEMPTS {
            let (record, version) = self.store.get_breaker(team)?;
            let next = f(&record);
            match self.store.compare_and_set_breaker(team, version, &next) {
                Ok(_) => return Ok(next),
                Err(StoreError::Conflict(t)) => {
                    last_conflict = Some(StoreError::Conflict(t));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(BreakerError::Store(
            last_conflict.unwrap_or_else(|| StoreError::Conflict(team.to_string())),
        ))
    }
}
