use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use greenlight_breaker::{Admission, BreakerError, CircuitBreaker};
use greenlight_core::{
    SwitchOutcome, SwitchRequest, TeamEnvironmentState, ValidationResult, ValidatorThresholds,
};
use greenlight_routing::RoutingPlan;
use greenlight_state::{StateStore, StoreError, Version};
use greenlight_validate::validate_switch;

use crate::executor::{AbortHandle, SwitchExecutor};
use crate::runtime::EnvironmentRuntime;

pub type SwitchResult<T> = Result<T, SwitchError>;

/// Infrastructure failures. Request-level refusals (validation,
/// breaker, conflicts) are not errors; they come back as
/// [`SwitchOutcome`] variants.
#[derive(Debug, Error)]
pub enum SwitchError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Hands a freshly generated routing plan to the traffic router.
/// Called strictly after the state-store commit, so applied routing
/// always reflects committed truth.
pub trait RoutingSink: Send + Sync {
    fn apply(&self, plan: &RoutingPlan) -> Result<(), String>;
}

/// Ties admission, validation, execution, the commit and routing
/// regeneration together for one switch request.
#[derive(Clone)]
pub struct Orchestrator {
    store: StateStore,
    breaker: CircuitBreaker,
    executor: SwitchExecutor,
    runtime: Arc<dyn EnvironmentRuntime>,
    routing: Arc<dyn RoutingSink>,
    thresholds: ValidatorThresholds,
    cert_bundle_path: String,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: StateStore,
        breaker: CircuitBreaker,
        executor: SwitchExecutor,
        runtime: Arc<dyn EnvironmentRuntime>,
        routing: Arc<dyn RoutingSink>,
        thresholds: ValidatorThresholds,
        cert_bundle_path: String,
    ) -> Self {
        Self {
            store,
            breaker,
            executor,
            runtime,
            routing,
            thresholds,
            cert_bundle_path,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run one switch request end to end.
    ///
    /// Rollback-initiated requests skip validation but not breaker
    /// admission: an open breaker blocks even an emergency rollback,
    /// so a flapping release cannot ping-pong environments.
    pub async fn switch(
        &self,
        request: &SwitchRequest,
        abort: &AbortHandle,
        now: u64,
    ) -> SwitchResult<SwitchOutcome> {
        let (state, version) = self.store.get_team(&request.team)?;

        let admission = match self.breaker.admit(&request.team, now) {
            Ok(admission) => admission,
            Err(refusal @ (BreakerError::Open { .. } | BreakerError::TrialInProgress)) => {
                info!(team = %request.team, reason = %refusal, "switch refused by breaker");
                return Ok(SwitchOutcome::Blocked {
                    reasons: vec![refusal.to_string()],
                });
            }
            Err(BreakerError::Store(e)) => return Err(e.into()),
        };

        if !request.is_rollback() {
            let verdict = self.validate_admitted(&state, request, now).await;
            if !verdict.allowed() {
                info!(
                    team = %request.team,
                    reasons = ?verdict.reasons(),
                    "switch blocked by validation"
                );
                self.release_if_trial(request, admission);
                return Ok(SwitchOutcome::Blocked {
                    reasons: verdict.reasons().to_vec(),
                });
            }
        }

        let from = state.active_environment;
        if let Err(failure) = self
            .executor
            .execute(&request.team, from, request.target, abort)
            .await
        {
            if let Err(e) = self.breaker.record_failure(&request.team, now) {
                error!(team = %request.team, error = %e, "failed to record breaker failure");
            }
            return Ok(SwitchOutcome::Failed {
                step: failure.step.as_str().to_string(),
                cause: failure.cause,
            });
        }

        match self.commit(request, &state, version, now) {
            Ok(committed) => {
                if let Err(e) = self.breaker.record_success(&request.team) {
                    error!(team = %request.team, error = %e, "failed to record breaker success");
                }
                self.regenerate_routing();
                info!(
                    team = %request.team,
                    active = %committed.active_environment,
                    switch_count = committed.switch_count,
                    "switch committed"
                );
                Ok(SwitchOutcome::Success { state: committed })
            }
            Err(StoreError::Conflict(_)) => {
                // Lost the per-team serialization race. Contention is
                // not a cutover-path failure, so the breaker is not
                // fed; the caller re-reads and decides.
                warn!(team = %request.team, "switch commit lost a concurrent update");
                self.release_if_trial(request, admission);
                Ok(SwitchOutcome::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Validation verdict for a request without executing it. Used by
    /// the operator-facing dry-run path.
    pub async fn validate_only(
        &self,
        request: &SwitchRequest,
        now: u64,
    ) -> SwitchResult<ValidationResult> {
        let (state, _) = self.store.get_team(&request.team)?;
        Ok(self.validate_admitted(&state, request, now).await)
    }

    /// Current routing plan from committed team states.
    pub fn routing_plan(&self) -> SwitchResult<RoutingPlan> {
        let states = self.store.list_teams()?;
        Ok(greenlight_routing::generate(&states, &self.cert_bundle_path))
    }

    async fn validate_admitted(
        &self,
        state: &TeamEnvironmentState,
        request: &SwitchRequest,
        now: u64,
    ) -> ValidationResult {
        match self.runtime.health(&request.team, request.target).await {
            Ok(health) => validate_switch(state, request.target, &health, &self.thresholds, now),
            // No signals means no basis to allow; fail closed.
            Err(cause) => ValidationResult::blocked(vec![format!(
                "Health signals unavailable: {cause}"
            )]),
        }
    }

    /// A half-open trial slot claimed by a request that never reached
    /// the executor must be handed back, or the breaker would report
    /// "trial in progress" forever.
    fn release_if_trial(&self, request: &SwitchRequest, admission: Admission) {
        if admission == Admission::HalfOpenTrial {
            if let Err(e) = self.breaker.release_trial(&request.team) {
                error!(team = %request.team, error = %e, "failed to release breaker trial slot");
            }
        }
    }

    fn commit(
        &self,
        request: &SwitchRequest,
        state: &TeamEnvironmentState,
        version: Version,
        now: u64,
    ) -> Result<TeamEnvironmentState, StoreError> {
        let mut next = state.clone();
        next.active_environment = request.target;
        next.switch_count += 1;
        next.last_switch_time = Some(now);
        if request.is_rollback() {
            next.last_rollback_time = Some(now);
            next.last_rollback_reason = Some(request.reason.clone());
        }
        self.store.compare_and_set_team(&request.team, version, &next)?;
        Ok(next)
    }

    fn regenerate_routing(&self) {
        let plan = match self.routing_plan() {
            Ok(plan) => plan,
            Err(e) => {
                error!(error = %e, "routing regeneration skipped: team listing failed");
                return;
            }
        };
        if let Err(cause) = self.routing.apply(&plan) {
            // The switch itself is committed; routing now lags state
            // until the next successful apply.
            error!(cause = %cause, "routing apply failed");
        }
    }
}
