use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use greenlight_core::{Environment, SwitchConfig, TeamName};

use crate::runtime::{EnvironmentRuntime, RuntimeFuture};

/// Named steps of a graceful cutover, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchStep {
    EnableTarget,
    BeginDrain,
    WaitDrain,
    UpdateRouting,
    DisableOld,
}

impl SwitchStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchStep::EnableTarget => "enable_target",
            SwitchStep::BeginDrain => "begin_drain",
            SwitchStep::WaitDrain => "wait_drain",
            SwitchStep::UpdateRouting => "update_routing",
            SwitchStep::DisableOld => "disable_old",
        }
    }
}

impl fmt::Display for SwitchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A step that failed (or timed out, which is treated the same) and
/// why. The sequence is not resumable; the caller reports this and
/// leaves team state untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub step: SwitchStep,
    pub cause: String,
}

/// Cooperative abort for a cutover in flight. Once a step has begun
/// it always runs to completion; the flag is only honored at step
/// boundaries, where the next step is refused with "abort requested".
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Runs the cutover sequence against an [`EnvironmentRuntime`].
///
/// Holds no team state and takes no locks: the drain wait suspends on
/// the runtime clock, so cutovers for other teams proceed while one
/// team drains.
#[derive(Clone)]
pub struct SwitchExecutor {
    runtime: Arc<dyn EnvironmentRuntime>,
    config: SwitchConfig,
}

impl SwitchExecutor {
    pub fn new(runtime: Arc<dyn EnvironmentRuntime>, config: SwitchConfig) -> Self {
        Self { runtime, config }
    }

    /// Moves `team` from `from` to `to`. Returns the failing step on
    /// the first error; no step after it is attempted.
    pub async fn execute(
        &self,
        team: &TeamName,
        from: Environment,
        to: Environment,
        abort: &AbortHandle,
    ) -> Result<(), StepFailure> {
        info!(team = %team, from = %from, to = %to, "starting environment cutover");

        self.step(abort, SwitchStep::EnableTarget, self.runtime.enable(team, to))
            .await?;
        self.step(abort, SwitchStep::BeginDrain, self.runtime.begin_drain(team, from))
            .await?;
        self.wait_drain(team, abort).await?;
        self.step(abort, SwitchStep::UpdateRouting, self.runtime.route_to(team, to))
            .await?;
        self.step(abort, SwitchStep::DisableOld, self.runtime.disable(team, from))
            .await?;

        info!(team = %team, to = %to, "cutover steps complete");
        Ok(())
    }

    /// Runs one runtime call under the per-step timeout, checking the
    /// abort flag before it begins.
    async fn step(
        &self,
        abort: &AbortHandle,
        step: SwitchStep,
        fut: RuntimeFuture<'_, ()>,
    ) -> Result<(), StepFailure> {
        self.check_abort(abort, step)?;
        debug!(step = %step, "running cutover step");
        let budget = Duration::from_secs(self.config.step_timeout_secs);
        match timeout(budget, fut).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(cause)) => {
                warn!(step = %step, cause = %cause, "cutover step failed");
                Err(StepFailure { step, cause })
            }
            Err(_) => {
                warn!(step = %step, timeout_secs = self.config.step_timeout_secs, "cutover step timed out");
                Err(StepFailure {
                    step,
                    cause: format!("timed out after {}s", self.config.step_timeout_secs),
                })
            }
        }
    }

    /// Explicit suspend point; not subject to the step timeout since
    /// its whole purpose is to wait.
    async fn wait_drain(&self, team: &TeamName, abort: &AbortHandle) -> Result<(), StepFailure> {
        self.check_abort(abort, SwitchStep::WaitDrain)?;
        debug!(team = %team, drain_secs = self.config.drain_secs, "draining in-flight work");
        tokio::time::sleep(Duration::from_secs(self.config.drain_secs)).await;
        Ok(())
    }

    fn check_abort(&self, abort: &AbortHandle, step: SwitchStep) -> Result<(), StepFailure> {
        if abort.is_aborted() {
            warn!(step = %step, "cutover aborted before step");
            return Err(StepFailure {
                step,
                cause: "abort requested".to_string(),
            });
        }
        Ok(())
    }
}
