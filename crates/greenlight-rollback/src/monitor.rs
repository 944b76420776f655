use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use greenlight_core::{RollbackConfig, SwitchOutcome, SwitchRequest, TeamName};
use greenlight_state::StoreError;
use greenlight_switch::{AbortHandle, Orchestrator};

use crate::trigger::{HealthMetrics, evaluate_triggers};

/// Boxed future returned by [`MetricsProvider::metrics`].
pub type MetricsFuture<'a> =
    Pin<Box<dyn Future<Output = Result<HealthMetrics, String>> + Send + 'a>>;

/// Source of trailing-window metrics for a team's active environment.
/// The real implementation scrapes the metrics endpoint; tests script
/// one in memory.
pub trait MetricsProvider: Send + Sync {
    fn metrics<'a>(&'a self, team: &'a TeamName) -> MetricsFuture<'a>;
}

/// Per-team monitor state.
struct MonitorSlot {
    /// Handle to the background watch task.
    handle: JoinHandle<()>,
    /// Shutdown signal for this monitor.
    shutdown_tx: watch::Sender<bool>,
}

/// Manages rollback watch tasks for all teams with switch history.
pub struct RollbackMonitor {
    orchestrator: Orchestrator,
    metrics: Arc<dyn MetricsProvider>,
    config: RollbackConfig,
    /// Active monitors: team → slot.
    monitors: Arc<RwLock<HashMap<TeamName, MonitorSlot>>>,
}

impl RollbackMonitor {
    pub fn new(
        orchestrator: Orchestrator,
        metrics: Arc<dyn MetricsProvider>,
        config: RollbackConfig,
    ) -> Self {
        Self {
            orchestrator,
            metrics,
            config,
            monitors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start watching a team. Replaces an existing watch for the same
    /// team. The task exits on its own after the first rollback
    /// attempt, successful or not: a failed rollback must reach an
    /// operator instead of being retried into oscillation.
    pub async fn start_monitor(&self, team: &TeamName) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let team_owned = team.clone();
        let orchestrator = self.orchestrator.clone();
        let metrics = self.metrics.clone();
        let config = self.config.clone();

        let handle = tokio::spawn(async move {
            run_rollback_loop(&team_owned, orchestrator, metrics, &config, shutdown_rx).await;
        });

        let mut monitors = self.monitors.write().await;
        if let Some(old) = monitors.insert(
            team.clone(),
            MonitorSlot {
                handle,
                shutdown_tx,
            },
        ) {
            // Stop the old watch if one was running.
            let _ = old.shutdown_tx.send(true);
            old.handle.abort();
        }

        info!(team = %team, "rollback monitor started");
    }

    /// Stop watching a team.
    pub async fn stop_monitor(&self, team: &TeamName) {
        let mut monitors = self.monitors.write().await;
        if let Some(slot) = monitors.remove(team) {
            let _ = slot.shutdown_tx.send(true);
            slot.handle.abort();
            info!(team = %team, "rollback monitor stopped");
        }
    }

    /// Stop all watches (for graceful shutdown).
    pub async fn stop_all(&self) {
        let mut monitors = self.monitors.write().await;
        for (team, slot) in monitors.drain() {
            let _ = slot.shutdown_tx.send(true);
            slot.handle.abort();
            debug!(team = %team, "rollback monitor stopped");
        }
        info!("all rollback monitors stopped");
    }

    pub async fn active_monitors(&self) -> Vec<TeamName> {
        let monitors = self.monitors.read().await;
        monitors.keys().cloned().collect()
    }

    pub async fn is_monitoring(&self, team: &TeamName) -> bool {
        let monitors = self.monitors.read().await;
        monitors.contains_key(team)
    }

    /// One evaluation pass for a team, exactly what the background
    /// loop runs per tick. Returns the switch outcome when a rollback
    /// was attempted, `None` when nothing triggered.
    pub async fn check_team(&self, team: &TeamName, now: u64) -> Option<SwitchOutcome> {
        check_team(team, &self.orchestrator, self.metrics.as_ref(), &self.config, now).await
    }
}

/// The watch loop for a single team.
async fn run_rollback_loop(
    team: &TeamName,
    orchestrator: Orchestrator,
    metrics: Arc<dyn MetricsProvider>,
    config: &RollbackConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(team = %team, interval_secs = config.poll_interval_secs, "rollback watch starting");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(config.poll_interval_secs)) => {
                let attempted =
                    check_team(team, &orchestrator, metrics.as_ref(), config, epoch_secs()).await;
                if attempted.is_some() {
                    // One attempt per watch, then hand off to the
                    // operator or to a fresh watch on the next switch.
                    break;
                }
            }
            _ = shutdown.changed() => {
                debug!(team = %team, "rollback watch shutting down");
                break;
            }
        }
    }
}

async fn check_team(
    team: &TeamName,
    orchestrator: &Orchestrator,
    metrics: &dyn MetricsProvider,
    config: &RollbackConfig,
    now: u64,
) -> Option<SwitchOutcome> {
    let state = match orchestrator.store().get_team(team) {
        Ok((state, _)) => state,
        Err(StoreError::NotFound(_)) => return None,
        Err(e) => {
            error!(team = %team, error = %e, "rollback watch cannot read team state");
            return None;
        }
    };

    // Nothing to roll back to without a completed switch, and a team
    // with blue-green disabled is not switched automatically either.
    if !state.blue_green_enabled || state.last_switch_time.is_none() {
        return None;
    }

    let sample = match metrics.metrics(team).await {
        Ok(sample) => sample,
        Err(cause) => {
            warn!(team = %team, cause = %cause, "metrics unavailable, skipping rollback check");
            return None;
        }
    };

    let breaches = evaluate_triggers(&sample, config);
    if breaches.is_empty() {
        return None;
    }

    let target = state.active_environment.other();
    let reason = breaches.join(", ");
    warn!(team = %team, target = %target, reason = %reason, "rollback triggered");

    let request = SwitchRequest::rollback(team.clone(), target, &reason);
    match orchestrator.switch(&request, &AbortHandle::new(), now).await {
        Ok(outcome @ SwitchOutcome::Success { .. }) => {
            info!(team = %team, target = %target, "automatic rollback completed");
            Some(outcome)
        }
        Ok(outcome) => {
            error!(
                team = %team,
                outcome = ?outcome,
                "FATAL: automatic rollback did not complete, manual intervention required"
            );
            Some(outcome)
        }
        Err(e) => {
            error!(
                team = %team,
                error = %e,
                "FATAL: automatic rollback errored, manual intervention required"
            );
            None
        }
    }
}

fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use greenlight_breaker::CircuitBreaker;
    use greenlight_core::{
        BreakerConfig, Environment, EnvironmentHealth, SwitchConfig, TeamEnvironmentState,
        ValidatorThresholds,
    };
    use greenlight_routing::RoutingPlan;
    use greenlight_state::StateStore;
    use greenlight_switch::{EnvironmentRuntime, RoutingSink, RuntimeFuture, SwitchExecutor};

    const NOW: u64 = 1_700_000_000;

    struct OkRuntime;

    impl EnvironmentRuntime for OkRuntime {
        fn enable<'a>(&'a self, _t: &'a TeamName, _e: Environment) -> RuntimeFuture<'a, ()> {
            Box::pin(async { Ok(()) })
        }

        fn begin_drain<'a>(&'a self, _t: &'a TeamName, _e: Environment) -> RuntimeFuture<'a, ()> {
            Box::pin(async { Ok(()) })
        }

        fn route_to<'a>(&'a self, _t: &'a TeamName, _e: Environment) -> RuntimeFuture<'a, ()> {
            Box::pin(async { Ok(()) })
        }

        fn disable<'a>(&'a self, _t: &'a TeamName, _e: Environment) -> RuntimeFuture<'a, ()> {
            Box::pin(async { Ok(()) })
        }

        fn health<'a>(
            &'a self,
            _t: &'a TeamName,
            _e: Environment,
        ) -> RuntimeFuture<'a, EnvironmentHealth> {
            Box::pin(async {
                Ok(EnvironmentHealth {
                    status: 200,
                    active_builds: vec![],
                    queue_size: 0,
                    cpu_pct: 10.0,
                    mem_pct: 10.0,
                    observed_at: NOW,
                })
            })
        }
    }

    struct NullSink;

    impl RoutingSink for NullSink {
        fn apply(&self, _plan: &RoutingPlan) -> Result<(), String> {
            Ok(())
        }
    }

    struct FixedMetrics {
        sample: Mutex<Result<HealthMetrics, String>>,
    }

    impl FixedMetrics {
        fn new(sample: HealthMetrics) -> Self {
            Self {
                sample: Mutex::new(Ok(sample)),
            }
        }
    }

    impl MetricsProvider for FixedMetrics {
        fn metrics<'a>(&'a self, _team: &'a TeamName) -> MetricsFuture<'a> {
            Box::pin(async move { self.sample.lock().unwrap().clone() })
        }
    }

    fn team(name: &str) -> TeamName {
        TeamName::new(name).unwrap()
    }

    fn healthy_metrics() -> HealthMetrics {
        HealthMetrics {
            error_rate: 0.0,
            avg_response_ms: 100,
            availability: 1.0,
        }
    }

    fn bad_metrics() -> HealthMetrics {
        HealthMetrics {
            error_rate: 0.10,
            avg_response_ms: 100,
            availability: 1.0,
        }
    }

    fn orchestrator(store: StateStore) -> Orchestrator {
        let runtime = Arc::new(OkRuntime);
        let breaker = CircuitBreaker::new(store.clone(), BreakerConfig::default());
        let executor = SwitchExecutor::new(
            runtime.clone(),
            SwitchConfig {
                drain_secs: 0,
                step_timeout_secs: 60,
            },
        );
        Orchestrator::new(
            store,
            breaker,
            executor,
            runtime,
            Arc::new(NullSink),
            ValidatorThresholds::default(),
            "/etc/ssl/bundle.pem".to_string(),
        )
    }

    /// Team on green with one completed switch behind it.
    fn switched_team(store: &StateStore, name: &str) {
        let mut state = TeamEnvironmentState::new(team(name), Environment::Green, 8081);
        state.switch_count = 1;
        state.last_switch_time = Some(NOW - 120);
        store.register_team(&state).unwrap();
    }

    fn monitor(store: StateStore, metrics: Arc<dyn MetricsProvider>) -> RollbackMonitor {
        RollbackMonitor::new(orchestrator(store), metrics, RollbackConfig::default())
    }

    #[tokio::test]
    async fn breach_rolls_back_to_previous_environment() {
        let store = StateStore::open_in_memory().unwrap();
        switched_team(&store, "devops");
        let mon = monitor(store.clone(), Arc::new(FixedMetrics::new(bad_metrics())));

        let outcome = mon.check_team(&team("devops"), NOW).await;
        assert!(matches!(outcome, Some(SwitchOutcome::Success { .. })));

        let (state, _) = store.get_team(&team("devops")).unwrap();
        assert_eq!(state.active_environment, Environment::Blue);
        assert_eq!(state.switch_count, 2);
        assert_eq!(state.last_rollback_time, Some(NOW));
        assert_eq!(
            state.last_rollback_reason.as_deref(),
            Some("High error rate: 10.00%")
        );
    }

    #[tokio::test]
    async fn healthy_metrics_do_nothing() {
        let store = StateStore::open_in_memory().unwrap();
        switched_team(&store, "devops");
        let mon = monitor(store.clone(), Arc::new(FixedMetrics::new(healthy_metrics())));

        assert!(mon.check_team(&team("devops"), NOW).await.is_none());
        let (state, _) = store.get_team(&team("devops")).unwrap();
        assert_eq!(state.active_environment, Environment::Green);
        assert_eq!(state.switch_count, 1);
    }

    #[tokio::test]
    async fn team_without_switch_history_is_skipped() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .register_team(&TeamEnvironmentState::new(
                team("devops"),
                Environment::Blue,
                8081,
            ))
            .unwrap();
        let mon = monitor(store.clone(), Arc::new(FixedMetrics::new(bad_metrics())));

        assert!(mon.check_team(&team("devops"), NOW).await.is_none());
    }

    #[tokio::test]
    async fn unknown_team_is_skipped() {
        let store = StateStore::open_in_memory().unwrap();
        let mon = monitor(store, Arc::new(FixedMetrics::new(bad_metrics())));
        assert!(mon.check_team(&team("ghost"), NOW).await.is_none());
    }

    #[tokio::test]
    async fn metrics_failure_skips_the_tick() {
        let store = StateStore::open_in_memory().unwrap();
        switched_team(&store, "devops");
        let provider = Arc::new(FixedMetrics::new(bad_metrics()));
        *provider.sample.lock().unwrap() = Err("scrape timed out".to_string());
        let mon = monitor(store.clone(), provider);

        assert!(mon.check_team(&team("devops"), NOW).await.is_none());
        let (state, _) = store.get_team(&team("devops")).unwrap();
        assert_eq!(state.active_environment, Environment::Green);
    }

    #[tokio::test]
    async fn open_breaker_blocks_even_rollback() {
        let store = StateStore::open_in_memory().unwrap();
        switched_team(&store, "devops");
        let mon = monitor(store.clone(), Arc::new(FixedMetrics::new(bad_metrics())));

        // Open the team's breaker first.
        for _ in 0..3 {
            mon.orchestrator
                .breaker()
                .record_failure(&team("devops"), NOW)
                .unwrap();
        }

        let outcome = mon.check_team(&team("devops"), NOW + 10).await;
        match outcome {
            Some(SwitchOutcome::Blocked { reasons }) => {
                assert!(reasons[0].starts_with("Circuit breaker open"));
            }
            other => panic!("expected blocked, got {other:?}"),
        }
        let (state, _) = store.get_team(&team("devops")).unwrap();
        assert_eq!(state.active_environment, Environment::Green);
        assert_eq!(state.last_rollback_time, None);
    }

    #[tokio::test]
    async fn multiple_breaches_join_in_the_reason() {
        let store = StateStore::open_in_memory().unwrap();
        switched_team(&store, "devops");
        let mon = monitor(
            store.clone(),
            Arc::new(FixedMetrics::new(HealthMetrics {
                error_rate: 0.10,
                avg_response_ms: 8000,
                availability: 1.0,
            })),
        );

        mon.check_team(&team("devops"), NOW).await;
        let (state, _) = store.get_team(&team("devops")).unwrap();
        assert_eq!(
            state.last_rollback_reason.as_deref(),
            Some("High error rate: 10.00%, High response time: 8000ms")
        );
    }

    #[tokio::test]
    async fn monitor_starts_and_stops() {
        let store = StateStore::open_in_memory().unwrap();
        switched_team(&store, "devops");
        let mon = monitor(store, Arc::new(FixedMetrics::new(healthy_metrics())));
        let t = team("devops");

        assert!(mon.active_monitors().await.is_empty());

        mon.start_monitor(&t).await;
        assert!(mon.is_monitoring(&t).await);

        mon.stop_monitor(&t).await;
        assert!(!mon.is_monitoring(&t).await);
    }

    #[tokio::test]
    async fn monitor_stop_all() {
        let store = StateStore::open_in_memory().unwrap();
        switched_team(&store, "devops");
        switched_team(&store, "platform");
        let mon = monitor(store, Arc::new(FixedMetrics::new(healthy_metrics())));

        mon.start_monitor(&team("devops")).await;
        mon.start_monitor(&team("platform")).await;
        assert_eq!(mon.active_monitors().await.len(), 2);

        mon.stop_all().await;
        assert!(mon.active_monitors().await.is_empty());
    }

    #[tokio::test]
    async fn monitor_replaces_existing_monitor() {
        let store = StateStore::open_in_memory().unwrap();
        switched_team(&store, "devops");
        let mon = monitor(store, Arc::new(FixedMetrics::new(healthy_metrics())));
        let t = team("devops");

        mon.start_monitor(&t).await;
        mon.start_monitor(&t).await;
        assert_eq!(mon.active_monitors().await.len(), 1);
        mon.stop_all().await;
    }
}
