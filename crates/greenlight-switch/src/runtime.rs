use std::future::Future;
use std::pin::Pin;

use greenlight_core::{Environment, EnvironmentHealth, TeamName};

/// Boxed future returned by [`EnvironmentRuntime`] methods, so the
/// trait stays object-safe and implementations can be swapped behind
/// `Arc<dyn EnvironmentRuntime>`.
pub type RuntimeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send + 'a>>;

/// Seam to the per-team environment pair. The real implementation
/// talks to the deployment substrate (container engine, service
/// manager); tests script one in memory.
///
/// Methods return `Err(String)` with a human-readable cause; the
/// executor attributes it to the step that issued the call.
pub trait EnvironmentRuntime: Send + Sync {
    /// Bring the environment up far enough to answer health checks.
    fn enable<'a>(&'a self, team: &'a TeamName, env: Environment) -> RuntimeFuture<'a, ()>;

    /// Stop routing new work to the environment. In-flight work keeps
    /// running until the drain interval has passed.
    fn begin_drain<'a>(&'a self, team: &'a TeamName, env: Environment) -> RuntimeFuture<'a, ()>;

    /// Point the team's primary backend at the environment.
    fn route_to<'a>(&'a self, team: &'a TeamName, env: Environment) -> RuntimeFuture<'a, ()>;

    /// Shut the environment down.
    fn disable<'a>(&'a self, team: &'a TeamName, env: Environment) -> RuntimeFuture<'a, ()>;

    /// Sample the environment's live health signals.
    fn health<'a>(
        &'a self,
        team: &'a TeamName,
        env: Environment,
    ) -> RuntimeFuture<'a, EnvironmentHealth>;
}
