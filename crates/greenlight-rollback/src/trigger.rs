use greenlight_core::RollbackConfig;
use serde::{Deserialize, Serialize};

/// Post-switch metrics over the trailing observation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    /// Fraction of requests that failed, 0.0 to 1.0.
    pub error_rate: f64,
    /// Mean response time over the window.
    pub avg_response_ms: u64,
    /// Fraction of probes answered, 0.0 to 1.0.
    pub availability: f64,
}

/// Evaluates every trigger condition independently and returns the
/// text of each breach. Any non-empty result means rollback; the
/// texts become the recorded rollback reason.
pub fn evaluate_triggers(metrics: &HealthMetrics, config: &RollbackConfig) -> Vec<String> {
    let mut breaches = Vec::new();

    if metrics.error_rate > config.max_error_rate {
        breaches.push(format!("High error rate: {:.2}%", metrics.error_rate * 100.0));
    }
    if metrics.avg_response_ms > config.max_response_ms {
        breaches.push(format!("High response time: {}ms", metrics.avg_response_ms));
    }
    if metrics.availability < config.min_availability {
        breaches.push(format!("Low availability: {:.2}%", metrics.availability * 100.0));
    }

    breaches
}
