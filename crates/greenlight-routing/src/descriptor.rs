//! Routing descriptor generation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use greenlight_core::{Environment, TeamEnvironmentState};

/// HSTS directive attached to every generated plan.
pub const HSTS_HEADER: &str = "max-age=31536000; includeSubDomains; preload";

/// Minimum TLS version for the frontend binding.
pub const MIN_TLS_VERSION: &str = "TLSv1.2";

/// Host-prefix ACL rule for one team's subdomain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclRule {
    /// Rule name, e.g. `is_devops`.
    pub name: String,
    /// Host header prefix, e.g. `devopsjenkins.`.
    pub host_prefix: String,
}

/// Per-team routing descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDescriptor {
    pub team: String,
    /// Backend receiving traffic: the active environment.
    pub primary_backend: Backend,
    /// Standby backend: the peer environment.
    pub backup_backend: Backend,
    /// Health-check path probed by the traffic router.
    pub health_check_path: String,
    pub acl: AclRule,
}

/// A named backend server entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    /// Server name, e.g. `jenkins-devops-blue`.
    pub name: String,
    /// Listen address, e.g. `localhost:8081`.
    pub address: String,
}

/// Global SSL binding for the frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslBinding {
    pub cert_bundle_path: String,
    pub min_tls_version: String,
}

/// The complete routing plan: every team descriptor plus globals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingPlan {
    pub descriptors: Vec<RoutingDescriptor>,
    pub ssl: SslBinding,
    pub hsts: String,
}

/// Generate the routing plan from committed team states.
///
/// Teams are sorted by name so regeneration is deterministic. The
/// team's configured port serves the blue environment; the green
/// environment listens one port above.
pub fn generate(states: &[TeamEnvironmentState], cert_bundle_path: &str) -> RoutingPlan {
    let mut states: Vec<&TeamEnvironmentState> = states.iter().collect();
    states.sort_by(|a, b| a.team_name.cmp(&b.team_name));

    let descriptors = states
        .iter()
        .map(|state| {
            let team = state.team_name.as_str();
            let active = state.active_environment;
            RoutingDescriptor {
                team: team.to_string(),
                primary_backend: backend(team, active, state.port),
                backup_backend: backend(team, active.other(), state.port),
                health_check_path: format!("/{team}/login"),
                acl: AclRule {
                    name: format!("is_{team}"),
                    host_prefix: format!("{team}jenkins."),
                },
            }
        })
        .collect::<Vec<_>>();

    debug!(teams = descriptors.len(), "routing plan generated");

    RoutingPlan {
        descriptors,
        ssl: SslBinding {
            cert_bundle_path: cert_bundle_path.to_string(),
            min_tls_version: MIN_TLS_VERSION.to_string(),
        },
        hsts: HSTS_HEADER.to_string(),
    }
}

fn backend(team: &str, env: Environment, blue_port: u16) -> Backend {
    let port = match env {
        Environment::Blue => blue_port,
        Environment::Green => blue_port.saturating_add(1),
    };
    Backend {
        name: format!("jenkins-{team}-{env}"),
        address: format!("localhost:{port}"),
    }
}
