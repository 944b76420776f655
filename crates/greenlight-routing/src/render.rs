//! HAProxy-style rendering of a routing plan.
//!
//! Produces the config text the traffic router consumes. Rendering is
//! a pure function of the plan; identical plans render byte-identical
//! text. The emitted structure mirrors the router's expectations:
//! a TLS frontend with HSTS and per-team host ACLs, then one backend
//! per team with the active environment as primary (`check`) and the
//! peer as standby (`check backup`).

use std::fmt::Write;

use crate::descriptor::RoutingPlan;

/// Render the plan as traffic-router configuration text.
pub fn render(plan: &RoutingPlan) -> String {
    let mut out = String::new();

    out.push_str("global\n");
    out.push_str("    tune.ssl.default-dh-param 2048\n");
    let _ = writeln!(
        out,
        "    ssl-default-bind-options ssl-min-ver {} no-tls-tickets",
        plan.ssl.min_tls_version
    );
    out.push('\n');

    out.push_str("defaults\n");
    out.push_str("    mode http\n");
    out.push_str("    timeout connect 5000ms\n");
    out.push_str("    timeout client 50000ms\n");
    out.push_str("    timeout server 50000ms\n");
    out.push('\n');

    out.push_str("frontend jenkins_https\n");
    let _ = writeln!(out, "    bind *:443 ssl crt {}", plan.ssl.cert_bundle_path);
    let _ = writeln!(
        out,
        "    http-response set-header Strict-Transport-Security \"{}\"",
        plan.hsts
    );
    for d in &plan.descriptors {
        let _ = writeln!(out, "    acl {} hdr_beg(host) -i {}", d.acl.name, d.acl.host_prefix);
        let _ = writeln!(out, "    use_backend jenkins_{}_backend if {}", d.team, d.acl.name);
    }
    out.push('\n');

    for d in &plan.descriptors {
        let _ = writeln!(out, "backend jenkins_{}_backend", d.team);
        out.push_str("    balance roundrobin\n");
        let _ = writeln!(out, "    option httpchk GET {}", d.health_check_path);
        out.push_str("    http-check expect status 200,403\n");
        let _ = writeln!(
            out,
            "    server {} {} check ssl verify none",
            d.primary_backend.name, d.primary_backend.address
        );
        let _ = writeln!(
            out,
            "    server {} {} check backup ssl verify none",
            d.backup_backend.name, d.backup_backend.address
        );
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use crate::descriptor::generate;

    use greenlight_core::{Environment, TeamEnvironmentState, TeamName};

    use super::*;

    fn state(name: &str, env: Environment, port: u16) -> TeamEnvironmentState {
        TeamEnvironmentState::new(TeamName::new(name).unwrap(), env, port)
    }

    fn sample() -> RoutingPlan {
        generate(
            &[
                state("devops", Environment::Blue, 8081),
                state("qa", Environment::Green, 8083),
            ],
            "/etc/ssl/certs/wildcard-company.com.pem",
        )
    }

    #[test]
    fn renders_ssl_and_hsts() {
        let text = render(&sample());
        assert!(text.contains("ssl crt /etc/ssl/certs/wildcard-company.com.pem"));
        assert!(text.contains("ssl-min-ver TLSv1.2"));
        assert!(text.contains("Strict-Transport-Security"));
    }

    #[test]
    fn renders_team_acls() {
        let text = render(&sample());
        assert!(text.contains("acl is_devops hdr_beg(host) -i devopsjenkins."));
        assert!(text.contains("acl is_qa hdr_beg(host) -i qajenkins."));
        assert!(text.contains("use_backend jenkins_devops_backend if is_devops"));
    }

    #[test]
    fn active_environment_is_primary() {
        let text = render(&sample());
        // devops active=blue, qa active=green.
        assert!(text.contains("server jenkins-devops-blue localhost:8081 check ssl verify none"));
        assert!(text.contains("server jenkins-devops-green localhost:8082 check backup ssl verify none"));
        assert!(text.contains("server jenkins-qa-green localhost:8084 check ssl verify none"));
        assert!(text.contains("server jenkins-qa-blue localhost:8083 check backup ssl verify none"));
    }

    #[test]
    fn renders_health_check_expectations() {
        let text = render(&sample());
        assert!(text.contains("option httpchk GET /devops/login"));
        assert!(text.contains("http-check expect status 200,403"));
    }

    #[test]
    fn rendering_is_deterministic() {
        assert_eq!(render(&sample()), render(&sample()));
    }

    #[test]
    fn required_sections_present() {
        let text = render(&sample());
        for section in ["global", "defaults", "frontend", "backend", "bind", "server"] {
            assert!(text.contains(section), "missing section: {section}");
        }
    }
}
