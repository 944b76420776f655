use greenlight_core::TeamName;
use serde::{Deserialize, Serialize};

/// Hosts that exist independently of team membership and are always
/// present in the SAN list.
pub const OPERATIONAL_HOSTS: [&str; 3] = ["prometheus", "grafana", "node-exporter"];

/// Certificates within this many days of expiry are reported as
/// expiring soon so rotation can be scheduled before they lapse.
pub const EXPIRY_WARNING_DAYS: u64 = 30;

const SECS_PER_DAY: u64 = 86_400;

/// Everything needed to issue (or re-issue) the shared certificate:
/// the full SAN list plus the validity window. Two descriptors with
/// the same domains describe the same logical certificate, so the
/// domain list is kept sorted and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateDescriptor {
    pub domains: Vec<String>,
    pub not_before: u64,
    pub not_after: u64,
}

impl CertificateDescriptor {
    /// Builds the descriptor for the given team set. The SAN list is
    /// the wildcard, the apex, the shared `jenkins.` host, one
    /// `{team}jenkins.` host per team, and the operational hosts.
    pub fn for_teams(base_domain: &str, teams: &[TeamName], now: u64, validity_days: u64) -> Self {
        let mut domains = vec![
            format!("*.{base_domain}"),
            base_domain.to_string(),
            format!("jenkins.{base_domain}"),
        ];
        for team in teams {
            domains.push(format!("{team}jenkins.{base_domain}"));
        }
        for host in OPERATIONAL_HOSTS {
            domains.push(format!("{host}.{base_domain}"));
        }
        domains.sort();
        domains.dedup();
        Self {
            domains,
            not_before: now,
            not_after: now + validity_days * SECS_PER_DAY,
        }
    }

    /// True if `other` covers a different host set, meaning the live
    /// certificate no longer matches team membership and must rotate.
    pub fn requires_rotation_from(&self, other: &Self) -> bool {
        self.domains != other.domains
    }

    pub fn classify_expiry(&self, now: u64) -> ExpiryStatus {
        if now >= self.not_after {
            return ExpiryStatus::Expired;
        }
        let remaining_days = (self.not_after - now) / SECS_PER_DAY;
        if remaining_days < EXPIRY_WARNING_DAYS {
            ExpiryStatus::ExpiringSoon { remaining_days }
        } else {
            ExpiryStatus::Valid
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExpiryStatus {
    Valid,
    ExpiringSoon { remaining_days: u64 },
    Expired,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(name: &str) -> TeamName {
        name.parse().unwrap()
    }

    #[test]
    fn san_list_covers_apex_wildcard_teams_and_operational_hosts() {
        let d = CertificateDescriptor::for_teams(
            "example.com",
            &[team("devops"), team("platform")],
            1_000,
            365,
        );
        for expected in [
            "*.example.com",
            "example.com",
            "jenkins.example.com",
            "devopsjenkins.example.com",
            "platformjenkins.example.com",
            "prometheus.example.com",
            "grafana.example.com",
            "node-exporter.example.com",
        ] {
            assert!(d.domains.iter().any(|x| x == expected), "missing {expected}");
        }
        assert_eq!(d.domains.len(), 8);
    }

    #[test]
    fn domain_list_is_sorted_and_deterministic() {
        let a = CertificateDescriptor::for_teams("x.io", &[team("b"), team("a")], 0, 30);
        let b = CertificateDescriptor::for_teams("x.io", &[team("a"), team("b")], 0, 30);
        assert_eq!(a.domains, b.domains);
        let mut sorted = a.domains.clone();
        sorted.sort();
        assert_eq!(a.domains, sorted);
    }

    #[test]
    fn membership_change_requires_rotation() {
        let before = CertificateDescriptor::for_teams("x.io", &[team("a")], 0, 30);
        let after = CertificateDescriptor::for_teams("x.io", &[team("a"), team("b")], 500, 30);
        assert!(after.requires_rotation_from(&before));
        let same = CertificateDescriptor::for_teams("x.io", &[team("a")], 900, 30);
        assert!(!same.requires_rotation_from(&before));
    }

    #[test]
    fn expiry_classification() {
        let d = CertificateDescriptor::for_teams("x.io", &[], 0, 90);
        assert_eq!(d.classify_expiry(0), ExpiryStatus::Valid);
        assert_eq!(
            d.classify_expiry(70 * SECS_PER_DAY),
            ExpiryStatus::ExpiringSoon { remaining_days: 20 }
        );
        assert_eq!(d.classify_expiry(90 * SECS_PER_DAY), ExpiryStatus::Expired);
        assert_eq!(d.classify_expiry(91 * SECS_PER_DAY), ExpiryStatus::Expired);
    }

    #[test]
    fn warning_window_boundary() {
        let d = CertificateDescriptor::for_teams("x.io", &[], 0, 90);
        // Exactly 30 full days left is still valid; 29 is not.
        assert_eq!(d.classify_expiry(60 * SECS_PER_DAY), ExpiryStatus::Valid);
        assert_eq!(
            d.classify_expiry(60 * SECS_PER_DAY + 1),
            ExpiryStatus::ExpiringSoon { remaining_days: 29 }
        );
    }
}
