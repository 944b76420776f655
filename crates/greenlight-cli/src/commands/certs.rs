use greenlight_certs::{CertificateDescriptor, ExpiryStatus, RotationManager};
use greenlight_core::{OrchestratorConfig, TeamName};

use tracing::warn;

use crate::certstore::{self, DirCertStore};

use super::epoch_secs;

/// Default validity window requested from the issuer.
const VALIDITY_DAYS: u64 = 90;

fn descriptor(config: &OrchestratorConfig, now: u64) -> anyhow::Result<CertificateDescriptor> {
    let teams = config
        .teams
        .iter()
        .map(|t| TeamName::new(&t.team_name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CertificateDescriptor::for_teams(
        &config.base_domain,
        &teams,
        now,
        VALIDITY_DAYS,
    ))
}

/// Warns when the recorded active bundle no longer covers the
/// configured team set, so a membership change surfaces on every
/// command instead of waiting for `certs plan`.
pub fn warn_if_rotation_needed(config: &OrchestratorConfig) {
    let Some(live) = certstore::load_live_descriptor(&config.cert_dir) else {
        return;
    };
    let Ok(desired) = descriptor(config, epoch_secs()) else {
        return;
    };
    if desired.requires_rotation_from(&live) {
        warn!(
            cert_dir = %config.cert_dir,
            "active certificate bundle does not cover the configured team set; run 'greenlight certs rotate'"
        );
    }
}

pub fn plan(config: &OrchestratorConfig) -> anyhow::Result<()> {
    let now = epoch_secs();
    let descriptor = descriptor(config, now)?;

    println!("Certificate plan for {} ({} names):", config.base_domain, descriptor.domains.len());
    for domain in &descriptor.domains {
        println!("  {domain}");
    }
    match descriptor.classify_expiry(now) {
        ExpiryStatus::Valid => {}
        ExpiryStatus::ExpiringSoon { remaining_days } => {
            println!("Note: requested window leaves {remaining_days} days");
        }
        ExpiryStatus::Expired => println!("Note: requested window is already expired"),
    }

    match certstore::load_live_descriptor(&config.cert_dir) {
        None => println!("No active bundle recorded; run 'greenlight certs rotate'"),
        Some(live) => {
            if descriptor.requires_rotation_from(&live) {
                println!(
                    "Rotation required: active bundle covers {} names, configuration needs {}",
                    live.domains.len(),
                    descriptor.domains.len()
                );
            } else {
                println!("Active bundle covers the configured team set");
            }
            match live.classify_expiry(now) {
                ExpiryStatus::Valid => {}
                ExpiryStatus::ExpiringSoon { remaining_days } => {
                    println!("Active bundle expires in {remaining_days} days");
                }
                ExpiryStatus::Expired => println!("Active bundle has expired"),
            }
        }
    }
    Ok(())
}

pub fn rotate(config: &OrchestratorConfig) -> anyhow::Result<()> {
    let descriptor = descriptor(config, epoch_secs())?;
    let store = DirCertStore::new(
        &config.cert_dir,
        config.hooks.issue_cert.clone(),
        config.hooks.verify_cert.clone(),
    );
    let mut manager = RotationManager::new(store);
    manager.rotate(&descriptor)?;
    certstore::save_live_descriptor(&config.cert_dir, &descriptor)?;
    println!(
        "✓ Rotated certificate bundle ({} names) in {}",
        descriptor.domains.len(),
        config.cert_dir
    );
    Ok(())
}
