use std::fmt;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::descriptor::CertificateDescriptor;

pub type CertResult<T> = Result<T, CertError>;

#[derive(Debug, Error)]
pub enum CertError {
    /// A rotation step failed and the previous bundle was restored
    /// from backup. Traffic continues on the old certificate.
    #[error("certificate rotation failed at {step}: {cause} (previous bundle restored)")]
    Rotation { step: RotationStep, cause: String },

    /// A rotation step failed and the backup could not be restored
    /// either. The termination point may be serving without a valid
    /// bundle; this needs an operator.
    #[error("certificate rotation failed at {step}: {cause}; backup restore also failed: {restore_cause}")]
    RestoreFailed {
        step: RotationStep,
        cause: String,
        restore_cause: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationStep {
    Generate,
    BuildBundle,
    Stage,
    Verify,
    Cutover,
    RemoveOld,
}

impl RotationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RotationStep::Generate => "generate",
            RotationStep::BuildBundle => "build_bundle",
            RotationStep::Stage => "stage",
            RotationStep::Verify => "verify",
            RotationStep::Cutover => "cutover",
            RotationStep::RemoveOld => "remove_old",
        }
    }
}

impl fmt::Display for RotationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key and certificate produced by issuance, before they are combined
/// into the single bundle the termination point loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertMaterial {
    pub cert_pem: String,
    pub key_pem: String,
}

/// Side-effecting half of rotation. Implementations talk to the real
/// issuer and filesystem; tests substitute an in-memory store.
pub trait CertStore {
    /// Issues key and certificate for the descriptor.
    fn generate(&mut self, descriptor: &CertificateDescriptor) -> Result<CertMaterial, String>;

    /// Writes the combined bundle next to the active one without
    /// touching live traffic.
    fn stage(&mut self, bundle: &str) -> Result<(), String>;

    /// Checks the staged bundle is loadable and matches the
    /// descriptor's host set.
    fn verify(&self, descriptor: &CertificateDescriptor) -> Result<(), String>;

    /// Atomically makes the staged bundle the active one, keeping the
    /// previous active bundle as backup.
    fn cutover(&mut self) -> Result<(), String>;

    /// Deletes the backup once the new bundle is confirmed live.
    fn remove_old(&mut self) -> Result<(), String>;

    /// Puts the backup bundle back as the active one.
    fn restore_backup(&mut self) -> Result<(), String>;
}

/// Drives the staged rotation protocol against a [`CertStore`].
pub struct RotationManager<S> {
    store: S,
}

impl<S: CertStore> RotationManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs the full rotation. Any failure after material exists rolls
    /// back to the previous bundle before returning the error; a
    /// rollback that itself fails is reported as fatal and never
    /// retried automatically.
    pub fn rotate(&mut self, descriptor: &CertificateDescriptor) -> CertResult<()> {
        info!(domains = descriptor.domains.len(), "rotating certificate bundle");

        let material = self
            .store
            .generate(descriptor)
            .map_err(|cause| self.fail_without_restore(RotationStep::Generate, cause))?;

        let bundle = build_bundle(&material);
        if bundle.is_empty() {
            return Err(self.fail_without_restore(
                RotationStep::BuildBundle,
                "issued material was empty".to_string(),
            ));
        }

        self.store
            .stage(&bundle)
            .map_err(|cause| self.fail_without_restore(RotationStep::Stage, cause))?;

        if let Err(cause) = self.store.verify(descriptor) {
            return Err(self.fail_with_restore(RotationStep::Verify, cause));
        }

        if let Err(cause) = self.store.cutover() {
            return Err(self.fail_with_restore(RotationStep::Cutover, cause));
        }

        // The new bundle is live at this point. A backup that fails to
        // delete is noise, not a rotation failure.
        if let Err(cause) = self.store.remove_old() {
            warn!(cause = %cause, "stale certificate backup could not be removed");
        }

        info!("certificate bundle rotated");
        Ok(())
    }

    /// Steps before anything touched the active bundle need no
    /// restore: traffic never left the old certificate.
    fn fail_without_restore(&self, step: RotationStep, cause: String) -> CertError {
        error!(step = %step, cause = %cause, "certificate rotation failed");
        CertError::Rotation { step, cause }
    }

    fn fail_with_restore(&mut self, step: RotationStep, cause: String) -> CertError {
        error!(step = %step, cause = %cause, "certificate rotation failed, restoring backup");
        match self.store.restore_backup() {
            Ok(()) => CertError::Rotation { step, cause },
            Err(restore_cause) => {
                error!(
                    step = %step,
                    restore_cause = %restore_cause,
                    "backup restore failed, manual intervention required"
                );
                CertError::RestoreFailed {
                    step,
                    cause,
                    restore_cause,
                }
            }
        }
    }
}

/// Certificate first, key second, one file. That is the layout the
/// termination point loads.
fn build_bundle(material: &CertMaterial) -> String {
    if material.cert_pem.trim().is_empty() || material.key_pem.trim().is_empty() {
        return String::new();
    }
    let mut bundle = String::with_capacity(material.cert_pem.len() + material.key_pem.len() + 2);
    bundle.push_str(material.cert_pem.trim_end());
    bundle.push('\n');
    bundle.push_str(material.key_pem.trim_end());
    bundle.push('\n');
    bundle
}
