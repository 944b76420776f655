//! Directory-backed certificate store.
//!
//! Bundles under the configured cert directory:
//!   `bundle.pem`      — active, loaded by the traffic router
//!   `bundle.pem.new`  — staged by a rotation in progress
//!   `bundle.pem.bak`  — last-known-good, kept until cutover confirms
//!
//! Issuance runs the operator's `issue_cert` hook with the SAN list in
//! `GREENLIGHT_DOMAINS`; the hook writes `cert.pem` and `key.pem` into
//! the directory. Cutover is a pair of renames, so the active bundle
//! is replaced atomically.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use greenlight_certs::{CertMaterial, CertStore, CertificateDescriptor};

pub const ACTIVE_BUNDLE: &str = "bundle.pem";
const STAGED_BUNDLE: &str = "bundle.pem.new";
const BACKUP_BUNDLE: &str = "bundle.pem.bak";

/// Descriptor the active bundle was issued for, written alongside it
/// after a successful rotation. Comparing it against the descriptor
/// for the current team set tells whether the live certificate still
/// covers every configured host.
pub const LIVE_DESCRIPTOR: &str = "descriptor.json";

pub struct DirCertStore {
    dir: PathBuf,
    issue_cmd: Option<String>,
    verify_cmd: Option<String>,
}

impl DirCertStore {
    pub fn new(dir: impl Into<PathBuf>, issue_cmd: Option<String>, verify_cmd: Option<String>) -> Self {
        Self {
            dir: dir.into(),
            issue_cmd,
            verify_cmd,
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn read_pem(&self, name: &str) -> Result<String, String> {
        let path = self.path(name);
        let pem = std::fs::read_to_string(&path)
            .map_err(|e| format!("read {}: {e}", path.display()))?;
        if pem.trim().is_empty() {
            return Err(format!("{} is empty", path.display()));
        }
        Ok(pem)
    }

    fn run_cmd(&self, cmd: &str, extra_env: &[(&str, &str)]) -> Result<(), String> {
        debug!(cmd, dir = %self.dir.display(), "running certificate hook");
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(cmd)
            .current_dir(&self.dir)
            .env("GREENLIGHT_DIR", &self.dir);
        for (key, value) in extra_env {
            command.env(key, value);
        }
        let output = command
            .output()
            .map_err(|e| format!("failed to spawn hook: {e}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "hook exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), String> {
        std::fs::rename(self.path(from), self.path(to))
            .map_err(|e| format!("rename {from} -> {to}: {e}"))
    }
}

impl CertStore for DirCertStore {
    fn generate(&mut self, descriptor: &CertificateDescriptor) -> Result<CertMaterial, String> {
        let cmd = self
            .issue_cmd
            .as_deref()
            .ok_or_else(|| "no issue_cert hook configured".to_string())?;
        std::fs::create_dir_all(&self.dir).map_err(|e| format!("create cert dir: {e}"))?;
        let domains = descriptor.domains.join(",");
        self.run_cmd(cmd, &[("GREENLIGHT_DOMAINS", &domains)])?;
        Ok(CertMaterial {
            cert_pem: self.read_pem("cert.pem")?,
            key_pem: self.read_pem("key.pem")?,
        })
    }

    fn stage(&mut self, bundle: &str) -> Result<(), String> {
        let path = self.path(STAGED_BUNDLE);
        std::fs::write(&path, bundle).map_err(|e| format!("write {}: {e}", path.display()))
    }

    fn verify(&self, _descriptor: &CertificateDescriptor) -> Result<(), String> {
        let staged = self.path(STAGED_BUNDLE);
        match self.verify_cmd.as_deref() {
            Some(cmd) => self.run_cmd(
                cmd,
                &[("GREENLIGHT_BUNDLE", &staged.display().to_string())],
            ),
            // Without a verify hook, at least insist the staged bundle
            // exists and is non-empty.
            None => {
                let content = std::fs::read_to_string(&staged)
                    .map_err(|e| format!("read staged bundle: {e}"))?;
                if content.trim().is_empty() {
                    return Err("staged bundle is empty".to_string());
                }
                Ok(())
            }
        }
    }

    fn cutover(&mut self) -> Result<(), String> {
        if self.path(ACTIVE_BUNDLE).exists() {
            self.rename(ACTIVE_BUNDLE, BACKUP_BUNDLE)?;
        }
        self.rename(STAGED_BUNDLE, ACTIVE_BUNDLE)
    }

    fn remove_old(&mut self) -> Result<(), String> {
        let backup = self.path(BACKUP_BUNDLE);
        if backup.exists() {
            std::fs::remove_file(&backup).map_err(|e| format!("remove backup: {e}"))?;
        }
        Ok(())
    }

    fn restore_backup(&mut self) -> Result<(), String> {
        if self.path(BACKUP_BUNDLE).exists() {
            return self.rename(BACKUP_BUNDLE, ACTIVE_BUNDLE);
        }
        // A rotation that failed before cutover never displaced the
        // active bundle; nothing to restore.
        if self.path(ACTIVE_BUNDLE).exists() {
            return Ok(());
        }
        Err("Backup certificate not found".to_string())
    }
}

/// Records the descriptor the active bundle was just issued for.
pub fn save_live_descriptor(
    cert_dir: impl AsRef<Path>,
    descriptor: &CertificateDescriptor,
) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(descriptor)?;
    std::fs::write(cert_dir.as_ref().join(LIVE_DESCRIPTOR), json)?;
    Ok(())
}

/// Descriptor of the active bundle, if one has been rotated in. A
/// missing or unreadable file means the coverage of the live bundle
/// is simply unknown.
pub fn load_live_descriptor(cert_dir: impl AsRef<Path>) -> Option<CertificateDescriptor> {
    let bytes = std::fs::read(cert_dir.as_ref().join(LIVE_DESCRIPTOR)).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Path of the active bundle under a cert directory, as referenced by
/// the routing configuration.
pub fn active_bundle_path(cert_dir: &str) -> String {
    Path::new(cert_dir)
        .join(ACTIVE_BUNDLE)
        .display()
        .to_string()
}
