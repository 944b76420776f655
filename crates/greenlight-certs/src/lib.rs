//! Certificate lifecycle for the shared TLS termination point.
//!
//! All teams share a single certificate bundle whose subject alternative
//! names cover the base domain, a wildcard, and one host per team. When
//! team membership changes the bundle must be regenerated and rotated
//! without dropping live connections, so rotation follows a staged
//! protocol: the new bundle is written next to the active one, verified,
//! and only then cut over. The previous bundle is kept as a backup until
//! the new one is confirmed, and a failed verification restores it.

mod descriptor;
mod rotation;

pub use descriptor::{
    CertificateDescriptor, ExpiryStatus, EXPIRY_WARNING_DAYS, OPERATIONAL_HOSTS,
};
pub use rotation::{CertError, CertMaterial, CertResult, CertStore, RotationManager, RotationStep};
