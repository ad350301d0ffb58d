//! Content-trust verification seam.
//!
//! The install flow hands the pulled image's content digest to a
//! [`TrustVerifier`] before the image is used. The verifier is an external
//! collaborator; this module only defines the interface and its verdicts.

use async_trait::async_trait;

/// Outcome of verifying one content checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustVerdict {
    /// The checksum matches a signed, expected value
    Trusted,
    /// The checksum is known and does not match — the content must not be used
    Untrusted,
    /// Verification itself failed (transient backend or transport problem)
    Error(String),
}

/// Validates a pulled image's content checksum before it is trusted.
#[async_trait]
pub trait TrustVerifier: Send + Sync {
    /// Verify a content checksum (the digest part of an image ID).
    async fn verify(&self, checksum: &str) -> TrustVerdict;
}

/// Verifier used when content trust is disabled on the host.
pub struct TrustDisabled;

#[async_trait]
impl TrustVerifier for TrustDisabled {
    async fn verify(&self, _checksum: &str) -> TrustVerdict {
        TrustVerdict::Trusted
    }
}
