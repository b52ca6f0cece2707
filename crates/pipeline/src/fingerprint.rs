//! Content fingerprinting.
//!
//! The fingerprint is a SHA-256 digest (lowercase hex) over the exact bytes
//! fetched from the source-control API. Two analyses with equal fingerprints
//! are, by policy, equal in all derived fields. This is what makes the
//! dedup gatekeeper and the idempotent store write safe under redelivery.

use sha2::{Digest, Sha256};

use crate::Fingerprint;

/// Computes the deterministic fingerprint of workflow file content.
pub fn fingerprint_content(content: &[u8]) -> Fingerprint {
    let digest = Sha256::digest(content);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    Fingerprint::new(hex).expect("sha-256 hex digest is never empty")
}
