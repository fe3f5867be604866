//! Certificate fingerprints.
//!
//! Glide hosts use a self-signed certificate, so there is no authority to
//! vouch for them.  Instead the phone remembers the SHA-256 fingerprint of the
//! certificate it saw on first contact and refuses a different one later.
//! Both sides compute the fingerprint with [`certificate_fingerprint`] so the
//! value the host logs is the value the phone stores.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of a DER-encoded certificate.
pub fn certificate_fingerprint(der: &[u8]) -> String {
    hex::encode(Sha256::digest(der))
}

/// Formats a fingerprint as colon-separated byte pairs for display,
/// e.g. `ab:cd:ef:...`.
pub fn display_fingerprint(fingerprint: &str) -> String {
    fingerprint
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join(":")
}
