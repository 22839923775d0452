//! Integrity checks for fetched artifacts.

use sha2::{Digest, Sha256};

/// Validates fetched bytes before they are unpacked.
pub trait Verifier: Send + Sync {
    /// Returns a human readable reason when `data` must be rejected.
    fn verify(&self, data: &[u8]) -> std::result::Result<(), String>;
}

/// Accepts anything. Used for HEAD installs, which have no checksum.
#[derive(Debug, Clone, Default)]
pub struct InsecureVerifier;

impl Verifier for InsecureVerifier {
    fn verify(&self, _data: &[u8]) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Compares the SHA-256 digest of the data against an expected hex string.
#[derive(Debug, Clone)]
pub struct Sha256Verifier {
    expected: String,
}

impl Sha256Verifier {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into().to_lowercase(),
        }
    }
}

impl Verifier for Sha256Verifier {
    fn verify(&self, data: &[u8]) -> std::result::Result<(), String> {
        let actual = compute_sha256(data);
        if actual.eq_ignore_ascii_case(&self.expected) {
            Ok(())
        } else {
            Err(format!("checksum does not match, expected {}, got {}", self.expected, actual))
        }
    }
}

/// Hex encoded SHA-256 of `data`
pub fn compute_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    for chunk in data.chunks(64 * 1024) {
        hasher.update(chunk);
    }
    format!("{:x}", hasher.finalize())
}
