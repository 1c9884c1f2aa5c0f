//! Pure byte-transform wrapper around a `DataProtection` collaborator.

use akavache_core::{DataProtection, ProtectionScope, Result};
use std::sync::Arc;

/// Wraps a `DataProtection` implementation so the payload path can apply it
/// uniformly on write and read, without caring which store kind it backs.
/// Only the Secure store installs one of these.
#[derive(Clone)]
pub struct EncryptionFilter {
    protector: Arc<dyn DataProtection>,
}

impl EncryptionFilter {
    pub fn new(protector: Arc<dyn DataProtection>) -> Self {
        Self { protector }
    }

    /// Encrypt `plaintext`, or pass an empty payload through unchanged.
    pub async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if plaintext.is_empty() {
            return Ok(Vec::new());
        }
        self.protector.protect(plaintext, ProtectionScope::CurrentUser).await
    }

    /// Decrypt `ciphertext`, or pass an empty payload through unchanged.
    pub async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.is_empty() {
            return Ok(Vec::new());
        }
        self.protector.unprotect(ciphertext).await
    }
}
