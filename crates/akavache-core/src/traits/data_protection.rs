//! The data-protection collaborator used by the Secure store.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key};
use async_trait::async_trait;

use crate::{CacheError, Result};

/// Scope under which a byte array is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionScope {
    CurrentUser,
}

/// Platform data-protection primitive: protect/unprotect a byte array under a
/// user- or machine-scoped key.
///
/// This stands in for the platform DPAPI/Keychain primitive the original
/// system names as an external collaborator; the core only depends on this
/// trait's contract.
#[async_trait]
pub trait DataProtection: Send + Sync + 'static {
    async fn protect(&self, plaintext: &[u8], scope: ProtectionScope) -> Result<Vec<u8>>;
    async fn unprotect(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

const NONCE_LEN: usize = 12;

/// Default `DataProtection` implementation: AES-256-GCM with a random nonce
/// prepended to the ciphertext, and a key generated on first use.
pub struct AesGcmProtector {
    cipher: Aes256Gcm,
}

impl AesGcmProtector {
    /// Build a protector from a raw 32-byte key.
    pub fn from_key_bytes(key_bytes: &[u8; 32]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(key_bytes);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Generate a fresh random key, for first-use key provisioning.
    pub fn generate_key() -> [u8; 32] {
        let key = Aes256Gcm::generate_key(OsRng);
        key.into()
    }
}

#[async_trait]
impl DataProtection for AesGcmProtector {
    async fn protect(&self, plaintext: &[u8], _scope: ProtectionScope) -> Result<Vec<u8>> {
        if plaintext.is_empty() {
            return Ok(Vec::new());
        }

        let nonce = Aes256Gcm::generate_nonce(OsRng);
        let mut ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CacheError::Encryption(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.append(&mut ciphertext);
        Ok(out)
    }

    async fn unprotect(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.is_empty() {
            return Ok(Vec::new());
        }

        if ciphertext.len() < NONCE_LEN {
            return Err(CacheError::Encryption("ciphertext shorter than nonce".to_string()));
        }

        let (nonce_bytes, body) = ciphertext.split_at(NONCE_LEN);
        self.cipher
            .decrypt(nonce_bytes.into(), body)
            .map_err(|e| CacheError::Encryption(e.to_string()))
    }
}
