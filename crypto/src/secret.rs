//! Per-task registration secrets.
//!
//! A solver must be able to recompute the secret it registered with for any
//! task, including after a restart, without persisting it. Secrets are
//! therefore derived as `HMAC-SHA256(local_key, task_id)`.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::fmt;
use thiserror::Error;
use vsolve_types::TaskId;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Errors arising from key handling.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid secret key: {0}")]
    InvalidKey(String),

    #[error("secret derivation failed: {0}")]
    DerivationFailed(String),
}

/// Local key material that per-task secrets are derived from.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse 32 bytes of hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let s = s.trim();
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = hex::decode(digits).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        if bytes.len() != 32 {
            let len = bytes.len();
            bytes.zeroize();
            return Err(CryptoError::InvalidKey(format!(
                "expected 32 bytes, got {len}"
            )));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self(key))
    }

    /// Fresh random key, for solvers that never need to recover.
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Derive the secret registered for `task_id`.
    pub fn task_secret(&self, task_id: &TaskId) -> Result<TaskSecret, CryptoError> {
        let mut mac = HmacSha256::new_from_slice(&self.0)
            .map_err(|e| CryptoError::DerivationFailed(e.to_string()))?;
        mac.update(task_id.as_bytes());
        let digest = mac.finalize().into_bytes();
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&digest);
        Ok(TaskSecret(secret))
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Secret bound to one task registration.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct TaskSecret([u8; 32]);

impl TaskSecret {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for TaskSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TaskSecret(..)")
    }
}
