//! Key derivation: Argon2id password → 256-bit identity key

use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use envcrypt_core::config::CryptoConfig;
use envcrypt_core::{EnvcryptError, EnvcryptResult};

use crate::{KEY_SIZE, SALT_SIZE};

/// A 256-bit key derived from a password via Argon2id.
///
/// Zeroized on drop to prevent secrets lingering in memory.
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id parameters, stored next to every protected private key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Time cost / iterations (default: 3)
    #[serde(rename = "time")]
    pub time_cost: u32,
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    #[serde(rename = "memory")]
    pub mem_cost_kib: u32,
    /// Parallelism (default: 1)
    pub parallelism: u32,
    /// Output length in bytes; must be 32
    pub key_length: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            time_cost: 3,
            mem_cost_kib: 65536,
            parallelism: 1,
            key_length: KEY_SIZE as u32,
        }
    }
}

impl From<&CryptoConfig> for KdfParams {
    fn from(config: &CryptoConfig) -> Self {
        Self {
            time_cost: config.argon2_time_cost,
            mem_cost_kib: config.argon2_mem_cost_kib,
            parallelism: config.argon2_parallelism,
            key_length: KEY_SIZE as u32,
        }
    }
}

/// Generate a fresh random salt for a new identity.
pub fn generate_salt() -> EnvcryptResult<[u8; SALT_SIZE]> {
    let mut salt = [0u8; SALT_SIZE];
    crate::aead::fill_random(&mut salt)?;
    Ok(salt)
}

/// Derive a 256-bit key from a password and salt using Argon2id (v1.3).
///
/// Deterministic for identical inputs. The salt is not secret and is stored
/// alongside the protected key.
pub fn derive_key(
    password: &SecretString,
    salt: &[u8],
    params: &KdfParams,
) -> EnvcryptResult<DerivedKey> {
    if params.key_length as usize != KEY_SIZE {
        return Err(EnvcryptError::KeyDerivation(format!(
            "unsupported key length: {} (expected {KEY_SIZE})",
            params.key_length
        )));
    }

    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| EnvcryptError::KeyDerivation(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = DerivedKey {
        bytes: [0u8; KEY_SIZE],
    };
    argon2
        .hash_password_into(password.expose_secret().as_bytes(), salt, &mut key.bytes)
        .map_err(|e| EnvcryptError::KeyDerivation(format!("Argon2id KDF failed: {e}")))?;

    Ok(key)
}

#[cfg(test)]
pub(crate) fn fast_params() -> KdfParams {
    KdfParams {
        time_cost: 1,
        mem_cost_kib: 1024,
        parallelism: 1,
        key_length: KEY_SIZE as u32,
    }
}
