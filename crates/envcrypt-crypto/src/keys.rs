//! Key types: project master keys and X25519 identity key pairs

use x25519_dalek::StaticSecret;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use envcrypt_core::{EnvcryptError, EnvcryptResult};

use crate::KEY_SIZE;

pub use x25519_dalek::PublicKey;

/// An X25519 private key. Zeroized on drop.
pub type PrivateKey = StaticSecret;

/// The symmetric key under which all of a project's documents are encrypted.
///
/// Only ever exists in memory after an unwrap; zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ProjectMasterKey([u8; KEY_SIZE]);

impl ProjectMasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for ProjectMasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectMasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit project master key.
pub fn generate_pmk() -> EnvcryptResult<ProjectMasterKey> {
    let mut bytes = [0u8; KEY_SIZE];
    crate::aead::fill_random(&mut bytes)?;
    Ok(ProjectMasterKey(bytes))
}

/// A user's X25519 key pair, held only for the duration of a session.
pub struct KeyPair {
    public: PublicKey,
    secret: PrivateKey,
}

impl KeyPair {
    pub fn generate() -> EnvcryptResult<Self> {
        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        crate::aead::fill_random(&mut bytes[..])?;
        Ok(Self::from_secret(StaticSecret::from(*bytes)))
    }

    pub fn from_secret(secret: PrivateKey) -> Self {
        let public = PublicKey::from(&secret);
        Self { public, secret }
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret(&self) -> &PrivateKey {
        &self.secret
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Parse a 32-byte X25519 public key received from a collaborator.
pub fn public_key_from_slice(bytes: &[u8]) -> EnvcryptResult<PublicKey> {
    let arr: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
        EnvcryptError::InvalidKey(format!(
            "public key must be {KEY_SIZE} bytes, got {}",
            bytes.len()
        ))
    })?;
    Ok(PublicKey::from(arr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pmk_generation() {
        let k1 = generate_pmk().unwrap();
        let k2 = generate_pmk().unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
    }

    #[test]
    fn test_pmk_debug_redacted() {
        let pmk = ProjectMasterKey::from_bytes([9u8; KEY_SIZE]);
        let out = format!("{pmk:?}");
        assert!(out.contains("REDACTED"));
        assert!(!out.contains('9'));
    }

    #[test]
    fn test_keypair_public_matches_secret() {
        let kp = KeyPair::generate().unwrap();
        assert_eq!(kp.public(), &PublicKey::from(kp.secret()));
    }

    #[test]
    fn test_keypairs_differ() {
        let a = KeyPair::generate().unwrap();
        let b = KeyPair::generate().unwrap();
        assert_ne!(a.public().as_bytes(), b.public().as_bytes());
    }

    #[test]
    fn test_public_key_from_slice() {
        let kp = KeyPair::generate().unwrap();
        let parsed = public_key_from_slice(kp.public().as_bytes()).unwrap();
        assert_eq!(&parsed, kp.public());

        let err = public_key_from_slice(&[0u8; 31]).unwrap_err();
        assert!(matches!(err, EnvcryptError::InvalidKey(_)));
    }
}
