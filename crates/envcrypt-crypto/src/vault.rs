//! Identity credential vault: password-protected X25519 private keys
//!
//! A user's private key is stored only as an [`EncryptedPrivateKeyBundle`]:
//! AES-256-GCM under an Argon2id key derived from the password and a random
//! per-identity salt. The bundle records the KDF parameters it was made with.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;
use x25519_dalek::StaticSecret;
use zeroize::Zeroizing;

use envcrypt_core::encoding;
use envcrypt_core::{EnvcryptError, EnvcryptResult};

use crate::aead;
use crate::kdf::{derive_key, generate_salt, KdfParams};
use crate::keys::{KeyPair, PrivateKey, PublicKey};
use crate::{KEY_SIZE, SALT_SIZE};

/// Encrypted private key plus everything needed to re-derive its key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPrivateKeyBundle {
    /// AES-256-GCM ciphertext (with tag) of the raw 32-byte private key
    #[serde(rename = "encrypted_private_key", with = "encoding::bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(rename = "private_key_salt", with = "encoding::array")]
    pub salt: [u8; SALT_SIZE],
    #[serde(rename = "private_key_nonce", with = "encoding::bytes")]
    pub nonce: Vec<u8>,
    #[serde(rename = "kdf_params")]
    pub kdf: KdfParams,
}

impl EncryptedPrivateKeyBundle {
    /// Reveal using the parameters stored in the bundle.
    pub fn reveal(&self, password: &SecretString) -> EnvcryptResult<PrivateKey> {
        reveal_private_key(self, password, &self.kdf)
    }
}

/// Protect a private key with a password using the default KDF parameters.
pub fn protect_private_key(
    private_key: &PrivateKey,
    password: &SecretString,
) -> EnvcryptResult<EncryptedPrivateKeyBundle> {
    protect_private_key_with(private_key, password, &KdfParams::default())
}

/// Protect a private key with a password and explicit KDF parameters.
///
/// A fresh salt and nonce are drawn for every call.
pub fn protect_private_key_with(
    private_key: &PrivateKey,
    password: &SecretString,
    params: &KdfParams,
) -> EnvcryptResult<EncryptedPrivateKeyBundle> {
    let salt = generate_salt()?;
    let key = derive_key(password, &salt, params)?;

    let raw = Zeroizing::new(private_key.to_bytes());
    let (ciphertext, nonce) = aead::seal(key.as_bytes(), &raw[..])?;

    Ok(EncryptedPrivateKeyBundle {
        ciphertext,
        salt,
        nonce: nonce.to_vec(),
        kdf: *params,
    })
}

/// Recover a private key from its bundle.
///
/// Any AEAD failure (wrong password, wrong params, tampering, truncation) is
/// `Authentication`. A successfully authenticated plaintext that is not
/// exactly 32 bytes is `Corruption`.
pub fn reveal_private_key(
    bundle: &EncryptedPrivateKeyBundle,
    password: &SecretString,
    params: &KdfParams,
) -> EnvcryptResult<PrivateKey> {
    let key = derive_key(password, &bundle.salt, params)?;
    let plaintext = aead::open(key.as_bytes(), &bundle.ciphertext, &bundle.nonce)?;

    if plaintext.len() != KEY_SIZE {
        return Err(EnvcryptError::Corruption(format!(
            "private key has wrong size: {} bytes (expected {KEY_SIZE})",
            plaintext.len()
        )));
    }

    let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
    bytes.copy_from_slice(&plaintext);
    Ok(StaticSecret::from(*bytes))
}

/// A registered user as persisted by the identity collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: Uuid,
    pub email: String,
    #[serde(with = "encoding::array")]
    pub public_key: [u8; KEY_SIZE],
    #[serde(flatten)]
    pub encrypted_private_key: EncryptedPrivateKeyBundle,
}

impl UserIdentity {
    /// Register a new identity: generate a key pair and protect its private half.
    ///
    /// The returned [`KeyPair`] is the caller's session key; only the
    /// `UserIdentity` may be persisted.
    pub fn create(
        email: &str,
        password: &SecretString,
        params: &KdfParams,
    ) -> EnvcryptResult<(Self, KeyPair)> {
        let keypair = KeyPair::generate()?;
        let encrypted_private_key = protect_private_key_with(keypair.secret(), password, params)?;

        let identity = Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            public_key: keypair.public().to_bytes(),
            encrypted_private_key,
        };
        debug!(id = %identity.id, email = %identity.email, "identity created");

        Ok((identity, keypair))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(self.public_key)
    }

    /// Unlock the session key pair with the user's password.
    ///
    /// Fails with `Corruption` if the revealed private key does not belong
    /// to the recorded public key.
    pub fn unlock(&self, password: &SecretString) -> EnvcryptResult<KeyPair> {
        let secret = self.encrypted_private_key.reveal(password)?;
        let keypair = KeyPair::from_secret(secret);

        if keypair.public().as_bytes() != &self.public_key {
            return Err(EnvcryptError::Corruption(
                "private key does not match recorded public key".into(),
            ));
        }

        debug!(id = %self.id, "identity unlocked");
        Ok(keypair)
    }
}
