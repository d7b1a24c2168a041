//! Project key envelope: wrap a project master key for one recipient
//!
//! ECIES-style construction over X25519:
//!
//! 1. Generate an ephemeral X25519 key pair
//! 2. `shared = X25519(ephemeral_secret, recipient_public)`
//! 3. `wrapped = AES-256-GCM(key = shared, nonce = random 12 bytes, pmk)`
//! 4. Store `(ephemeral_public, nonce, wrapped)`; drop the ephemeral secret
//!
//! The recipient recomputes `shared` from its private key and the stored
//! ephemeral public key. Low-order points are rejected on both sides.

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;
use x25519_dalek::{EphemeralSecret, StaticSecret};

use envcrypt_core::encoding;
use envcrypt_core::{EnvcryptError, EnvcryptResult};

use crate::aead;
use crate::keys::{ProjectMasterKey, PublicKey};
use crate::KEY_SIZE;

/// A project master key wrapped for exactly one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKeyRecord {
    #[serde(with = "encoding::array")]
    pub ephemeral_public_key: [u8; KEY_SIZE],
    #[serde(rename = "wrap_nonce", with = "encoding::bytes")]
    pub nonce: Vec<u8>,
    #[serde(rename = "wrapped_pmk", with = "encoding::bytes")]
    pub ciphertext: Vec<u8>,
}

impl WrappedKeyRecord {
    /// Unwrap the key, hand it to `f`, and drop it before returning.
    pub fn with_pmk<T, E>(
        &self,
        recipient_secret: &StaticSecret,
        f: impl FnOnce(&ProjectMasterKey) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<EnvcryptError>,
    {
        let pmk = unwrap(self, recipient_secret)?;
        f(&pmk)
    }
}

/// Wrap `pmk` so that only the holder of `recipient`'s private key can recover it.
///
/// Fails with `InvalidKey` if `recipient` is a low-order point.
pub fn wrap_for_recipient(
    pmk: &ProjectMasterKey,
    recipient: &PublicKey,
) -> EnvcryptResult<WrappedKeyRecord> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral);

    let shared = ephemeral.diffie_hellman(recipient);
    if !shared.was_contributory() {
        return Err(EnvcryptError::InvalidKey(
            "recipient public key is a low-order point".into(),
        ));
    }

    let (ciphertext, nonce) = aead::seal(shared.as_bytes(), pmk.as_bytes())?;
    debug!(
        recipient = %encoding::encode(recipient.as_bytes()),
        "wrapped project key"
    );

    Ok(WrappedKeyRecord {
        ephemeral_public_key: ephemeral_public.to_bytes(),
        nonce: nonce.to_vec(),
        ciphertext,
    })
}

/// Recover the project master key from a record addressed to `recipient_secret`.
///
/// Wrong recipient, tampering, truncation and low-order ephemeral keys all
/// surface as `Authentication`. An authenticated payload that is not 32
/// bytes is `Corruption`.
pub fn unwrap(
    record: &WrappedKeyRecord,
    recipient_secret: &StaticSecret,
) -> EnvcryptResult<ProjectMasterKey> {
    let ephemeral = PublicKey::from(record.ephemeral_public_key);
    let shared = recipient_secret.diffie_hellman(&ephemeral);
    if !shared.was_contributory() {
        return Err(EnvcryptError::Authentication);
    }

    let plaintext = aead::open(shared.as_bytes(), &record.ciphertext, &record.nonce)?;
    let bytes: [u8; KEY_SIZE] = plaintext.as_slice().try_into().map_err(|_| {
        EnvcryptError::Corruption(format!(
            "wrapped key has wrong size: {} bytes (expected {KEY_SIZE})",
            plaintext.len()
        ))
    })?;

    Ok(ProjectMasterKey::from_bytes(bytes))
}

/// Share access: unwrap with the owner's key and re-wrap for a new recipient.
///
/// The owner's record is left untouched.
pub fn grant(
    owner_record: &WrappedKeyRecord,
    owner_secret: &StaticSecret,
    recipient: &PublicKey,
) -> EnvcryptResult<WrappedKeyRecord> {
    owner_record.with_pmk(owner_secret, |pmk| wrap_for_recipient(pmk, recipient))
}

/// What the project collaborator receives when a project is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCreatePayload {
    pub project_name: String,
    pub owner_id: Uuid,
    #[serde(flatten)]
    pub wrapped: WrappedKeyRecord,
}

impl ProjectCreatePayload {
    /// Generate a fresh project master key and wrap it for the owner.
    ///
    /// The key itself is returned so the caller can seal the first document
    /// without an immediate unwrap; it must not be persisted.
    pub fn new(
        project_name: &str,
        owner_id: Uuid,
        owner_public: &PublicKey,
    ) -> EnvcryptResult<(Self, ProjectMasterKey)> {
        let pmk = crate::keys::generate_pmk()?;
        let wrapped = wrap_for_recipient(&pmk, owner_public)?;
        debug!(project = project_name, owner = %owner_id, "project key created");

        Ok((
            Self {
                project_name: project_name.to_string(),
                owner_id,
                wrapped,
            },
            pmk,
        ))
    }
}
