//! envcrypt-crypto: identity and project key management for envcrypt
//!
//! Key hierarchy:
//! ```text
//! Password ──Argon2id(salt)──▶ Derived Key (256-bit, per identity)
//!   └── protects: X25519 private key (AES-256-GCM, random 96-bit nonce)
//!
//! Project Master Key (256-bit random, one per project)
//!   ├── Wrapped Key Record per recipient:
//!   │     X25519(ephemeral, recipient) ──▶ AES-256-GCM key ──▶ wrapped PMK
//!   └── encrypts every secret document of the project (envcrypt-env)
//! ```

pub mod aead;
pub mod envelope;
pub mod kdf;
pub mod keys;
pub mod vault;

pub use envelope::{grant, unwrap, wrap_for_recipient, ProjectCreatePayload, WrappedKeyRecord};
pub use kdf::{derive_key, generate_salt, DerivedKey, KdfParams};
pub use keys::{generate_pmk, public_key_from_slice, KeyPair, PrivateKey, ProjectMasterKey, PublicKey};
pub use vault::{
    protect_private_key, protect_private_key_with, reveal_private_key, EncryptedPrivateKeyBundle,
    UserIdentity,
};

/// Size of every symmetric key and X25519 key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of the per-identity Argon2id salt
pub const SALT_SIZE: usize = 16;
