//! envcrypt-env: secret documents and their encrypted version history
//!
//! Pipeline for every stored version:
//!
//! ```text
//! raw .env ─parse─▶ SecretDocument ─canonicalize─▶ KEY=VALUE\n… ─zstd─▶ ─AES-256-GCM(PMK)─▶ SealedDocument
//! ```
//!
//! Reading reverses it. Versions are appended to a [`history::VersionStore`]
//! and never rewritten; a rollback appends a fresh copy of an older version.

pub mod codec;
pub mod compress;
pub mod diff;
pub mod document;
pub mod history;

pub use codec::{
    decrypt, encrypt, from_storage, open_document, seal_document, to_storage, Codec,
    SealedDocument,
};
pub use diff::{diff, DiffResult};
pub use document::{canonicalize, parse, SecretDocument};
pub use history::{
    diff_versions, pull, pull_latest, push, rollback, EnvReadPayload, EnvVersionRecord,
    EnvWritePayload, MemoryVersionStore, VersionStore,
};
