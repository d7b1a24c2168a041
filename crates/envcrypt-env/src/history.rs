//! Append-only version history for one project environment
//!
//! Every push seals the document under the project key and appends a new
//! record. Records are never rewritten or removed; `rollback` restores an
//! older version by appending a freshly sealed copy of it.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use envcrypt_core::types::{VersionKind, VersionMetadata};
use envcrypt_core::{EnvcryptError, EnvcryptResult};
use envcrypt_crypto::ProjectMasterKey;

use crate::codec::{Codec, SealedDocument};
use crate::diff::DiffResult;
use crate::document::SecretDocument;

/// One immutable entry in an environment's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVersionRecord {
    pub version: u32,
    #[serde(flatten)]
    pub sealed: SealedDocument,
    pub metadata: VersionMetadata,
}

/// What a writer sends to the version store collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvWritePayload {
    pub project_id: Uuid,
    pub env_name: String,
    #[serde(flatten)]
    pub sealed: SealedDocument,
    pub metadata: VersionMetadata,
}

/// What a reader receives for a single version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvReadPayload {
    #[serde(flatten)]
    pub sealed: SealedDocument,
}

impl From<&EnvVersionRecord> for EnvReadPayload {
    fn from(record: &EnvVersionRecord) -> Self {
        Self {
            sealed: record.sealed.clone(),
        }
    }
}

/// Storage for sealed versions of one environment.
///
/// Implementations assign version numbers: the first record is 1 and each
/// append returns the previous maximum plus one.
pub trait VersionStore {
    fn append(&mut self, sealed: SealedDocument, kind: VersionKind) -> EnvcryptResult<u32>;

    fn get(&self, version: u32) -> Option<&EnvVersionRecord>;

    fn latest(&self) -> Option<&EnvVersionRecord>;

    /// All records, oldest first.
    fn records(&self) -> &[EnvVersionRecord];
}

/// In-memory history, serializable as a whole to JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryVersionStore {
    pub project_id: Uuid,
    pub env_name: String,
    #[serde(default)]
    records: Vec<EnvVersionRecord>,
}

impl MemoryVersionStore {
    pub fn new(project_id: Uuid, env_name: impl Into<String>) -> Self {
        Self {
            project_id,
            env_name: env_name.into(),
            records: Vec::new(),
        }
    }

    /// Load a history previously written with `to_json`, checking that
    /// version numbers run 1, 2, 3, ... without gaps.
    pub fn from_json(json: &str) -> EnvcryptResult<Self> {
        let store: Self = serde_json::from_str(json)?;
        for (idx, record) in store.records.iter().enumerate() {
            let expected = idx as u32 + 1;
            if record.version != expected {
                return Err(EnvcryptError::Corruption(format!(
                    "history out of order: found version {} at position {expected}",
                    record.version
                )));
            }
        }
        Ok(store)
    }

    pub fn to_json(&self) -> EnvcryptResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The payload a remote store would have received for `version`.
    pub fn write_payload(&self, version: u32) -> EnvcryptResult<EnvWritePayload> {
        let record = self.get(version).ok_or(EnvcryptError::VersionNotFound(version))?;
        Ok(EnvWritePayload {
            project_id: self.project_id,
            env_name: self.env_name.clone(),
            sealed: record.sealed.clone(),
            metadata: record.metadata,
        })
    }

    pub fn read_payload(&self, version: u32) -> EnvcryptResult<EnvReadPayload> {
        self.get(version)
            .map(EnvReadPayload::from)
            .ok_or(EnvcryptError::VersionNotFound(version))
    }
}

impl VersionStore for MemoryVersionStore {
    fn append(&mut self, sealed: SealedDocument, kind: VersionKind) -> EnvcryptResult<u32> {
        let version = self.records.last().map_or(1, |r| r.version + 1);
        self.records.push(EnvVersionRecord {
            version,
            sealed,
            metadata: kind.into(),
        });
        Ok(version)
    }

    fn get(&self, version: u32) -> Option<&EnvVersionRecord> {
        // Versions are dense from 1, so the index is version - 1
        let idx = usize::try_from(version).ok()?.checked_sub(1)?;
        self.records.get(idx).filter(|r| r.version == version)
    }

    fn latest(&self) -> Option<&EnvVersionRecord> {
        self.records.last()
    }

    fn records(&self) -> &[EnvVersionRecord] {
        &self.records
    }
}

/// Seal `doc` and append it: `created` on an empty history, `updated` otherwise.
pub fn push<S: VersionStore>(
    store: &mut S,
    codec: &Codec,
    pmk: &ProjectMasterKey,
    doc: &SecretDocument,
) -> EnvcryptResult<u32> {
    let kind = if store.latest().is_none() {
        VersionKind::Created
    } else {
        VersionKind::Updated
    };

    let sealed = codec.seal(pmk, doc)?;
    let version = store.append(sealed, kind)?;
    debug!(version, kind = %kind, entries = doc.len(), "pushed version");
    Ok(version)
}

pub fn pull<S: VersionStore>(
    store: &S,
    codec: &Codec,
    pmk: &ProjectMasterKey,
    version: u32,
) -> EnvcryptResult<SecretDocument> {
    let record = store
        .get(version)
        .ok_or(EnvcryptError::VersionNotFound(version))?;
    codec.open(pmk, &record.sealed)
}

/// Pull the newest version. An empty history reports `VersionNotFound(0)`.
pub fn pull_latest<S: VersionStore>(
    store: &S,
    codec: &Codec,
    pmk: &ProjectMasterKey,
) -> EnvcryptResult<(u32, SecretDocument)> {
    let record = store.latest().ok_or(EnvcryptError::VersionNotFound(0))?;
    let doc = codec.open(pmk, &record.sealed)?;
    Ok((record.version, doc))
}

pub fn diff_versions<S: VersionStore>(
    store: &S,
    codec: &Codec,
    pmk: &ProjectMasterKey,
    old: u32,
    new: u32,
) -> EnvcryptResult<DiffResult> {
    let old_doc = pull(store, codec, pmk, old)?;
    let new_doc = pull(store, codec, pmk, new)?;
    Ok(DiffResult::compute(&old_doc, &new_doc))
}

/// Restore `version` by appending a re-sealed copy tagged `rollback`.
pub fn rollback<S: VersionStore>(
    store: &mut S,
    codec: &Codec,
    pmk: &ProjectMasterKey,
    version: u32,
) -> EnvcryptResult<u32> {
    let doc = pull(store, codec, pmk, version)?;
    let sealed = codec.seal(pmk, &doc)?;
    let new_version = store.append(sealed, VersionKind::Rollback)?;
    debug!(from = version, version = new_version, "rolled back");
    Ok(new_version)
}
