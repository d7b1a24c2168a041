//! Sealing documents under a project master key
//!
//! `to_storage` and `from_storage` handle the plaintext half of the pipeline
//! (parse, canonicalize, compress); `encrypt` and `decrypt` the AEAD half.
//! `seal_document` / `open_document` compose both.

use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use envcrypt_core::config::CodecConfig;
use envcrypt_core::encoding;
use envcrypt_core::{EnvcryptError, EnvcryptResult};
use envcrypt_crypto::{aead, ProjectMasterKey};

use crate::compress::{self, DEFAULT_LEVEL, DEFAULT_MAX_DOCUMENT_BYTES};
use crate::document::{canonicalize, parse, SecretDocument};

/// One encrypted document version as handed to the version store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedDocument {
    #[serde(with = "encoding::bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "encoding::bytes")]
    pub nonce: Vec<u8>,
}

/// Compression settings for the document pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    pub level: i32,
    pub max_document_bytes: usize,
}

impl Default for Codec {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

impl From<&CodecConfig> for Codec {
    fn from(config: &CodecConfig) -> Self {
        Self {
            level: config.compression_level,
            max_document_bytes: config.max_document_bytes,
        }
    }
}

impl Codec {
    /// Canonicalize and compress a parsed document.
    pub fn pack(&self, doc: &SecretDocument) -> EnvcryptResult<Vec<u8>> {
        let canonical = canonicalize(doc)?;
        if canonical.len() > self.max_document_bytes {
            return Err(EnvcryptError::Serialization(format!(
                "document is {} bytes, limit is {}",
                canonical.len(),
                self.max_document_bytes
            )));
        }
        compress::compress(&canonical, self.level)
    }

    /// `compress(canonicalize(parse(raw)))`
    pub fn to_storage(&self, raw: &[u8]) -> EnvcryptResult<Vec<u8>> {
        self.pack(&parse(raw)?)
    }

    /// `parse(decompress(bytes))`
    pub fn from_storage(&self, bytes: &[u8]) -> EnvcryptResult<SecretDocument> {
        let plain = compress::decompress(bytes, self.max_document_bytes)?;
        parse(&plain)
    }

    pub fn seal(&self, pmk: &ProjectMasterKey, doc: &SecretDocument) -> EnvcryptResult<SealedDocument> {
        let packed = Zeroizing::new(self.pack(doc)?);
        let sealed = encrypt(pmk, &packed)?;
        debug!(entries = doc.len(), bytes = sealed.ciphertext.len(), "document sealed");
        Ok(sealed)
    }

    /// Decrypt and decode a sealed version.
    ///
    /// Once the ciphertext has authenticated, any decoding failure means the
    /// writer stored something malformed and is reported as `Corruption`.
    pub fn open(&self, pmk: &ProjectMasterKey, sealed: &SealedDocument) -> EnvcryptResult<SecretDocument> {
        let packed = decrypt(pmk, &sealed.ciphertext, &sealed.nonce)?;
        self.from_storage(&packed).map_err(|e| match e {
            EnvcryptError::Parse { line } => {
                EnvcryptError::Corruption(format!("stored document malformed at line {line}"))
            }
            other => other,
        })
    }
}

/// AES-256-GCM encrypt under the project key with a fresh nonce.
pub fn encrypt(pmk: &ProjectMasterKey, plaintext: &[u8]) -> EnvcryptResult<SealedDocument> {
    let (ciphertext, nonce) = aead::seal(pmk.as_bytes(), plaintext)?;
    Ok(SealedDocument {
        ciphertext,
        nonce: nonce.to_vec(),
    })
}

pub fn decrypt(
    pmk: &ProjectMasterKey,
    ciphertext: &[u8],
    nonce: &[u8],
) -> EnvcryptResult<Zeroizing<Vec<u8>>> {
    aead::open(pmk.as_bytes(), ciphertext, nonce)
}

pub fn to_storage(raw: &[u8]) -> EnvcryptResult<Vec<u8>> {
    Codec::default().to_storage(raw)
}

pub fn from_storage(bytes: &[u8]) -> EnvcryptResult<SecretDocument> {
    Codec::default().from_storage(bytes)
}

pub fn seal_document(pmk: &ProjectMasterKey, doc: &SecretDocument) -> EnvcryptResult<SealedDocument> {
    Codec::default().seal(pmk, doc)
}

pub fn open_document(pmk: &ProjectMasterKey, sealed: &SealedDocument) -> EnvcryptResult<SecretDocument> {
    Codec::default().open(pmk, sealed)
}
