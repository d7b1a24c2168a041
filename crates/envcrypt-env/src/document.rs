//! Secret documents: parsing and canonical serialization of `.env` content
//!
//! Format: UTF-8, one `KEY=VALUE` per line. Blank lines and lines starting
//! with `#` are ignored. Key and value are trimmed; the value is everything
//! after the first `=`, so values may themselves contain `=`. When a key
//! repeats, the last occurrence wins.
//!
//! The canonical form sorts keys ascending and emits `KEY=VALUE\n` for each,
//! which makes equal documents byte-identical before compression.

use std::collections::BTreeMap;

use zeroize::{Zeroize, Zeroizing};

use envcrypt_core::{EnvcryptError, EnvcryptResult};

/// A set of secret key/value pairs.
///
/// Values are zeroized on drop and never appear in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretDocument {
    entries: BTreeMap<String, String>,
}

impl SecretDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value, returning the previous one.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<Zeroizing<String>> {
        self.entries.insert(key.into(), value.into()).map(Zeroizing::new)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<Zeroizing<String>> {
        self.entries.remove(key).map(Zeroizing::new)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Drop for SecretDocument {
    fn drop(&mut self) {
        for value in self.entries.values_mut() {
            value.zeroize();
        }
    }
}

impl std::fmt::Debug for SecretDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretDocument")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SecretDocument {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut doc = Self::new();
        for (k, v) in iter {
            doc.insert(k, v);
        }
        doc
    }
}

/// Parse raw `.env` bytes into a document.
///
/// Errors name only the 1-based line number; line content may be secret.
pub fn parse(raw: &[u8]) -> EnvcryptResult<SecretDocument> {
    let mut doc = SecretDocument::new();

    for (idx, raw_line) in raw.split(|&b| b == b'\n').enumerate() {
        let line_no = idx + 1;
        let line = std::str::from_utf8(raw_line)
            .map_err(|_| EnvcryptError::Parse { line: line_no })?
            .trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or(EnvcryptError::Parse { line: line_no })?;
        doc.insert(key.trim(), value.trim());
    }

    Ok(doc)
}

/// Serialize a document to its canonical byte form.
///
/// Entries that would not survive a round trip through [`parse`] are
/// rejected with `Serialization`.
pub fn canonicalize(doc: &SecretDocument) -> EnvcryptResult<Zeroizing<Vec<u8>>> {
    let mut out = Zeroizing::new(Vec::new());

    for (key, value) in doc.iter() {
        if let Some(reason) = unstorable(key, value) {
            return Err(EnvcryptError::Serialization(format!(
                "entry {key:?} cannot be stored: {reason}"
            )));
        }
        out.extend_from_slice(key.as_bytes());
        out.push(b'=');
        out.extend_from_slice(value.as_bytes());
        out.push(b'\n');
    }

    Ok(out)
}

fn unstorable(key: &str, value: &str) -> Option<&'static str> {
    if key.contains('=') {
        Some("key contains '='")
    } else if key.starts_with('#') {
        Some("key starts with '#'")
    } else if key.contains('\n') || value.contains('\n') {
        Some("newline in key or value")
    } else if key.trim() != key || value.trim() != value {
        Some("leading or trailing whitespace")
    } else {
        None
    }
}
