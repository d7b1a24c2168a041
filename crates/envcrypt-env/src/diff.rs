use std::collections::BTreeSet;

use serde::Serialize;

use crate::document::SecretDocument;

/// Key-level changes between two document versions.
///
/// Only key names are recorded; values never leave the documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    /// Keys present only in the newer version
    pub added: BTreeSet<String>,

    /// Keys present only in the older version
    pub removed: BTreeSet<String>,

    /// Keys present in both with different values
    pub modified: BTreeSet<String>,
}

impl DiffResult {
    /// Compute the diff from `old` to `new`.
    pub fn compute(old: &SecretDocument, new: &SecretDocument) -> Self {
        let mut diff = DiffResult::default();

        for (key, new_value) in new.iter() {
            match old.get(key) {
                Some(old_value) if old_value != new_value => {
                    diff.modified.insert(key.to_string());
                }
                Some(_) => {}
                None => {
                    diff.added.insert(key.to_string());
                }
            }
        }

        for key in old.keys() {
            if !new.contains_key(key) {
                diff.removed.insert(key.to_string());
            }
        }

        diff
    }

    /// Returns true if the versions hold identical entries.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Summary of the diff for display.
    pub fn summary(&self) -> String {
        format!(
            "added={}, removed={}, modified={}",
            self.added.len(),
            self.removed.len(),
            self.modified.len(),
        )
    }
}

pub fn diff(old: &SecretDocument, new: &SecretDocument) -> DiffResult {
    DiffResult::compute(old, new)
}
