use serde::{Deserialize, Serialize};

/// Why a version was appended to an environment's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionKind {
    /// First version of an environment
    Created,
    /// Any later push
    Updated,
    /// Re-append of an earlier version's plaintext
    Rollback,
}

impl VersionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Rollback => "rollback",
        }
    }
}

impl std::fmt::Display for VersionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata tag stored with every version record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    #[serde(rename = "type")]
    pub kind: VersionKind,
}

impl From<VersionKind> for VersionMetadata {
    fn from(kind: VersionKind) -> Self {
        Self { kind }
    }
}
