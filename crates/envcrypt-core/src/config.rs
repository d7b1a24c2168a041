use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{EnvcryptError, EnvcryptResult};

/// Top-level configuration (loaded from envcrypt.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvcryptConfig {
    pub crypto: CryptoConfig,
    pub codec: CodecConfig,
    pub store: StoreConfig,
    pub log: LogConfig,
}

/// Argon2id cost parameters for newly protected identities.
///
/// Existing identities always carry the parameters they were created with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id parallelism (default: 1)
    pub argon2_parallelism: u32,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            argon2_time_cost: 3,
            argon2_mem_cost_kib: 65536,
            argon2_parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// zstd level for canonical documents (default: 3)
    pub compression_level: i32,
    /// Ceiling on decompressed document size in bytes (default: 1 MiB)
    pub max_document_bytes: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            compression_level: 3,
            max_document_bytes: 1024 * 1024,
        }
    }
}

/// Local record store used by the CLI in place of the remote server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding identity, project and history JSON files
    pub data_dir: PathBuf,
    /// Environment name used when none is given on the command line
    pub env_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".envcrypt"),
            env_name: "default".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl EnvcryptConfig {
    /// Load from a TOML file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> EnvcryptResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| EnvcryptError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml(&content)
            .map_err(|e| EnvcryptError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}
