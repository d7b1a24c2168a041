use thiserror::Error;

pub type EnvcryptResult<T> = Result<T, EnvcryptError>;

#[derive(Debug, Error)]
pub enum EnvcryptError {
    /// The CSPRNG failed or Argon2id rejected its parameters.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// An AEAD open failed. Carries no detail: a wrong password or key and
    /// a tampered or truncated ciphertext are indistinguishable.
    #[error("authentication failed")]
    Authentication,

    /// Authenticated data that still does not decode (bad stream, bad length).
    #[error("corrupted data: {0}")]
    Corruption(String),

    #[error("malformed line {line}: expected KEY=VALUE")]
    Parse { line: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("version not found: {0}")]
    VersionNotFound(u32),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for EnvcryptError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl EnvcryptError {
    /// True for the single opaque AEAD failure outcome.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_message_has_no_detail() {
        assert_eq!(EnvcryptError::Authentication.to_string(), "authentication failed");
    }

    #[test]
    fn parse_error_names_line() {
        let e = EnvcryptError::Parse { line: 7 };
        assert!(e.to_string().contains("line 7"));
    }

    #[test]
    fn json_errors_become_serialization() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let e: EnvcryptError = err.into();
        assert!(matches!(e, EnvcryptError::Serialization(_)));
    }
}
