//! Standard base64 for binary fields in JSON records.
//!
//! Use with `#[serde(with = "...")]`. `bytes` handles `Vec<u8>`, `array`
//! handles fixed-size arrays and rejects input of any other length.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(s)
}

pub mod bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        super::decode(&s).map_err(serde::de::Error::custom)
    }
}

pub mod array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        data: &[u8; N],
        s: S,
    ) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        d: D,
    ) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(d)?;
        let raw = super::decode(&s).map_err(serde::de::Error::custom)?;
        <[u8; N]>::try_from(raw.as_slice()).map_err(|_| {
            serde::de::Error::custom(format!("expected {N} bytes, got {}", raw.len()))
        })
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        #[serde(with = "super::bytes")]
        blob: Vec<u8>,
        #[serde(with = "super::array")]
        key: [u8; 4],
    }

    #[test]
    fn binary_fields_are_base64_strings() {
        let rec = Record {
            blob: b"hello".to_vec(),
            key: [1, 2, 3, 4],
        };
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"blob":"aGVsbG8=","key":"AQIDBA=="}"#);

        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn array_rejects_wrong_length() {
        let json = r#"{"blob":"","key":"AQID"}"#;
        let err = serde_json::from_str::<Record>(json).unwrap_err();
        assert!(err.to_string().contains("expected 4 bytes"));
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let json = r#"{"blob":"!!!","key":"AQIDBA=="}"#;
        assert!(serde_json::from_str::<Record>(json).is_err());
    }
}
