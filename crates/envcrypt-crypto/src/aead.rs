//! AES-256-GCM seal/open shared by the vault, the envelope and the codec
//!
//! Ciphertext layout: `[N bytes: ciphertext][16 bytes: GCM tag]`, with the
//! 12-byte nonce carried separately in every record.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use envcrypt_core::{EnvcryptError, EnvcryptResult};

use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Fill `buf` from the OS CSPRNG, surfacing exhaustion as an error.
pub fn fill_random(buf: &mut [u8]) -> EnvcryptResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| EnvcryptError::KeyDerivation(format!("randomness source failed: {e}")))
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
///
/// Returns `(ciphertext || tag, nonce)`.
pub fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> EnvcryptResult<(Vec<u8>, [u8; NONCE_SIZE])> {
    let cipher = Aes256Gcm::new(key.into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    fill_random(&mut nonce_bytes)?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| EnvcryptError::Serialization(format!("AES-256-GCM seal failed: {e}")))?;

    Ok((ciphertext, nonce_bytes))
}

/// Decrypt and authenticate `ciphertext` (as produced by [`seal`]).
///
/// Every failure, including a nonce of the wrong length or a ciphertext
/// shorter than the tag, is reported as `Authentication`.
pub fn open(key: &[u8; KEY_SIZE], ciphertext: &[u8], nonce: &[u8]) -> EnvcryptResult<Zeroizing<Vec<u8>>> {
    if nonce.len() != NONCE_SIZE || ciphertext.len() < TAG_SIZE {
        return Err(EnvcryptError::Authentication);
    }

    let cipher = Aes256Gcm::new(key.into());
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| EnvcryptError::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; KEY_SIZE] = [7u8; KEY_SIZE];

    #[test]
    fn test_seal_open_roundtrip() {
        let (ct, nonce) = seal(&KEY, b"hello, sealed world").unwrap();
        let pt = open(&KEY, &ct, &nonce).unwrap();
        assert_eq!(pt.as_slice(), b"hello, sealed world");
    }

    #[test]
    fn test_ciphertext_size() {
        let (ct, _) = seal(&KEY, &[0u8; 100]).unwrap();
        assert_eq!(ct.len(), 100 + TAG_SIZE);
    }

    #[test]
    fn test_fresh_nonce_per_seal() {
        let (ct1, n1) = seal(&KEY, b"same").unwrap();
        let (ct2, n2) = seal(&KEY, b"same").unwrap();
        assert_ne!(n1, n2);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_wrong_key() {
        let (ct, nonce) = seal(&KEY, b"secret").unwrap();
        let err = open(&[8u8; KEY_SIZE], &ct, &nonce).unwrap_err();
        assert!(err.is_authentication());
    }

    #[test]
    fn test_wrong_nonce_length() {
        let (ct, nonce) = seal(&KEY, b"secret").unwrap();
        let err = open(&KEY, &ct, &nonce[..8]).unwrap_err();
        assert!(err.is_authentication());
    }

    #[test]
    fn test_truncated_ciphertext() {
        let (ct, nonce) = seal(&KEY, b"secret").unwrap();
        assert!(open(&KEY, &ct[..ct.len() - 1], &nonce).unwrap_err().is_authentication());
        assert!(open(&KEY, &ct[..4], &nonce).unwrap_err().is_authentication());
    }
}
