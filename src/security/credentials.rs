//! Instance credentials at rest.
//!
//! Credentials are stored encrypted and decrypted only at the point of use
//! (forwarding). AES-256-CBC with PKCS#7 padding, fixed key and IV,
//! hex-encoded ciphertext. Encryption is deterministic for a given key/IV.

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use thiserror::Error;

use crate::config::CredentialConfig;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential {field} must be {expected} bytes, got {actual}")]
    KeyLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("credential ciphertext is not valid hex")]
    Encoding,

    #[error("credential could not be decrypted")]
    Decrypt,
}

/// Symmetric encryption of instance credentials.
pub trait CredentialCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, CredentialError>;

    fn decrypt(&self, ciphertext: &str) -> Result<String, CredentialError>;
}

#[derive(Clone)]
pub struct AesCbcCipher {
    key: [u8; 32],
    iv: [u8; 16],
}

impl std::fmt::Debug for AesCbcCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_struct("AesCbcCipher").finish_non_exhaustive()
    }
}

impl AesCbcCipher {
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self, CredentialError> {
        let key: [u8; 32] = key.try_into().map_err(|_| CredentialError::KeyLength {
            field: "key",
            expected: 32,
            actual: key.len(),
        })?;
        let iv: [u8; 16] = iv.try_into().map_err(|_| CredentialError::KeyLength {
            field: "iv",
            expected: 16,
            actual: iv.len(),
        })?;
        Ok(Self { key, iv })
    }

    pub fn from_config(config: &CredentialConfig) -> Result<Self, CredentialError> {
        Self::new(config.key.as_bytes(), config.iv.as_bytes())
    }
}

impl CredentialCipher for AesCbcCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CredentialError> {
        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        Ok(hex::encode(ciphertext))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CredentialError> {
        let bytes = hex::decode(ciphertext).map_err(|_| CredentialError::Encoding)?;
        let plaintext = Aes256CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&bytes)
            .map_err(|_| CredentialError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| CredentialError::Decrypt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> AesCbcCipher {
        AesCbcCipher::from_config(&CredentialConfig::default()).unwrap()
    }

    #[test]
    fn test_known_ciphertext() {
        // Same key/IV/format as credentials already stored by earlier deployments.
        assert_eq!(
            cipher().encrypt("sk_live_abc123").unwrap(),
            "03d84dbd4fcdc6ffa6704173e5437a9f"
        );
        assert_eq!(
            cipher().decrypt("03d84dbd4fcdc6ffa6704173e5437a9f").unwrap(),
            "sk_live_abc123"
        );
    }

    #[test]
    fn test_deterministic() {
        let c = cipher();
        assert_eq!(c.encrypt("token").unwrap(), c.encrypt("token").unwrap());
    }

    #[test]
    fn test_rejects_bad_input() {
        let c = cipher();
        assert_eq!(c.decrypt("zz"), Err(CredentialError::Encoding));
        assert_eq!(c.decrypt("00112233"), Err(CredentialError::Decrypt));
    }

    #[test]
    fn test_key_length_checked() {
        let err = AesCbcCipher::new(b"short", b"1234567890123456").unwrap_err();
        assert_eq!(
            err,
            CredentialError::KeyLength {
                field: "key",
                expected: 32,
                actual: 5
            }
        );
    }
}
