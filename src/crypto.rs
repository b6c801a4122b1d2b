//! Token encryption module using AES-256-GCM
//!
//! Seals platform access tokens stored on account rows, binding the
//! ciphertext to the owning account id through additional authenticated
//! data so a ciphertext copied onto another row fails to open.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
};
use thiserror::Error;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

const VERSION_ENCRYPTED: u8 = 0x01;
const VERSION_FIELD_LEN: usize = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const MIN_ENCRYPTED_LEN: usize = VERSION_FIELD_LEN + NONCE_LEN + TAG_LEN;

/// Crypto error types
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("invalid ciphertext format")]
    InvalidFormat,
    #[error("empty ciphertext")]
    EmptyCiphertext,
    #[error("decrypted token is not valid UTF-8")]
    InvalidTokenEncoding,
}

/// Secure wrapper for encryption keys with zeroization
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct CryptoKey(Vec<u8>);

impl CryptoKey {
    /// Create a new crypto key from bytes
    pub fn new(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::EncryptionFailed(
                "Invalid key length: expected 32 bytes".to_string(),
            ));
        }
        Ok(CryptoKey(bytes))
    }

    /// Get the key as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Seal an access token for the given account.
pub fn seal_token(key: &CryptoKey, account_id: Uuid, token: &str) -> Result<Vec<u8>, CryptoError> {
    let cipher_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(cipher_key);

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let mut ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: token.as_bytes(),
                aad: account_id.as_bytes(),
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    // Version byte + nonce prefix the ciphertext
    let mut result = Vec::with_capacity(VERSION_FIELD_LEN + NONCE_LEN + ciphertext.len());
    result.push(VERSION_ENCRYPTED);
    result.extend_from_slice(&nonce);
    result.append(&mut ciphertext);

    Ok(result)
}

/// Open a sealed access token for the given account.
pub fn open_token(
    key: &CryptoKey,
    account_id: Uuid,
    ciphertext: &[u8],
) -> Result<String, CryptoError> {
    if ciphertext.is_empty() {
        return Err(CryptoError::EmptyCiphertext);
    }

    // Legacy plaintext payloads carry no version marker
    if ciphertext[0] != VERSION_ENCRYPTED {
        return String::from_utf8(ciphertext.to_vec())
            .map_err(|_| CryptoError::InvalidTokenEncoding);
    }

    if ciphertext.len() < MIN_ENCRYPTED_LEN {
        return Err(CryptoError::InvalidFormat);
    }

    let nonce = Nonce::from_slice(&ciphertext[VERSION_FIELD_LEN..VERSION_FIELD_LEN + NONCE_LEN]);
    let sealed = &ciphertext[VERSION_FIELD_LEN + NONCE_LEN..];

    let cipher_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(cipher_key);

    let plaintext = cipher
        .decrypt(
            nonce,
            Payload {
                msg: sealed,
                aad: account_id.as_bytes(),
            },
        )
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidTokenEncoding)
}

/// Determine if a payload is using the encrypted format
pub fn is_encrypted_payload(ciphertext: &[u8]) -> bool {
    ciphertext.len() >= MIN_ENCRYPTED_LEN && ciphertext[0] == VERSION_ENCRYPTED
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> CryptoKey {
        CryptoKey::new(vec![7u8; 32]).unwrap()
    }

    #[test]
    fn seal_and_open_round_trip() {
        let key = test_key();
        let account_id = Uuid::new_v4();

        let sealed = seal_token(&key, account_id, "IGQVJ-token").unwrap();
        assert!(is_encrypted_payload(&sealed));

        let opened = open_token(&key, account_id, &sealed).unwrap();
        assert_eq!(opened, "IGQVJ-token");
    }

    #[test]
    fn aad_binds_ciphertext_to_account() {
        let key = test_key();
        let sealed = seal_token(&key, Uuid::new_v4(), "token").unwrap();

        let result = open_token(&key, Uuid::new_v4(), &sealed);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = seal_token(&test_key(), Uuid::nil(), "token").unwrap();
        let other_key = CryptoKey::new(vec![9u8; 32]).unwrap();

        assert!(open_token(&other_key, Uuid::nil(), &sealed).is_err());
    }

    #[test]
    fn legacy_plaintext_passes_through() {
        let key = test_key();
        let opened = open_token(&key, Uuid::nil(), b"plain-token").unwrap();
        assert_eq!(opened, "plain-token");
    }

    #[test]
    fn empty_ciphertext_is_rejected() {
        let key = test_key();
        assert!(matches!(
            open_token(&key, Uuid::nil(), b""),
            Err(CryptoError::EmptyCiphertext)
        ));
    }

    #[test]
    fn short_key_is_rejected() {
        assert!(CryptoKey::new(vec![0u8; 16]).is_err());
    }
}
