//! Token encryption module using AES-256-GCM
//!
//! Encryption and decryption utilities for the access and refresh tokens
//! stored on credential rows, using AES-256-GCM with additional authenticated
//! data (AAD) binding each ciphertext to its owning (user, service) pair.

#![allow(deprecated)]

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::models::credential::Model as CredentialModel;

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
}

/// Secure wrapper for encryption keys with zeroization
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct ZeroizingKey(Vec<u8>);

/// Type alias for crypto keys
pub type CryptoKey = ZeroizingKey;

impl CryptoKey {
    /// Create a new crypto key from bytes
    pub fn new(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::EncryptionFailed(
                "Invalid key length: expected 32 bytes".to_string(),
            ));
        }
        Ok(ZeroizingKey(bytes))
    }

    /// Get the key as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// AAD string binding a ciphertext to its credential row
fn credential_aad(credential: &CredentialModel) -> String {
    format!("{}|{}", credential.user_id, credential.service)
}

/// Encrypt bytes using AES-256-GCM
pub fn encrypt_bytes(
    key: &CryptoKey,
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(cipher_key);

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let mut ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
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

/// Decrypt bytes using AES-256-GCM
pub fn decrypt_bytes(
    key: &CryptoKey,
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.is_empty() {
        return Err(CryptoError::EmptyCiphertext);
    }

    // Payloads without the version marker are legacy plaintext
    if ciphertext[0] != VERSION_ENCRYPTED {
        return Ok(ciphertext.to_vec());
    }

    if ciphertext.len() < MIN_ENCRYPTED_LEN {
        return Err(CryptoError::InvalidFormat);
    }

    let nonce = Nonce::from_slice(&ciphertext[VERSION_FIELD_LEN..VERSION_FIELD_LEN + NONCE_LEN]);
    let tag_and_ct = &ciphertext[VERSION_FIELD_LEN + NONCE_LEN..];

    debug_assert!(tag_and_ct.len() >= TAG_LEN);

    let cipher_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(cipher_key);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: tag_and_ct,
                aad,
            },
        )
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

/// Determine if a payload is using the encrypted format
pub fn is_encrypted_payload(ciphertext: &[u8]) -> bool {
    ciphertext.len() >= MIN_ENCRYPTED_LEN && ciphertext[0] == VERSION_ENCRYPTED
}

/// Type alias for encrypted token result
type EncryptedTokens = Result<(Option<Vec<u8>>, Option<Vec<u8>>), CryptoError>;

/// Encrypt tokens for a credential row
pub fn encrypt_credential_tokens(
    key: &CryptoKey,
    credential: &CredentialModel,
    access_token: Option<&str>,
    refresh_token: Option<&str>,
) -> EncryptedTokens {
    let aad = credential_aad(credential);

    let encrypted_access_token = access_token
        .map(|token| encrypt_bytes(key, aad.as_bytes(), token.as_bytes()))
        .transpose()?;

    let encrypted_refresh_token = refresh_token
        .map(|token| encrypt_bytes(key, aad.as_bytes(), token.as_bytes()))
        .transpose()?;

    Ok((encrypted_access_token, encrypted_refresh_token))
}

/// Type alias for decrypted token result
type DecryptedTokens = Result<(Option<String>, Option<String>), CryptoError>;

/// Decrypt tokens for a credential row
pub fn decrypt_credential_tokens(key: &CryptoKey, credential: &CredentialModel) -> DecryptedTokens {
    let aad = credential_aad(credential);

    let decrypt_field = |ciphertext: Option<&Vec<u8>>| -> Result<Option<String>, CryptoError> {
        match ciphertext {
            Some(token) => decrypt_bytes(key, aad.as_bytes(), token)
                .and_then(|bytes| {
                    String::from_utf8(bytes).map_err(|e| {
                        CryptoError::DecryptionFailed(format!("Invalid UTF-8: {}", e))
                    })
                })
                .map(Some),
            None => Ok(None),
        }
    };

    let access = decrypt_field(credential.access_token_ciphertext.as_ref())?;
    let refresh = decrypt_field(credential.refresh_token_ciphertext.as_ref())?;

    Ok((access, refresh))
}
