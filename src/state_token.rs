//! # Signed OAuth State Tokens
//!
//! The `state` value round-tripped through a provider's authorization redirect
//! binds the callback to the user session that initiated it. Tokens are
//! HMAC-SHA256 signed over `{user_id, provider, nonce, issued_at}` with a
//! server-held secret and verified (constant-time) before any database write,
//! so a forged or tampered callback is rejected up front. Tokens are also
//! time-bounded independently of the stored state row.
//!
//! Wire format: `base64url(claims_json) "." base64url(hmac_sha256(secret, claims_b64))`

use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 16;

/// Claims carried inside a signed state token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateClaims {
    pub user_id: Uuid,
    pub provider: String,
    pub nonce: String,
    pub issued_at: i64,
}

/// Errors raised while verifying a state token
#[derive(Debug, Error, PartialEq)]
pub enum StateTokenError {
    #[error("state token is malformed")]
    Malformed,
    #[error("state token signature mismatch")]
    SignatureMismatch,
    #[error("state token expired {age_seconds}s ago")]
    Expired { age_seconds: i64 },
    #[error("state token issued for provider '{actual}', expected '{expected}'")]
    ProviderMismatch { expected: String, actual: String },
}

/// Issue a signed state token for the given user and provider.
pub fn issue(secret: &str, user_id: Uuid, provider: &str) -> String {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let claims = StateClaims {
        user_id,
        provider: provider.to_string(),
        nonce: base64_url::encode(&nonce_bytes),
        issued_at: Utc::now().timestamp(),
    };

    encode(secret, &claims)
}

fn encode(secret: &str, claims: &StateClaims) -> String {
    let claims_json = serde_json::to_vec(claims).expect("state claims serialize to JSON");
    let claims_b64 = base64_url::encode(&claims_json);
    let signature = sign(secret, claims_b64.as_bytes());
    format!("{}.{}", claims_b64, base64_url::encode(&signature))
}

fn sign(secret: &str, message: &[u8]) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Verify a state token: signature first, then provider binding and age.
///
/// `max_age_seconds` bounds the token lifetime independently of the stored
/// state row, so an old token is useless even if its row were still present.
pub fn verify(
    secret: &str,
    token: &str,
    expected_provider: &str,
    max_age_seconds: i64,
) -> Result<StateClaims, StateTokenError> {
    let (claims_b64, signature_b64) = token.split_once('.').ok_or(StateTokenError::Malformed)?;

    let provided_signature =
        base64_url::decode(signature_b64).map_err(|_| StateTokenError::Malformed)?;
    let expected_signature = sign(secret, claims_b64.as_bytes());

    let signature_valid: bool =
        ConstantTimeEq::ct_eq(&expected_signature[..], &provided_signature[..]).into();
    if !signature_valid {
        return Err(StateTokenError::SignatureMismatch);
    }

    let claims_json = base64_url::decode(claims_b64).map_err(|_| StateTokenError::Malformed)?;
    let claims: StateClaims =
        serde_json::from_slice(&claims_json).map_err(|_| StateTokenError::Malformed)?;

    if claims.provider != expected_provider {
        return Err(StateTokenError::ProviderMismatch {
            expected: expected_provider.to_string(),
            actual: claims.provider,
        });
    }

    let age_seconds = Utc::now().timestamp() - claims.issued_at;
    if age_seconds > max_age_seconds {
        return Err(StateTokenError::Expired {
            age_seconds: age_seconds - max_age_seconds,
        });
    }

    Ok(claims)
}
