//! Token issuance and password hashing.

pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub use password::{hash_password, verify_password, PasswordError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT generation error: {0}")]
    Generation(String),

    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Signs and verifies HS256 bearer tokens.
///
/// Built once at startup from the resolved secret and shared through
/// `AppState`; clones share the same keys.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
    expiry: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, expiry_hours: u64) -> Self {
        Self {
            encoding: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            expiry: Duration::hours(i64::try_from(expiry_hours).unwrap_or(72)),
        }
    }

    pub fn issue(&self, user_id: Uuid, email: &str) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            exp: (now + self.expiry).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Generation(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}
