//! Signed bearer tokens (HS256 JWT).
//!
//! Claims carry the user id in `sub`, the account role, and issue/expiry
//! times as Unix seconds. Verification allows no clock leeway.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;
use crate::db::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl TokenManager {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    /// Sign a token for `user_id` valid from now.
    pub fn issue(&self, user_id: &str, role: Role) -> Result<String, AuthError> {
        self.issue_at(user_id, role, Utc::now().timestamp())
    }

    /// Sign a token as if issued at `issued_at` (Unix seconds).
    pub fn issue_at(&self, user_id: &str, role: Role, issued_at: i64) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iat: issued_at,
            exp: issued_at.saturating_add(self.ttl_secs),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(AuthError::Sign)
    }

    /// Check signature and expiry and return the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(AuthError::InvalidToken)
    }
}
