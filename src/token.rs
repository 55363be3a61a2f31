//! Bearer token validation.
//!
//! A [`Claims`] value is only ever produced by [`TokenValidator::validate`],
//! after the signature has been verified. Code holding a `Claims` can rely
//! on the subject being present and non-empty.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Error;

/// Verified token payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The subject claim — the identity the token was issued for.
    pub sub: String,
    /// Expiry as a unix timestamp. Validated when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// Why a token was rejected. Logged server-side; never sent to the client.
#[derive(Debug, Error)]
pub enum InvalidToken {
    #[error("token rejected: {0}")]
    Rejected(#[from] jsonwebtoken::errors::Error),

    #[error("subject claim is missing or empty")]
    MissingSubject,
}

/// Verifies HS256-signed bearer tokens against a shared secret.
///
/// Pure with respect to its inputs: validation is a function of the token
/// and the key, with no side effects.
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    /// Builds a validator from the base64-encoded signing secret, as it
    /// appears in the configuration file.
    pub fn new(base64_secret: &str) -> Result<Self, Error> {
        let secret = BASE64.decode(base64_secret)?;
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked when the claim is present, but tokens without
        // one are still accepted.
        validation.required_spec_claims.clear();
        Ok(Self { key: DecodingKey::from_secret(&secret), validation })
    }

    /// Validates the raw `Authorization` header value and extracts the claims.
    ///
    /// A leading literal `Bearer` is stripped; a value without the prefix is
    /// still attempted as a raw token. That leniency is inherited from the
    /// deployment this gateway fronts and is kept on purpose.
    pub fn validate(&self, raw_header_value: &str) -> Result<Claims, InvalidToken> {
        let token = raw_header_value
            .strip_prefix("Bearer")
            .unwrap_or(raw_header_value)
            .trim();

        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        if data.claims.sub.is_empty() {
            return Err(InvalidToken::MissingSubject);
        }
        Ok(data.claims)
    }
}
