// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token codec.
//!
//! Tokens are compact HS256 JWTs carrying two claims:
//!
//! - `email` - the subject's email address
//! - `iat` - issued-at, seconds since the Unix epoch
//!
//! Validity is a pure function of the token and the process secret. There
//! is no expiry and no server-side record of issued tokens.

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::AuthError;

/// Claims embedded in every token minted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject email
    pub email: String,
    /// Issued at timestamp
    pub iat: i64,
}

/// Outcome of inspecting a presented token.
///
/// Callers that only need a yes/no answer use [`TokenCodec::validate`];
/// the distinction is kept for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    /// Signature verified and claims parsed
    Valid(TokenClaims),
    /// Well-formed token signed with a different key or algorithm
    InvalidSignature,
    /// Not a parseable token, or required claims are missing
    Malformed,
}

impl TokenStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, TokenStatus::Valid(_))
    }
}

/// Signs and verifies bearer tokens against the process-wide secret.
///
/// Built once at startup and shared read-only by every request.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec for the given HMAC secret.
    pub fn new(secret: &SecretString) -> Self {
        let key = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            validation,
        }
    }

    /// Mint a token for `email`, stamped with the current time.
    pub fn issue(&self, email: &str) -> Result<String, AuthError> {
        let claims = TokenClaims {
            email: email.to_string(),
            iat: chrono::Utc::now().timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InternalError(e.to_string()))
    }

    /// Verify signature and structure, returning the parsed claims on success.
    pub fn inspect(&self, token: &str) -> TokenStatus {
        match decode::<TokenClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => TokenStatus::Valid(data.claims),
            Err(e) => match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenStatus::InvalidSignature
                }
                _ => TokenStatus::Malformed,
            },
        }
    }

    /// True iff the token verifies against the secret and its claims parse.
    pub fn validate(&self, token: &str) -> bool {
        self.inspect(token).is_valid()
    }

    /// Email claim of a valid token; `None` when the token does not validate.
    pub fn extract_email(&self, token: &str) -> Option<String> {
        match self.inspect(token) {
            TokenStatus::Valid(claims) => Some(claims.email),
            _ => None,
        }
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}
