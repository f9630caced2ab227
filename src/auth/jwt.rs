//! JWT session tokens
//!
//! Issues and verifies the stateless session token that proves an
//! identity. Tokens carry only the subject id and expiry window and are
//! signed with HMAC using the single process-wide secret.
//!
//! Security notes:
//! - Tokens are issued with HS256; verification accepts only the HMAC family
//! - Lifetime is fixed at 24 hours with no expiry leeway
//! - There is no refresh or revocation; an expired token needs a new login

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::types::ChainhubError;

/// Session token lifetime (24 hours)
pub const TOKEN_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Message returned for every verification failure
const INVALID_TOKEN: &str = "invalid token";

/// Payload stored in the token.
///
/// The schema is fixed: a payload whose `sub` is not an integer, or that
/// lacks `exp`, fails to deserialize and the token is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id
    pub sub: i64,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// JWT issuer and verifier
#[derive(Clone)]
pub struct JwtValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    /// Create a new JWT validator
    ///
    /// Returns an error if the secret is empty.
    pub fn new(secret: &str) -> Result<Self, ChainhubError> {
        if secret.trim().is_empty() {
            return Err(ChainhubError::Config("JWT_SECRET must not be empty".into()));
        }

        if secret.len() < 32 {
            warn!("JWT_SECRET is shorter than 32 characters; use a longer random value");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Issue a token for `subject`, valid for [`TOKEN_TTL_SECONDS`]
    pub fn generate_token(&self, subject: i64) -> Result<String, ChainhubError> {
        let now = unix_now()?;

        let claims = Claims {
            sub: subject,
            iat: now,
            exp: now + TOKEN_TTL_SECONDS,
        };

        self.encode_claims(&claims)
    }

    /// Sign an arbitrary claims set with the configured secret
    pub fn encode_claims(&self, claims: &Claims) -> Result<String, ChainhubError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| ChainhubError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Verify a token and return its subject.
    ///
    /// Every failure is reported as the same `Unauthorized("invalid token")`
    /// so callers cannot learn which check rejected it.
    pub fn verify_token(&self, token: &str) -> Result<i64, ChainhubError> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(data.claims.sub),
            Err(err) => {
                let reason = match err.kind() {
                    ErrorKind::ExpiredSignature => "expired",
                    ErrorKind::InvalidSignature => "bad signature",
                    ErrorKind::InvalidAlgorithm => "algorithm not allowed",
                    ErrorKind::Json(_) => "claims do not match schema",
                    _ => "malformed",
                };
                debug!(reason, "token rejected");
                Err(ChainhubError::Unauthorized(INVALID_TOKEN.into()))
            }
        }
    }
}

fn unix_now() -> Result<u64, ChainhubError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| ChainhubError::Internal(format!("System time error: {}", e)))
}
