//! JWT token issuance and verification
//!
//! This module signs and verifies identity tokens using the jsonwebtoken
//! crate. The algorithm is fixed to HS256; tokens carrying any other `alg`
//! header are rejected before their signature is checked.
//!
//! The manager is stateless apart from the read-only secret, so a single
//! instance can be shared across any number of concurrent callers.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};

use crate::claims::Claims;
use crate::config::AuthConfig;
use crate::error::{TokenError, TokenResult};
use crate::identity::User;

/// The only accepted signing algorithm.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Issuer and verifier of signed identity tokens.
#[derive(Clone)]
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    issuer: String,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("algorithm", &SIGNING_ALGORITHM)
            .field("ttl", &self.ttl)
            .field("issuer", &self.issuer)
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

impl TokenManager {
    /// Create a new token manager.
    ///
    /// # Arguments
    ///
    /// * `secret` - Shared HMAC secret
    /// * `ttl` - Lifetime of issued tokens
    /// * `issuer` - Issuer to embed and to require on verification; an empty
    ///   issuer disables the issuer check
    pub fn new(secret: &[u8], ttl: Duration, issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
            issuer: issuer.into(),
        }
    }

    /// Create a token manager from validated configuration.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.token_secret, config.token_ttl, config.token_issuer.clone())
    }

    /// Lifetime of issued tokens.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Configured issuer.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a token for a user at the current time.
    pub fn issue(&self, user: &User) -> TokenResult<String> {
        self.issue_at(user, Utc::now())
    }

    /// Issue a token for a user as if the current time were `now`.
    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> TokenResult<String> {
        self.sign(user, now).map(|(token, _)| token)
    }

    /// Issue a token and wrap it in a login response body.
    pub fn issue_response(&self, user: &User) -> TokenResult<TokenResponse> {
        let now = Utc::now();
        let (token, claims) = self.sign(user, now)?;
        Ok(TokenResponse::new(token, claims.remaining_secs(now)))
    }

    fn sign(&self, user: &User, now: DateTime<Utc>) -> TokenResult<(String, Claims)> {
        let claims = Claims::for_user(user, &self.issuer, self.ttl, now)?;
        let token = encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        tracing::debug!(sub = %claims.sub, jti = %claims.jti, exp = claims.exp, "Issued access token");
        Ok((token, claims))
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> TokenResult<Claims> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as if the current time were `now`.
    ///
    /// Fails if the token is empty or malformed, was signed with another
    /// algorithm, has a bad signature, lies outside `[nbf, exp)`, or names a
    /// different issuer while one is configured.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> TokenResult<Claims> {
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        // Time bounds are checked below against `now`, not the library clock.
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "nbf", "sub"]);

        let token_data: TokenData<Claims> =
            decode(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
                ErrorKind::InvalidAlgorithm => TokenError::AlgorithmMismatch,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::InvalidToken => TokenError::Malformed("Malformed token".to_string()),
                _ => TokenError::Malformed(e.to_string()),
            })?;

        let claims = token_data.claims;

        if !claims.is_valid_at(now) {
            return Err(if claims.is_expired_at(now) {
                TokenError::Expired
            } else {
                TokenError::NotYetValid
            });
        }
        if !self.issuer.is_empty() && claims.iss != self.issuer {
            return Err(TokenError::InvalidIssuer);
        }

        Ok(claims)
    }
}

/// Body returned by a login endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Signed access token
    pub access_token: String,

    /// Token type (always "Bearer")
    pub token_type: String,

    /// Access token lifetime in seconds
    pub expires_in: i64,
}

impl TokenResponse {
    /// Create a new token response.
    pub fn new(access_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}
