//! JWT claims carried by bearer tokens
//!
//! The token is the only persisted form of an identity: there is no
//! server-side session store, so everything downstream needs (subject,
//! display name, roles) travels inside these claims.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TokenError, TokenResult};
use crate::identity::User;

/// Backdating applied to `nbf` so a token minted on one host is not
/// rejected by a verifier whose clock runs slightly behind.
pub const CLOCK_SKEW_TOLERANCE_SECS: i64 = 10;

/// Claims embedded in every access token.
///
/// Invariant: `nbf <= iat < exp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    // Standard JWT claims (RFC 7519)
    /// Subject (user ID)
    pub sub: String,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// JWT ID, used to correlate audit log lines
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub jti: String,

    // Identity claims
    /// User display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Internal role strings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

impl Claims {
    /// Build claims for a user at the given instant.
    ///
    /// # Arguments
    ///
    /// * `user` - The authenticated identity
    /// * `issuer` - Issuer string recorded in `iss`
    /// * `ttl` - Token validity duration, counted from `now`
    /// * `now` - Issuance instant
    ///
    /// Fails if `now + ttl` is not a representable instant.
    pub fn for_user(
        user: &User,
        issuer: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> TokenResult<Self> {
        let iat = now.timestamp();
        let exp = now
            .checked_add_signed(ttl)
            .ok_or_else(|| TokenError::Encoding(format!("token lifetime {} out of range", ttl)))?;

        Ok(Self {
            sub: user.id.clone(),
            iss: issuer.to_string(),
            iat,
            nbf: iat - CLOCK_SKEW_TOLERANCE_SECS,
            exp: exp.timestamp(),
            jti: Uuid::now_v7().to_string(),
            name: Some(user.display_name.clone()).filter(|n| !n.is_empty()),
            roles: user.roles.clone(),
        })
    }

    /// Get the user ID.
    pub fn user_id(&self) -> &str {
        &self.sub
    }

    /// Check if the claims are inside their validity window at `now`.
    ///
    /// The window is `[nbf, exp)`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let ts = now.timestamp();
        ts >= self.nbf && ts < self.exp
    }

    /// Check if the token is expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }

    /// Get expiration as DateTime.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }

    /// Seconds of validity left at `now`, zero once expired.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.exp - now.timestamp()).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new("student", "Student One").with_roles(["ROLE_STUDENT"])
    }

    #[test]
    fn test_claims_window() {
        let now = Utc::now();
        let claims = Claims::for_user(&user(), "schedule-api", Duration::minutes(60), now).unwrap();

        assert_eq!(claims.sub, "student");
        assert_eq!(claims.nbf, claims.iat - CLOCK_SKEW_TOLERANCE_SECS);
        assert_eq!(claims.exp, claims.iat + 3600);
        assert!(claims.nbf <= claims.iat && claims.iat < claims.exp);
        assert!(claims.is_valid_at(now));
    }

    #[test]
    fn test_claims_expiration() {
        let now = Utc::now();
        let claims = Claims::for_user(&user(), "schedule-api", Duration::minutes(1), now).unwrap();

        assert!(!claims.is_expired_at(now));
        assert!(claims.is_expired_at(now + Duration::minutes(1)));
        assert_eq!(claims.remaining_secs(now + Duration::hours(1)), 0);
    }

    #[test]
    fn test_empty_display_name_is_omitted() {
        let claims = Claims::for_user(
            &User::new("svc", ""),
            "schedule-api",
            Duration::minutes(5),
            Utc::now(),
        )
        .unwrap();
        assert!(claims.name.is_none());

        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("name").is_none());
        assert!(json.get("roles").is_none());
    }

    #[test]
    fn test_unrepresentable_expiry_is_an_error() {
        let err = Claims::for_user(
            &user(),
            "schedule-api",
            Duration::days(365 * 1_000_000),
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(err, TokenError::Encoding(_)));
    }
}
