//! Error types for authentication operations
//!
//! This module defines the closed failure taxonomy every credential provider
//! maps into, the token verification failures seen by the request
//! interceptor, and the startup-only configuration errors.

use thiserror::Error;

/// Classified login failure.
///
/// Every credential provider maps its backend-specific failures into exactly
/// one of these variants. Callers can branch exhaustively without depending
/// on backend error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Wrong password for a known, enabled account
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// No matching account
    #[error("User not found")]
    UserNotFound,

    /// Account exists but is deactivated
    #[error("User disabled")]
    UserDisabled,

    /// Backend could not be reached, timed out, or was cancelled
    #[error("Authentication provider unavailable")]
    ProviderUnavailable,
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Check if this error should be logged at error level.
    ///
    /// Rejections are expected traffic; only an unreachable backend is an
    /// operational problem.
    pub fn is_server_error(&self) -> bool {
        matches!(self, AuthError::ProviderUnavailable)
    }

    /// Whether this is one of the three credential rejections.
    pub fn is_rejection(&self) -> bool {
        !self.is_server_error()
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InvalidCredentials | AuthError::UserNotFound | AuthError::UserDisabled => 401,
            AuthError::ProviderUnavailable => 503,
        }
    }

    /// Get error code for internal logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::UserDisabled => "USER_DISABLED",
            AuthError::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
        }
    }

    /// Message safe to return to the original requester.
    ///
    /// The three rejections share one message so a client cannot probe which
    /// accounts exist.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials | AuthError::UserNotFound | AuthError::UserDisabled => {
                "invalid username or password"
            }
            AuthError::ProviderUnavailable => "authentication service temporarily unavailable",
        }
    }
}

/// Token verification and signing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// No token was presented
    #[error("Missing token")]
    Missing,

    /// Token could not be decoded
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Token header names a different signing algorithm
    #[error("Unexpected signing algorithm")]
    AlgorithmMismatch,

    /// Signature does not validate under the shared secret
    #[error("Invalid signature")]
    InvalidSignature,

    /// Current time is before the token's not-before instant
    #[error("Token not yet valid")]
    NotYetValid,

    /// Current time is at or after the token's expiry
    #[error("Token has expired")]
    Expired,

    /// Embedded issuer differs from the configured issuer
    #[error("Invalid issuer")]
    InvalidIssuer,

    /// Signing failed
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

/// Result type for token operations.
pub type TokenResult<T> = Result<T, TokenError>;

impl TokenError {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            TokenError::Encoding(_) => 500,
            _ => 401,
        }
    }

    /// Get error code for internal logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            TokenError::Missing => "MISSING_TOKEN",
            TokenError::Malformed(_) => "MALFORMED_TOKEN",
            TokenError::AlgorithmMismatch => "ALGORITHM_MISMATCH",
            TokenError::InvalidSignature => "INVALID_SIGNATURE",
            TokenError::NotYetValid => "TOKEN_NOT_YET_VALID",
            TokenError::Expired => "TOKEN_EXPIRED",
            TokenError::InvalidIssuer => "INVALID_ISSUER",
            TokenError::Encoding(_) => "TOKEN_ENCODING_FAILED",
        }
    }
}

/// Configuration errors.
///
/// Any of these at startup is fatal: the process must not serve requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The token signing secret is absent or empty
    #[error("Missing required environment variable: AUTH_TOKEN_SECRET")]
    MissingSecret,

    /// Directory mode selected without its required settings
    #[error("AUTH_MODE=directory but missing environment variables: {}", .0.join(", "))]
    MissingDirectorySettings(Vec<String>),

    /// Mode selector is not a recognised backend
    #[error("Invalid AUTH_MODE: {0:?} (valid: fixture, directory)")]
    InvalidMode(String),

    /// A setting holds an unusable value
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },

    /// Fixture records could not be loaded
    #[error("Fixture error: {0}")]
    Fixture(String),

    /// Selected backend is not compiled into this build
    #[error("Unsupported configuration: {0}")]
    Unsupported(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_share_public_message() {
        let messages: Vec<_> = [
            AuthError::InvalidCredentials,
            AuthError::UserNotFound,
            AuthError::UserDisabled,
        ]
        .iter()
        .map(AuthError::public_message)
        .collect();

        assert!(messages.windows(2).all(|w| w[0] == w[1]));
        assert_ne!(messages[0], AuthError::ProviderUnavailable.public_message());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::InvalidCredentials.status_code(), 401);
        assert_eq!(AuthError::UserDisabled.status_code(), 401);
        assert_eq!(AuthError::ProviderUnavailable.status_code(), 503);
        assert_eq!(TokenError::Expired.status_code(), 401);
        assert_eq!(TokenError::Missing.status_code(), 401);
    }

    #[test]
    fn test_missing_directory_settings_lists_all() {
        let err = ConfigError::MissingDirectorySettings(vec![
            "DIRECTORY_ADDR".to_string(),
            "DIRECTORY_BIND_DN".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("DIRECTORY_ADDR"));
        assert!(msg.contains("DIRECTORY_BIND_DN"));
    }

    #[test]
    fn test_server_error_classification() {
        assert!(AuthError::ProviderUnavailable.is_server_error());
        assert!(AuthError::UserNotFound.is_rejection());
    }
}
