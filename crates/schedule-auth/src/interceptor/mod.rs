//! Request-boundary interceptor
//!
//! Per inbound request: pull the bearer token from the `Authorization`
//! header, verify it with the [`TokenManager`], and attach the resulting
//! [`RequestIdentity`] to the request's extensions. Later stages read it
//! back through [`user_id`] and [`roles`].
//!
//! A missing header, a header without the `Bearer` scheme, and a malformed
//! header are all treated like an invalid token: the request is rejected
//! with 401 and no downstream stage runs.
//!
//! The interceptor holds only the shared, read-only token manager; identity
//! travels with each request, never through shared mutable state.

#[cfg(feature = "tower")]
mod layer;

#[cfg(feature = "tower")]
pub use layer::{RequireAuthLayer, RequireAuthService};

use std::sync::Arc;

use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{Extensions, HeaderMap, HeaderValue, Request, Response, StatusCode};

use crate::claims::Claims;
use crate::error::{TokenError, TokenResult};
use crate::token::TokenManager;

/// Extract the bearer credential from an `Authorization` header value.
///
/// The scheme matches `Bearer` case-insensitively and must be followed by
/// exactly one space. Any other shape yields an empty string.
pub fn bearer_token(header: &str) -> &str {
    let header = header.trim();
    let Some((scheme, credential)) = header.split_once(' ') else {
        return "";
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        return "";
    }
    // Rejects a doubled separator and credentials with embedded whitespace.
    if credential.is_empty() || credential.contains(char::is_whitespace) {
        return "";
    }
    credential
}

/// Verified identity attached to a request.
///
/// Inserted once by the interceptor; there are no setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    user_id: String,
    roles: Vec<String>,
}

impl RequestIdentity {
    fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            roles: claims.roles,
        }
    }

    /// Verified user ID.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Verified roles.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Check for a role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Identity stored in request extensions, if the interceptor ran.
    pub fn from_extensions(extensions: &Extensions) -> Option<&Self> {
        extensions.get::<Self>()
    }
}

/// User ID of an intercepted request.
pub fn user_id<B>(req: &Request<B>) -> Option<&str> {
    RequestIdentity::from_extensions(req.extensions()).map(RequestIdentity::user_id)
}

/// Roles of an intercepted request; empty if the interceptor did not run.
pub fn roles<B>(req: &Request<B>) -> &[String] {
    RequestIdentity::from_extensions(req.extensions())
        .map(RequestIdentity::roles)
        .unwrap_or(&[])
}

/// Build the 401 response returned to rejected requests.
pub fn unauthorized_response<B: Default>() -> Response<B> {
    let mut response = Response::new(B::default());
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

/// Bearer-token interceptor.
#[derive(Debug, Clone)]
pub struct RequireAuth {
    tokens: Arc<TokenManager>,
}

impl RequireAuth {
    /// Create an interceptor over a shared token manager.
    pub fn new(tokens: Arc<TokenManager>) -> Self {
        Self { tokens }
    }

    /// Verify the bearer token carried by `headers`.
    pub fn authorize(&self, headers: &HeaderMap) -> TokenResult<RequestIdentity> {
        let header = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        let claims = self.tokens.verify(bearer_token(header))?;
        Ok(RequestIdentity::from_claims(claims))
    }

    /// Verify a request and attach its identity.
    ///
    /// On failure the request is consumed; the caller responds with
    /// [`unauthorized_response`].
    pub fn intercept<B>(&self, mut req: Request<B>) -> Result<Request<B>, TokenError> {
        match self.authorize(req.headers()) {
            Ok(identity) => {
                req.extensions_mut().insert(identity);
                Ok(req)
            }
            Err(e) => {
                tracing::debug!(
                    method = %req.method(),
                    path = %req.uri().path(),
                    code = e.error_code(),
                    "Rejected unauthenticated request"
                );
                Err(e)
            }
        }
    }
}
