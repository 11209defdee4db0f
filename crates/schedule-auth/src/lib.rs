//! # Schedule Authentication
//!
//! This crate authenticates callers of the schedule API. It turns a
//! username/password pair into a verified identity and a signed,
//! time-bounded bearer token, and checks that token on every later request.
//!
//! ## Overview
//!
//! - **Configuration**: validated once at startup from the environment
//! - **Credential providers**: fixture records or a directory service
//!   (double-bind protocol), behind one trait
//! - **Authentication service**: the login seam wrapping the active provider
//! - **Tokens**: HS256 JWT issuance and verification with clock-skew tolerance
//! - **Interceptor**: `Authorization: Bearer` extraction and per-request identity
//!
//! Authorization decisions are out of scope: this crate establishes and
//! carries identity and roles, downstream code decides what roles permit.
//!
//! ## Features
//!
//! - `tower` (default): Tower Layer/Service for the interceptor
//! - `ldap`: ldap3-backed directory connector
//!
//! ## Usage
//!
//! ```rust,no_run
//! use schedule_auth::{AuthConfig, AuthService, CallContext, TokenManager};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! // Fatal on error: do not start serving.
//! let config = AuthConfig::from_env()?;
//! let tokens = TokenManager::from_config(&config);
//! // Directory deployments pass their group-to-role table via
//! // `AuthService::from_config_with_roles`.
//! let auth = AuthService::from_config(&config)?;
//!
//! let ctx = CallContext::with_timeout(Duration::from_secs(10));
//! let user = auth.login(&ctx, "student", "student123").await?;
//! let response = tokens.issue_response(&user)?;
//! println!("{}", response.access_token);
//! # Ok(())
//! # }
//! ```
//!
//! ### Error mapping for callers
//!
//! | Failure | Outcome |
//! |---------|---------|
//! | invalid credentials / user not found / user disabled | 401, one generic message |
//! | provider unavailable | 503 |
//! | token verification failure | 401 |

pub mod claims;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod interceptor;
pub mod provider;
pub mod retry;
pub mod service;
pub mod token;

// Re-export main types
pub use claims::{Claims, CLOCK_SKEW_TOLERANCE_SECS};
pub use config::{AuthConfig, AuthMode, DirectorySettings};
pub use context::CallContext;
pub use error::{AuthError, AuthResult, ConfigError, TokenError, TokenResult};
pub use identity::User;
pub use interceptor::{bearer_token, roles, user_id, RequestIdentity, RequireAuth};
pub use provider::{
    CredentialProvider, DirectoryProvider, DirectorySchema, FixtureProvider, FixtureScenario,
    FixtureUser, RoleMapping,
};
pub use service::AuthService;
pub use token::{TokenManager, TokenResponse};

#[cfg(feature = "tower")]
pub use interceptor::{RequireAuthLayer, RequireAuthService};

#[cfg(feature = "ldap")]
pub use provider::LdapConnector;
