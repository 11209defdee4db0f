//! Credential provider backends.
//!
//! A provider turns a username/password pair into a [`User`] or a classified
//! [`AuthError`]. Two backends implement the same contract:
//! - Fixture: pre-loaded records for development and tests
//! - Directory: double-bind protocol against a directory service
//!
//! Backend-specific failures never leave a provider; callers only ever see
//! the four-variant taxonomy.

pub mod directory;
pub mod fixture;
#[cfg(feature = "ldap")]
pub mod ldap;

pub use directory::{
    escape_filter_value, DirectoryConnector, DirectoryEntry, DirectoryError, DirectoryProvider,
    DirectorySchema, DirectorySession, RoleMapping,
};
pub use fixture::{FixtureProvider, FixtureScenario, FixtureUser};
#[cfg(feature = "ldap")]
pub use ldap::LdapConnector;

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::AuthResult;
use crate::identity::User;

/// Trait for credential verification backends.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Verify a username/password pair.
    ///
    /// Must honor `ctx`: if it is cancelled or its deadline elapses before the
    /// backend answers, return [`AuthError::ProviderUnavailable`](crate::AuthError::ProviderUnavailable).
    async fn authenticate(&self, ctx: &CallContext, username: &str, password: &str) -> AuthResult<User>;
}
