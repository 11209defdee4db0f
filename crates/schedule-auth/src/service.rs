//! Authentication service
//!
//! The single call-site that owns the configured credential provider and
//! exposes login to the rest of the API. Cross-cutting behavior (attempt
//! auditing today; role enrichment or rate limiting later) belongs here so
//! neither provider nor caller has to change.

use std::sync::Arc;

use crate::config::{AuthConfig, AuthMode};
use crate::context::CallContext;
use crate::error::{AuthResult, ConfigError};
use crate::identity::User;
use crate::provider::{CredentialProvider, FixtureProvider, RoleMapping};

/// Login entry point wrapping exactly one provider.
#[derive(Clone)]
pub struct AuthService {
    provider: Arc<dyn CredentialProvider>,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl AuthService {
    /// Create a service over a provider.
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        Self { provider }
    }

    /// Create a service over a concrete provider.
    pub fn with_provider<P>(provider: P) -> Self
    where
        P: CredentialProvider + 'static,
    {
        Self::new(Arc::new(provider))
    }

    /// Build the provider selected by validated configuration.
    ///
    /// Equivalent to [`from_config_with_roles`](Self::from_config_with_roles)
    /// with an empty mapping, so directory users carry no roles.
    pub fn from_config(config: &AuthConfig) -> Result<Self, ConfigError> {
        Self::from_config_with_roles(config, RoleMapping::new())
    }

    /// Build the provider selected by validated configuration, mapping
    /// directory groups to roles with `roles`.
    ///
    /// Fixture mode loads `config.fixture_path`; its records carry their own
    /// roles and `roles` is ignored. Directory mode dials the configured
    /// server and requires the `ldap` feature.
    pub fn from_config_with_roles(config: &AuthConfig, roles: RoleMapping) -> Result<Self, ConfigError> {
        match config.mode {
            AuthMode::Fixture => Ok(Self::with_provider(FixtureProvider::from_json_file(&config.fixture_path)?)),
            AuthMode::Directory => Self::directory_from_config(config, roles),
        }
    }

    #[cfg(feature = "ldap")]
    fn directory_from_config(config: &AuthConfig, roles: RoleMapping) -> Result<Self, ConfigError> {
        Ok(Self::with_provider(Self::directory_provider(config, roles)))
    }

    #[cfg(feature = "ldap")]
    fn directory_provider(
        config: &AuthConfig,
        roles: RoleMapping,
    ) -> crate::provider::DirectoryProvider<crate::provider::LdapConnector> {
        use crate::provider::{DirectoryProvider, LdapConnector};

        let provider = DirectoryProvider::new(LdapConnector, config.directory.clone()).with_role_mapping(roles);
        if provider.role_mapping().is_empty() {
            tracing::warn!(
                address = %config.directory.address,
                "Directory mode started without a group-to-role mapping; users will have no roles"
            );
        } else {
            tracing::info!(
                address = %config.directory.address,
                mappings = provider.role_mapping().len(),
                "Directory provider configured"
            );
        }
        provider
    }

    #[cfg(not(feature = "ldap"))]
    fn directory_from_config(_config: &AuthConfig, _roles: RoleMapping) -> Result<Self, ConfigError> {
        Err(ConfigError::Unsupported(
            "AUTH_MODE=directory requires the `ldap` feature".to_string(),
        ))
    }

    /// Name of the active provider.
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Verify a username/password pair.
    ///
    /// Delegates to the provider and records the outcome. The classified
    /// failure is logged internally; callers should present the three
    /// rejections identically to the requester.
    pub async fn login(&self, ctx: &CallContext, username: &str, password: &str) -> AuthResult<User> {
        let result = self.provider.authenticate(ctx, username, password).await;

        match &result {
            Ok(user) => tracing::info!(
                provider = self.provider.name(),
                username,
                user_id = %user.id,
                roles = ?user.roles,
                "Login succeeded"
            ),
            Err(e) if e.is_rejection() => tracing::warn!(
                provider = self.provider.name(),
                username,
                code = e.error_code(),
                "Login rejected"
            ),
            Err(e) => tracing::error!(
                provider = self.provider.name(),
                username,
                code = e.error_code(),
                "Login failed: provider unavailable"
            ),
        }

        result
    }
}
