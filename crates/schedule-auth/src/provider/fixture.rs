//! Fixture-backed credential provider.
//!
//! Verifies credentials against a small pre-loaded record set. Intended for
//! development and tests; it also offers scripted failure scenarios so the
//! unavailable-backend paths can be exercised without a directory server.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::CredentialProvider;
use crate::context::CallContext;
use crate::error::{AuthError, AuthResult, ConfigError};
use crate::identity::User;

/// One account record in a fixture document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureUser {
    /// Login name
    pub username: String,

    /// Plaintext password
    pub password: String,

    /// Account identifier; the username is used when empty
    #[serde(default)]
    pub id: String,

    /// Display name
    #[serde(default)]
    pub display_name: String,

    /// Role strings
    #[serde(default)]
    pub roles: Vec<String>,

    /// Whether the account is deactivated
    #[serde(default)]
    pub disabled: bool,
}

impl FixtureUser {
    /// Create an enabled record.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            id: String::new(),
            display_name: String::new(),
            roles: Vec::new(),
            disabled: false,
        }
    }

    /// Set the roles.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the record disabled.
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    fn to_user(&self) -> User {
        let id = if self.id.is_empty() { &self.username } else { &self.id };
        User::new(id.clone(), self.display_name.clone()).with_roles(self.roles.iter().cloned())
    }
}

#[derive(Debug, Deserialize)]
struct FixtureDocument {
    users: Vec<FixtureUser>,
}

/// Scripted behavior of a [`FixtureProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FixtureScenario {
    /// Verify credentials against the records
    #[default]
    Normal,
    /// Report unavailability after the delay, unless the caller gives up first
    Delayed(Duration),
    /// Report unavailability immediately
    Unavailable,
}

/// Credential provider over pre-loaded records.
#[derive(Debug, Clone, Default)]
pub struct FixtureProvider {
    records: Vec<FixtureUser>,
    scenario: FixtureScenario,
}

impl FixtureProvider {
    /// Create a provider over the given records.
    pub fn new(records: Vec<FixtureUser>) -> Self {
        Self {
            records,
            scenario: FixtureScenario::Normal,
        }
    }

    /// Parse records from a JSON document of the form `{"users": [...]}`.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let doc: FixtureDocument =
            serde_json::from_str(json).map_err(|e| ConfigError::Fixture(e.to_string()))?;
        Ok(Self::new(doc.users))
    }

    /// Load records from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Fixture(format!("{}: {}", path.display(), e)))?;
        let provider = Self::from_json_str(&json)?;

        tracing::info!(path = %path.display(), records = provider.records.len(), "Loaded fixture users");
        Ok(provider)
    }

    /// Replace the scripted scenario.
    pub fn with_scenario(mut self, scenario: FixtureScenario) -> Self {
        self.scenario = scenario;
        self
    }

    /// Loaded records.
    pub fn records(&self) -> &[FixtureUser] {
        &self.records
    }

    fn check(&self, username: &str, password: &str) -> AuthResult<User> {
        // First match wins; duplicates are not deduplicated.
        let record = self
            .records
            .iter()
            .find(|r| r.username == username)
            .ok_or(AuthError::UserNotFound)?;

        // Checked before the password so a disabled account never reveals it.
        if record.disabled {
            return Err(AuthError::UserDisabled);
        }
        if record.password != password {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(record.to_user())
    }
}

#[async_trait]
impl CredentialProvider for FixtureProvider {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn authenticate(&self, ctx: &CallContext, username: &str, password: &str) -> AuthResult<User> {
        match self.scenario {
            FixtureScenario::Unavailable => Err(AuthError::ProviderUnavailable),
            FixtureScenario::Delayed(delay) => {
                ctx.guard(async {
                    tokio::time::sleep(delay).await;
                    Err(AuthError::ProviderUnavailable)
                })
                .await
            }
            FixtureScenario::Normal => ctx.guard(async { self.check(username, password) }).await,
        }
    }
}
