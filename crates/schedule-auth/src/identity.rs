//! Verified user identity
//!
//! A [`User`] is produced fresh by a credential provider on every successful
//! login. It is never persisted; the only durable form is the signed token
//! minted from it.

use serde::{Deserialize, Serialize};

/// Identity established by a credential provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable account identifier
    pub id: String,

    /// Human-readable name
    #[serde(default)]
    pub display_name: String,

    /// Email address, when the backend exposes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Raw backend group memberships (directory DNs)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,

    /// Internal role strings, already mapped from backend groups
    #[serde(default)]
    pub roles: Vec<String>,
}

impl User {
    /// Create an identity with no roles.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email: None,
            groups: Vec::new(),
            roles: Vec::new(),
        }
    }

    /// Set the role list.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Set the email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the raw group memberships.
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    /// Check whether the identity carries a role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
