//! Directory-service credential provider.
//!
//! Implements the double-bind protocol against a directory that forbids
//! anonymous search and where users cannot read their own group memberships:
//!
//! 1. Connect (LDAPS or STARTTLS per configuration), retrying connection
//!    failures only
//! 2. Bind as the service account
//! 3. Search the user base for the account, with the username escaped
//! 4. Exactly one entry must match, otherwise the user is not found
//! 5. Bind as the found DN with the supplied password (the only password check)
//! 6. Re-bind as the service account
//! 7. Read display name and group memberships
//! 8. Map group DNs to internal roles, dropping unmapped groups
//! 9. Return the identity
//!
//! The whole sequence runs under the configured timeout and the caller's
//! [`CallContext`]. A directory outage blocks new logins; tokens issued
//! earlier stay valid until they expire.
//!
//! The wire protocol sits behind [`DirectoryConnector`] and
//! [`DirectorySession`]; the `ldap` feature provides an ldap3-backed
//! connector.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use super::CredentialProvider;
use crate::config::DirectorySettings;
use crate::context::CallContext;
use crate::error::{AuthError, AuthResult};
use crate::identity::User;
use crate::retry::{with_retry_if, RetryConfig};

/// `userAccountControl` bit marking a disabled Active Directory account.
const ACCOUNT_DISABLE_FLAG: u32 = 0x2;

/// Failure reported by a directory session.
///
/// Never escapes the provider; it is always mapped into [`AuthError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// Transport-level failure (refused, reset, TLS handshake, timeout)
    #[error("Directory connection failed: {0}")]
    Connection(String),

    /// Bind rejected the DN/password pair
    #[error("Directory rejected the credentials")]
    InvalidCredentials,

    /// Bind rejected because the account is disabled
    #[error("Directory account disabled")]
    AccountDisabled,

    /// Any other directory result code
    #[error("Directory protocol error: {0}")]
    Protocol(String),
}

impl DirectoryError {
    /// Whether the error is a transport failure worth retrying.
    pub fn is_connection(&self) -> bool {
        matches!(self, DirectoryError::Connection(_))
    }
}

/// Single directory entry returned by a search or read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Distinguished name
    pub dn: String,

    /// Attribute values keyed by attribute name
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Create an entry with no attributes.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// Add an attribute value.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.entry(name.into()).or_default().push(value.into());
        self
    }

    /// All values of an attribute; names compare case-insensitively.
    pub fn values(&self, name: &str) -> &[String] {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    /// First value of an attribute.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }
}

/// Opens sessions to the directory service.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Establish a connection using the configured transport security.
    async fn connect(&self, settings: &DirectorySettings) -> Result<Box<dyn DirectorySession>, DirectoryError>;
}

/// An open directory connection.
#[async_trait]
pub trait DirectorySession: Send {
    /// Simple bind.
    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError>;

    /// Subtree search under `base`.
    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError>;

    /// Read one entry by DN; `None` if it does not exist.
    async fn read(&mut self, dn: &str, attributes: &[&str]) -> Result<Option<DirectoryEntry>, DirectoryError>;

    /// Release the connection.
    async fn close(&mut self);
}

/// Escape a value for embedding in a search filter (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\5c"),
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Attribute names and filter syntax of the directory.
///
/// Defaults match Active Directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySchema {
    /// Search filter; `{username}` is replaced by the escaped username
    pub user_filter: String,

    /// Account-name attribute, used as the identity id
    pub account_attribute: String,

    /// Display-name attribute
    pub display_name_attribute: String,

    /// Group-membership attribute
    pub group_attribute: String,

    /// Email attribute
    pub email_attribute: String,

    /// Account-control bit field checked for the disabled flag
    pub account_control_attribute: Option<String>,
}

impl Default for DirectorySchema {
    fn default() -> Self {
        Self {
            user_filter: "(&(objectClass=user)(sAMAccountName={username}))".to_string(),
            account_attribute: "sAMAccountName".to_string(),
            display_name_attribute: "displayName".to_string(),
            group_attribute: "memberOf".to_string(),
            email_attribute: "mail".to_string(),
            account_control_attribute: Some("userAccountControl".to_string()),
        }
    }
}

impl DirectorySchema {
    /// Build the search filter for a username.
    pub fn filter_for(&self, username: &str) -> String {
        self.user_filter.replace("{username}", &escape_filter_value(username))
    }

    fn is_disabled(&self, entry: &DirectoryEntry) -> bool {
        self.account_control_attribute
            .as_deref()
            .and_then(|attr| entry.first(attr))
            .and_then(|v| v.trim().parse::<u32>().ok())
            .is_some_and(|flags| flags & ACCOUNT_DISABLE_FLAG != 0)
    }
}

/// Lookup table from group DN to internal role.
///
/// DNs compare case-insensitively. Groups without an entry are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleMapping {
    entries: Vec<(String, String)>,
}

impl RoleMapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group-to-role entry.
    pub fn with(mut self, group_dn: impl Into<String>, role: impl Into<String>) -> Self {
        self.entries.push((normalize_dn(&group_dn.into()), role.into()));
        self
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Role for a single group DN.
    pub fn role_for(&self, group_dn: &str) -> Option<&str> {
        let key = normalize_dn(group_dn);
        self.entries
            .iter()
            .find(|(dn, _)| *dn == key)
            .map(|(_, role)| role.as_str())
    }

    /// Map group DNs to roles, de-duplicated in first-seen order.
    pub fn map_groups(&self, groups: &[String]) -> Vec<String> {
        let mut roles: Vec<String> = Vec::new();
        for group in groups {
            match self.role_for(group) {
                Some(role) if !roles.iter().any(|r| r == role) => roles.push(role.to_string()),
                Some(_) => {}
                None => tracing::trace!(group = %group, "Dropping unmapped directory group"),
            }
        }
        roles
    }
}

/// Lowercase a DN and drop insignificant spaces around its RDN separators.
///
/// Only unescaped commas separate RDNs; `\,` and `\ ` stay part of the value.
fn normalize_dn(dn: &str) -> String {
    let mut rdns = Vec::new();
    let mut current = String::new();
    let mut chars = dn.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ',' => rdns.push(normalize_rdn(&std::mem::take(&mut current))),
            _ => current.push(c),
        }
    }
    rdns.push(normalize_rdn(&current));

    rdns.join(",")
}

fn normalize_rdn(rdn: &str) -> String {
    let rdn = rdn.trim_start();
    let mut end = rdn.trim_end().len();

    // An odd run of trailing backslashes escapes the first trimmed character.
    let backslashes = rdn[..end].chars().rev().take_while(|c| *c == '\\').count();
    if backslashes % 2 == 1 {
        end += rdn[end..].chars().next().map_or(0, char::len_utf8);
    }

    rdn[..end].to_ascii_lowercase()
}

/// Credential provider backed by a directory service.
pub struct DirectoryProvider<C> {
    connector: C,
    settings: DirectorySettings,
    schema: DirectorySchema,
    roles: RoleMapping,
    retry: RetryConfig,
}

impl<C> std::fmt::Debug for DirectoryProvider<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryProvider")
            .field("settings", &self.settings)
            .field("schema", &self.schema)
            .field("roles", &self.roles.len())
            .field("retry", &self.retry)
            .finish()
    }
}

impl<C> DirectoryProvider<C>
where
    C: DirectoryConnector,
{
    /// Create a provider with the default schema and an empty role mapping.
    pub fn new(connector: C, settings: DirectorySettings) -> Self {
        let retry = RetryConfig::with_retries(settings.max_retries);
        Self {
            connector,
            settings,
            schema: DirectorySchema::default(),
            roles: RoleMapping::new(),
            retry,
        }
    }

    /// Replace the directory schema.
    pub fn with_schema(mut self, schema: DirectorySchema) -> Self {
        self.schema = schema;
        self
    }

    /// Replace the group-to-role mapping.
    pub fn with_role_mapping(mut self, roles: RoleMapping) -> Self {
        self.roles = roles;
        self
    }

    /// Group-to-role table applied after a successful bind.
    pub fn role_mapping(&self) -> &RoleMapping {
        &self.roles
    }

    /// Replace the retry backoff, keeping the configured attempt count.
    pub fn with_retry_backoff(mut self, retry: RetryConfig) -> Self {
        self.retry = RetryConfig {
            max_attempts: self.retry.max_attempts,
            ..retry
        };
        self
    }

    async fn connect(&self) -> AuthResult<Box<dyn DirectorySession>> {
        with_retry_if(
            &self.retry,
            || self.connector.connect(&self.settings),
            DirectoryError::is_connection,
        )
        .await
        .map_err(|e| {
            tracing::error!(address = %self.settings.address, error = %e, "Directory unreachable");
            AuthError::ProviderUnavailable
        })
    }

    async fn run(&self, username: &str, password: &str) -> AuthResult<User> {
        let mut session = self.connect().await?;
        let result = self.exchange(session.as_mut(), username, password).await;
        session.close().await;
        result
    }

    async fn exchange(
        &self,
        session: &mut dyn DirectorySession,
        username: &str,
        password: &str,
    ) -> AuthResult<User> {
        self.service_bind(session).await?;

        let filter = self.schema.filter_for(username);
        let mut search_attributes = vec![self.schema.account_attribute.as_str()];
        if let Some(attr) = self.schema.account_control_attribute.as_deref() {
            search_attributes.push(attr);
        }

        tracing::debug!(base = %self.settings.search_base(), filter = %filter, "Searching directory for account");
        let mut entries = session
            .search(self.settings.search_base(), &filter, &search_attributes)
            .await
            .map_err(|e| step_failed("search", e))?;

        if entries.len() != 1 {
            tracing::debug!(matches = entries.len(), "Account search did not yield exactly one entry");
            return Err(AuthError::UserNotFound);
        }
        let entry = entries.remove(0);

        if self.schema.is_disabled(&entry) {
            return Err(AuthError::UserDisabled);
        }

        tracing::debug!(dn = %entry.dn, "Binding as user");
        match session.bind(&entry.dn, password).await {
            Ok(()) => {}
            Err(DirectoryError::InvalidCredentials) => return Err(AuthError::InvalidCredentials),
            Err(DirectoryError::AccountDisabled) => return Err(AuthError::UserDisabled),
            Err(e) => return Err(step_failed("user bind", e)),
        }

        // The user's own bind context usually cannot read memberOf.
        self.service_bind(session).await?;

        let read_attributes = [
            self.schema.account_attribute.as_str(),
            self.schema.display_name_attribute.as_str(),
            self.schema.group_attribute.as_str(),
            self.schema.email_attribute.as_str(),
        ];
        let details = session
            .read(&entry.dn, &read_attributes)
            .await
            .map_err(|e| step_failed("attribute read", e))?
            .ok_or(AuthError::UserNotFound)?;

        let groups = details.values(&self.schema.group_attribute).to_vec();
        let roles = self.roles.map_groups(&groups);
        let id = details
            .first(&self.schema.account_attribute)
            .or_else(|| entry.first(&self.schema.account_attribute))
            .unwrap_or(username);

        let mut user = User::new(
            id,
            details.first(&self.schema.display_name_attribute).unwrap_or_default(),
        )
        .with_groups(groups)
        .with_roles(roles);
        user.email = details.first(&self.schema.email_attribute).map(str::to_string);

        Ok(user)
    }

    async fn service_bind(&self, session: &mut dyn DirectorySession) -> AuthResult<()> {
        session
            .bind(&self.settings.bind_dn, &self.settings.bind_password)
            .await
            .map_err(|e| step_failed("service bind", e))
    }
}

fn step_failed(step: &'static str, error: DirectoryError) -> AuthError {
    tracing::error!(step, error = %error, "Directory step failed");
    AuthError::ProviderUnavailable
}

#[async_trait]
impl<C> CredentialProvider for DirectoryProvider<C>
where
    C: DirectoryConnector,
{
    fn name(&self) -> &'static str {
        "directory"
    }

    async fn authenticate(&self, ctx: &CallContext, username: &str, password: &str) -> AuthResult<User> {
        // An empty password would turn the user bind into an unauthenticated bind.
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let ctx = ctx.child_with_timeout(self.settings.timeout);
        ctx.guard(self.run(username, password)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const SERVICE_DN: &str = "CN=svc-schedule,OU=Service,DC=example,DC=edu";
    const SERVICE_PASSWORD: &str = "svc-pass";
    const ADMINS: &str = "CN=Schedule-Admins,OU=Groups,DC=example,DC=edu";
    const STUDENTS: &str = "CN=Students,OU=Groups,DC=example,DC=edu";

    #[derive(Debug, Clone)]
    struct Account {
        entry: DirectoryEntry,
        password: String,
    }

    /// Scripted in-memory directory.
    #[derive(Debug, Clone, Default)]
    struct ScriptedDirectory {
        accounts: Vec<Account>,
        connect_failures: u32,
        connects: Arc<AtomicU32>,
        log: Arc<Mutex<Vec<String>>>,
        hang_on_search: bool,
    }

    impl ScriptedDirectory {
        fn with_account(mut self, name: &str, password: &str, display: &str, groups: &[&str]) -> Self {
            let mut entry = DirectoryEntry::new(format!("CN={},OU=Users,DC=example,DC=edu", name))
                .with_attribute("sAMAccountName", name)
                .with_attribute("displayName", display)
                .with_attribute("mail", format!("{}@example.edu", name));
            for group in groups {
                entry = entry.with_attribute("memberOf", *group);
            }
            self.accounts.push(Account {
                entry,
                password: password.to_string(),
            });
            self
        }

        fn events(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    struct ScriptedSession {
        directory: ScriptedDirectory,
        bound_as: Option<String>,
    }

    #[async_trait]
    impl DirectoryConnector for ScriptedDirectory {
        async fn connect(&self, _settings: &DirectorySettings) -> Result<Box<dyn DirectorySession>, DirectoryError> {
            let attempt = self.connects.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push("connect".to_string());
            if attempt < self.connect_failures {
                return Err(DirectoryError::Connection("connection refused".to_string()));
            }
            Ok(Box::new(ScriptedSession {
                directory: self.clone(),
                bound_as: None,
            }))
        }
    }

    #[async_trait]
    impl DirectorySession for ScriptedSession {
        async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
            self.directory.log.lock().unwrap().push(format!("bind {}", dn));
            let ok = if dn == SERVICE_DN {
                password == SERVICE_PASSWORD
            } else {
                self.directory
                    .accounts
                    .iter()
                    .any(|a| a.entry.dn == dn && a.password == password)
            };
            if ok {
                self.bound_as = Some(dn.to_string());
                Ok(())
            } else {
                self.bound_as = None;
                Err(DirectoryError::InvalidCredentials)
            }
        }

        async fn search(
            &mut self,
            _base: &str,
            filter: &str,
            _attributes: &[&str],
        ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
            self.directory.log.lock().unwrap().push(format!("search {}", filter));
            if self.directory.hang_on_search {
                std::future::pending::<()>().await;
            }
            if self.bound_as.as_deref() != Some(SERVICE_DN) {
                return Err(DirectoryError::Protocol("anonymous search forbidden".to_string()));
            }
            Ok(self
                .directory
                .accounts
                .iter()
                .filter(|a| {
                    let name = a.entry.first("sAMAccountName").unwrap_or_default();
                    filter.contains(&format!("(sAMAccountName={})", name))
                })
                .map(|a| a.entry.clone())
                .collect())
        }

        async fn read(&mut self, dn: &str, _attributes: &[&str]) -> Result<Option<DirectoryEntry>, DirectoryError> {
            self.directory.log.lock().unwrap().push(format!("read {}", dn));
            if self.bound_as.as_deref() != Some(SERVICE_DN) {
                return Err(DirectoryError::Protocol("insufficient access rights".to_string()));
            }
            Ok(self
                .directory
                .accounts
                .iter()
                .find(|a| a.entry.dn == dn)
                .map(|a| a.entry.clone()))
        }

        async fn close(&mut self) {
            self.directory.log.lock().unwrap().push("close".to_string());
        }
    }

    fn settings() -> DirectorySettings {
        DirectorySettings {
            address: "ldaps://dc.example.edu:636".to_string(),
            base_dn: "DC=example,DC=edu".to_string(),
            user_search_base_dn: "OU=Users,DC=example,DC=edu".to_string(),
            bind_dn: SERVICE_DN.to_string(),
            bind_password: SERVICE_PASSWORD.to_string(),
            timeout: Duration::from_secs(8),
            max_retries: 1,
            ..Default::default()
        }
    }

    fn roles() -> RoleMapping {
        RoleMapping::new()
            .with(ADMINS, "ROLE_ADMIN")
            .with(STUDENTS, "ROLE_STUDENT")
    }

    fn directory() -> ScriptedDirectory {
        ScriptedDirectory::default()
            .with_account("jdoe", "correct-horse", "Jane Doe", &[STUDENTS, "CN=Unmapped,DC=example,DC=edu"])
            .with_account("root", "toor", "Root Admin", &[ADMINS, STUDENTS])
    }

    fn provider(directory: ScriptedDirectory) -> DirectoryProvider<ScriptedDirectory> {
        DirectoryProvider::new(directory, settings())
            .with_role_mapping(roles())
            .with_retry_backoff(RetryConfig {
                initial_delay: Duration::from_millis(1),
                ..RetryConfig::default()
            })
    }

    async fn login(p: &DirectoryProvider<ScriptedDirectory>, user: &str, pass: &str) -> AuthResult<User> {
        p.authenticate(&CallContext::background(), user, pass).await
    }

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_filter_value("jdoe"), "jdoe");
        assert_eq!(escape_filter_value("*)(uid=*"), "\\2a\\29\\28uid=\\2a");
        assert_eq!(escape_filter_value("a\\b\0"), "a\\5cb\\00");
    }

    #[test]
    fn test_filter_for_escapes_username() {
        let schema = DirectorySchema::default();
        assert_eq!(
            schema.filter_for("x*"),
            "(&(objectClass=user)(sAMAccountName=x\\2a))"
        );
    }

    #[test]
    fn test_role_mapping_is_case_insensitive_and_deduplicated() {
        let groups = vec![
            "cn=students, ou=groups, dc=example, dc=edu".to_string(),
            ADMINS.to_string(),
            STUDENTS.to_string(),
            "CN=Nobody,DC=example,DC=edu".to_string(),
        ];
        assert_eq!(roles().map_groups(&groups), vec!["ROLE_STUDENT", "ROLE_ADMIN"]);
    }

    #[test]
    fn test_role_mapping_respects_escaped_commas() {
        let mapping = RoleMapping::new().with(r"CN=Doe\, Jane,OU=Groups,DC=example,DC=edu", "ROLE_ADMIN");

        assert_eq!(mapping.role_for(r"cn=doe\, jane, ou=groups, dc=example, dc=edu"), Some("ROLE_ADMIN"));
        assert_eq!(mapping.role_for(r"CN=Doe\,Jane,OU=Groups,DC=example,DC=edu"), None);
        assert_eq!(mapping.role_for(r"CN=Doe\, Jane\ ,OU=Groups,DC=example,DC=edu"), None);
    }

    #[tokio::test]
    async fn test_double_bind_sequence() {
        let dir = directory();
        let user = login(&provider(dir.clone()), "jdoe", "correct-horse").await.unwrap();

        assert_eq!(user.id, "jdoe");
        assert_eq!(user.display_name, "Jane Doe");
        assert_eq!(user.roles, vec!["ROLE_STUDENT"]);
        assert_eq!(user.groups.len(), 2);
        assert_eq!(user.email.as_deref(), Some("jdoe@example.edu"));

        let user_dn = "CN=jdoe,OU=Users,DC=example,DC=edu";
        assert_eq!(
            dir.events(),
            vec![
                "connect".to_string(),
                format!("bind {}", SERVICE_DN),
                "search (&(objectClass=user)(sAMAccountName=jdoe))".to_string(),
                format!("bind {}", user_dn),
                format!("bind {}", SERVICE_DN),
                format!("read {}", user_dn),
                "close".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_wrong_password_is_invalid_credentials() {
        let dir = directory();
        let err = login(&provider(dir.clone()), "jdoe", "wrong").await.unwrap_err();

        assert_eq!(err, AuthError::InvalidCredentials);
        assert_eq!(dir.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let err = login(&provider(directory()), "ghost", "whatever").await.unwrap_err();
        assert_eq!(err, AuthError::UserNotFound);
    }

    #[tokio::test]
    async fn test_ambiguous_match_is_user_not_found() {
        let dir = directory().with_account("jdoe", "other", "Jane Twin", &[]);
        let err = login(&provider(dir), "jdoe", "correct-horse").await.unwrap_err();
        assert_eq!(err, AuthError::UserNotFound);
    }

    #[tokio::test]
    async fn test_injection_attempt_matches_nothing() {
        let err = login(&provider(directory()), "*", "x").await.unwrap_err();
        assert_eq!(err, AuthError::UserNotFound);
    }

    #[tokio::test]
    async fn test_empty_password_never_reaches_directory() {
        let dir = directory();
        let err = login(&provider(dir.clone()), "jdoe", "").await.unwrap_err();

        assert_eq!(err, AuthError::InvalidCredentials);
        assert!(dir.events().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_account_checked_before_bind() {
        let mut dir = directory();
        dir.accounts[0].entry = dir.accounts[0].entry.clone().with_attribute("userAccountControl", "514");

        let err = login(&provider(dir.clone()), "jdoe", "correct-horse").await.unwrap_err();
        assert_eq!(err, AuthError::UserDisabled);
        assert!(!dir.events().iter().any(|e| e.contains("CN=jdoe")));
    }

    #[tokio::test]
    async fn test_connection_failure_retried_then_succeeds() {
        let dir = ScriptedDirectory {
            connect_failures: 1,
            ..directory()
        };
        let user = login(&provider(dir.clone()), "root", "toor").await.unwrap();

        assert_eq!(user.roles, vec!["ROLE_ADMIN", "ROLE_STUDENT"]);
        assert_eq!(dir.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_persistent_outage_is_unavailable() {
        let dir = ScriptedDirectory {
            connect_failures: u32::MAX,
            ..directory()
        };
        let err = login(&provider(dir.clone()), "jdoe", "correct-horse").await.unwrap_err();

        assert_eq!(err, AuthError::ProviderUnavailable);
        // One attempt plus max_retries.
        assert_eq!(dir.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_bad_service_credentials_are_unavailable() {
        let mut s = settings();
        s.bind_password = "rotated".to_string();
        let p = DirectoryProvider::new(directory(), s).with_role_mapping(roles());

        let err = login(&p, "jdoe", "correct-horse").await.unwrap_err();
        assert_eq!(err, AuthError::ProviderUnavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_directory_hits_timeout() {
        let dir = ScriptedDirectory {
            hang_on_search: true,
            ..directory()
        };
        let err = login(&provider(dir), "jdoe", "correct-horse").await.unwrap_err();
        assert_eq!(err, AuthError::ProviderUnavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_deadline_tighter_than_timeout() {
        let dir = ScriptedDirectory {
            hang_on_search: true,
            ..directory()
        };
        let ctx = CallContext::with_timeout(Duration::from_millis(50));

        let started = tokio::time::Instant::now();
        let err = provider(dir).authenticate(&ctx, "jdoe", "correct-horse").await.unwrap_err();

        assert_eq!(err, AuthError::ProviderUnavailable);
        assert!(started.elapsed() < Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_still_authenticates() {
        let settings = DirectorySettings {
            timeout: Duration::from_secs(u64::MAX),
            ..settings()
        };
        let p = DirectoryProvider::new(directory(), settings).with_role_mapping(roles());

        let user = login(&p, "jdoe", "correct-horse").await.unwrap();
        assert_eq!(user.roles, vec!["ROLE_STUDENT"]);
    }
}
