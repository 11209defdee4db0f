//! Authentication configuration.
//!
//! Built once at process start from environment variables, validated, then
//! shared read-only for the lifetime of the process. This is the only place
//! environment state is read; every other component receives validated
//! values. A validation failure is fatal and the process must not serve
//! requests.

use chrono::Duration as TokenDuration;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default token issuer.
pub const DEFAULT_ISSUER: &str = "schedule-api";

/// Default fixture document location.
pub const DEFAULT_FIXTURE_PATH: &str = "testdata/fixture_users.json";

const DEFAULT_TTL_MIN: i64 = 60;
const DEFAULT_DIRECTORY_TIMEOUT_SEC: u64 = 8;
const DEFAULT_DIRECTORY_MAX_RETRIES: u32 = 1;

/// Longest accepted token lifetime (30 days).
pub const MAX_TOKEN_TTL_MIN: i64 = 30 * 24 * 60;

/// Longest accepted directory operation deadline.
pub const MAX_DIRECTORY_TIMEOUT_SEC: u64 = 300;

/// Credential backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Pre-loaded fixture records (development and tests)
    #[default]
    Fixture,
    /// Directory service reached through the double-bind protocol
    Directory,
}

impl AuthMode {
    /// Parse a mode selector, case-insensitively.
    ///
    /// `mock` and `ldap` are accepted as aliases.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "fixture" | "mock" => Ok(AuthMode::Fixture),
            "directory" | "ldap" => Ok(AuthMode::Directory),
            _ => Err(ConfigError::InvalidMode(value.trim().to_string())),
        }
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Fixture => "fixture",
            AuthMode::Directory => "directory",
        }
    }
}

/// Directory service connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct DirectorySettings {
    /// Server address, e.g. `ldaps://dc.example.edu:636`
    pub address: String,

    /// Base DN of the directory, e.g. `DC=example,DC=edu`
    pub base_dn: String,

    /// Base DN for the user search; falls back to `base_dn`
    pub user_search_base_dn: String,

    /// Service account DN
    pub bind_dn: String,

    /// Service account password
    pub bind_password: String,

    /// Connect with TLS from the first byte (LDAPS)
    pub use_tls: bool,

    /// Upgrade a plaintext connection with STARTTLS
    pub starttls: bool,

    /// Deadline for the whole bind/search sequence
    pub timeout: Duration,

    /// Additional connection attempts after the first failure
    pub max_retries: u32,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            address: String::new(),
            base_dn: String::new(),
            user_search_base_dn: String::new(),
            bind_dn: String::new(),
            bind_password: String::new(),
            use_tls: true,
            starttls: false,
            timeout: Duration::from_secs(DEFAULT_DIRECTORY_TIMEOUT_SEC),
            max_retries: DEFAULT_DIRECTORY_MAX_RETRIES,
        }
    }
}

impl fmt::Debug for DirectorySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectorySettings")
            .field("address", &self.address)
            .field("base_dn", &self.base_dn)
            .field("user_search_base_dn", &self.user_search_base_dn)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"[REDACTED]")
            .field("use_tls", &self.use_tls)
            .field("starttls", &self.starttls)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl DirectorySettings {
    /// Base DN used for the account search.
    pub fn search_base(&self) -> &str {
        if self.user_search_base_dn.is_empty() {
            &self.base_dn
        } else {
            &self.user_search_base_dn
        }
    }

    /// Names of required settings that are empty.
    pub fn missing_fields(&self) -> Vec<String> {
        [
            ("DIRECTORY_ADDR", &self.address),
            ("DIRECTORY_BASE_DN", &self.base_dn),
            ("DIRECTORY_BIND_DN", &self.bind_dn),
            ("DIRECTORY_BIND_PASSWORD", &self.bind_password),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| key.to_string())
        .collect()
    }
}

/// Validated authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Active credential backend
    pub mode: AuthMode,

    /// HMAC signing secret for tokens
    pub token_secret: Vec<u8>,

    /// Token time-to-live
    pub token_ttl: TokenDuration,

    /// Issuer recorded in and required of tokens
    pub token_issuer: String,

    /// Fixture document used in fixture mode
    pub fixture_path: PathBuf,

    /// Directory backend settings (required in directory mode)
    pub directory: DirectorySettings,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("mode", &self.mode)
            .field("token_secret", &"[REDACTED]")
            .field("token_ttl", &self.token_ttl)
            .field("token_issuer", &self.token_issuer)
            .field("fixture_path", &self.fixture_path)
            .field("directory", &self.directory)
            .finish()
    }
}

impl AuthConfig {
    /// Load configuration from environment variables and validate it.
    ///
    /// Environment variables:
    /// - `AUTH_MODE`: `fixture` or `directory` (default: fixture)
    /// - `AUTH_TOKEN_SECRET`: HMAC secret (required)
    /// - `AUTH_TOKEN_ISSUER`: token issuer (default: schedule-api)
    /// - `AUTH_TOKEN_TTL_MIN`: token lifetime in minutes (default: 60, at most 30 days)
    /// - `AUTH_FIXTURE_PATH`: fixture document (default: testdata/fixture_users.json)
    /// - `DIRECTORY_ADDR`, `DIRECTORY_BASE_DN`, `DIRECTORY_BIND_DN`,
    ///   `DIRECTORY_BIND_PASSWORD`: required in directory mode
    /// - `DIRECTORY_USER_SEARCH_BASE`: user search base (default: base DN)
    /// - `DIRECTORY_USE_TLS`: connect over TLS (default: true)
    /// - `DIRECTORY_STARTTLS`: upgrade with STARTTLS (default: false)
    /// - `DIRECTORY_TIMEOUT_SEC`: operation deadline in seconds (default: 8, at most 300)
    /// - `DIRECTORY_MAX_RETRIES`: connection retries (default: 1)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source and validate it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let mode = AuthMode::parse(&env.string("AUTH_MODE"))?;

        let issuer = env.string("AUTH_TOKEN_ISSUER");
        let fixture_path = env.string("AUTH_FIXTURE_PATH");

        let ttl_min = env.parse_or("AUTH_TOKEN_TTL_MIN", DEFAULT_TTL_MIN);
        let token_ttl = TokenDuration::try_minutes(ttl_min).ok_or_else(|| ConfigError::InvalidValue {
            key: "AUTH_TOKEN_TTL_MIN".to_string(),
            message: format!("{} minutes is out of range", ttl_min),
        })?;

        let config = Self {
            mode,
            token_secret: env.raw("AUTH_TOKEN_SECRET").into_bytes(),
            token_ttl,
            token_issuer: if issuer.is_empty() {
                DEFAULT_ISSUER.to_string()
            } else {
                issuer
            },
            fixture_path: if fixture_path.is_empty() {
                PathBuf::from(DEFAULT_FIXTURE_PATH)
            } else {
                PathBuf::from(fixture_path)
            },
            directory: DirectorySettings {
                address: env.string("DIRECTORY_ADDR"),
                base_dn: env.string("DIRECTORY_BASE_DN"),
                user_search_base_dn: env.string("DIRECTORY_USER_SEARCH_BASE"),
                bind_dn: env.string("DIRECTORY_BIND_DN"),
                bind_password: env.raw("DIRECTORY_BIND_PASSWORD"),
                use_tls: env.flag_or("DIRECTORY_USE_TLS", true),
                starttls: env.flag_or("DIRECTORY_STARTTLS", false),
                timeout: Duration::from_secs(
                    env.parse_or("DIRECTORY_TIMEOUT_SEC", DEFAULT_DIRECTORY_TIMEOUT_SEC),
                ),
                max_retries: env.parse_or("DIRECTORY_MAX_RETRIES", DEFAULT_DIRECTORY_MAX_RETRIES),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Create a fixture-mode configuration with the given secret.
    pub fn fixture(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            mode: AuthMode::Fixture,
            token_secret: secret.into(),
            token_ttl: TokenDuration::minutes(DEFAULT_TTL_MIN),
            token_issuer: DEFAULT_ISSUER.to_string(),
            fixture_path: PathBuf::from(DEFAULT_FIXTURE_PATH),
            directory: DirectorySettings::default(),
        }
    }

    /// Validate the configuration.
    ///
    /// Fails if the secret is empty (in any mode), if the TTL is not in
    /// `(0, MAX_TOKEN_TTL_MIN]`, if the directory timeout is not in
    /// `(0, MAX_DIRECTORY_TIMEOUT_SEC]`, or, in directory mode, if any
    /// required directory setting is missing. Every missing directory setting
    /// is reported, not just the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }

        if self.token_ttl <= TokenDuration::zero() {
            return Err(ConfigError::InvalidValue {
                key: "AUTH_TOKEN_TTL_MIN".to_string(),
                message: "token lifetime must be positive".to_string(),
            });
        }
        if self.token_ttl > TokenDuration::minutes(MAX_TOKEN_TTL_MIN) {
            return Err(ConfigError::InvalidValue {
                key: "AUTH_TOKEN_TTL_MIN".to_string(),
                message: format!("token lifetime must not exceed {} minutes", MAX_TOKEN_TTL_MIN),
            });
        }

        let timeout = self.directory.timeout;
        if timeout.is_zero() || timeout > Duration::from_secs(MAX_DIRECTORY_TIMEOUT_SEC) {
            return Err(ConfigError::InvalidValue {
                key: "DIRECTORY_TIMEOUT_SEC".to_string(),
                message: format!("timeout must be between 1 and {} seconds", MAX_DIRECTORY_TIMEOUT_SEC),
            });
        }

        match self.mode {
            AuthMode::Fixture => Ok(()),
            AuthMode::Directory => {
                let missing = self.directory.missing_fields();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(ConfigError::MissingDirectorySettings(missing))
                }
            }
        }
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> String {
        (self.lookup)(key).unwrap_or_default()
    }

    fn string(&self, key: &str) -> String {
        self.raw(key).trim().to_string()
    }

    fn parse_or<T>(&self, key: &str, default: T) -> T
    where
        T: std::str::FromStr + fmt::Display,
    {
        let value = self.string(key);
        if value.is_empty() {
            return default;
        }
        match value.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(key, value = %value, default = %default, "Unparseable setting, using default");
                default
            }
        }
    }

    fn flag_or(&self, key: &str, default: bool) -> bool {
        let value = self.string(key).to_ascii_lowercase();
        if value.is_empty() {
            return default;
        }
        matches!(value.as_str(), "1" | "true" | "yes" | "y")
    }
}
