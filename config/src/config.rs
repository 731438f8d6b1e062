//! # Configuration Structures
//!
//! All configuration structures:
//! - Use `serde` for serialization/deserialization
//! - Use `validator` for input validation
//! - Provide defaults suitable for a local PostgreSQL

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use validator::Validate;

static PLAIN_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]{0,62}$").expect("identifier pattern is valid")
});

/// Returns true when `value` can be embedded in DDL without quoting.
///
/// Plain identifiers start with a letter or underscore, continue with
/// letters, digits, `_` or `$`, and fit PostgreSQL's 63 byte limit.
pub fn is_plain_identifier(value: &str) -> bool {
    PLAIN_IDENTIFIER.is_match(value)
}

/// Top-level configuration.
///
/// ## Usage
/// ```rust,no_run
/// use config::Config;
///
/// let config = Config::default();
/// println!("Tenant roles start with: {}", config.tenancy.role_prefix);
/// ```
///
/// ## Validation
/// All nested configurations must pass their own validation rules.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct Config {
    /// Connection settings for the administrative database user
    #[serde(default)]
    #[validate(nested)]
    pub postgres: PostgresConfig,

    /// Tenant role naming and policy settings
    #[serde(default)]
    #[validate(nested)]
    pub tenancy: TenancySettings,

    /// Logging configuration
    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig
}

/// PostgreSQL configuration.
///
/// The configured user is the "admin" principal: it owns the tenant tables,
/// is granted membership of every tenant role, and receives reassigned
/// objects when a tenant is deleted.
///
/// ## Fields
/// - `host`: Database server hostname (default: "localhost")
/// - `port`: Database server port (default: 5432)
/// - `database`: Database name (default: "postgres")
/// - `username`: Database user (default: "postgres")
/// - `password`: Database password (default: "")
/// - `pool_size`: Maximum connections in pool (default: 10, range: 1-100)
/// - `timeout_seconds`: Acquire timeout (default: 30, range: 1-300)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct PostgresConfig {
    #[serde(default = "default_postgres_host")]
    #[validate(length(min = 1, max = 255))]
    pub host: String,

    #[serde(default = "default_postgres_port")]
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    #[serde(default = "default_postgres_database")]
    #[validate(length(min = 1, max = 63))]
    pub database: String,

    #[serde(default = "default_postgres_username")]
    #[validate(length(min = 1, max = 63))]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_postgres_pool_size")]
    #[validate(range(min = 1, max = 100))]
    pub pool_size: u32,

    #[serde(default = "default_postgres_timeout")]
    #[validate(range(min = 1, max = 300))]
    pub timeout_seconds: u64
}

impl PostgresConfig {
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }

    /// Connection URL with the password masked, for logs.
    pub fn redacted_url(&self) -> String {
        let password = if self.password.is_empty() { "" } else { ":***" };
        format!(
            "postgres://{}{}@{}:{}/{}",
            self.username, password, self.host, self.port, self.database
        )
    }
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "postgres".to_string()
}

fn default_postgres_username() -> String {
    "postgres".to_string()
}

fn default_postgres_pool_size() -> u32 {
    10
}

fn default_postgres_timeout() -> u64 {
    30
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: default_postgres_host(),
            port: default_postgres_port(),
            database: default_postgres_database(),
            username: default_postgres_username(),
            password: String::new(),
            pool_size: default_postgres_pool_size(),
            timeout_seconds: default_postgres_timeout()
        }
    }
}

/// Tenant naming and policy settings.
///
/// ## Fields
/// - `schema`: Schema holding the tenant tables (default: "public")
/// - `role_prefix`: Prefix of every tenant role name (default: "tenant_")
/// - `resolver_function`: Function returning the current session's tenant
///   (default: "tenancy_current_tenant")
/// - `policy_name`: Name of the per-table isolation policy
///   (default: "tenant_select_policy")
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct TenancySettings {
    #[serde(default = "default_schema")]
    #[validate(custom(function = "validate_identifier"))]
    pub schema: String,

    #[serde(default = "default_role_prefix")]
    #[validate(custom(function = "validate_identifier"))]
    pub role_prefix: String,

    #[serde(default = "default_resolver_function")]
    #[validate(custom(function = "validate_identifier"))]
    pub resolver_function: String,

    #[serde(default = "default_policy_name")]
    #[validate(custom(function = "validate_identifier"))]
    pub policy_name: String
}

impl TenancySettings {
    /// Resolver function name qualified with the tenant schema, as referenced
    /// by policies.
    pub fn qualified_resolver(&self) -> String {
        format!("{}.{}", self.schema, self.resolver_function)
    }

    /// Same settings with a different role prefix.
    pub fn with_role_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.role_prefix = prefix.into();
        self
    }

    /// Same settings with a different resolver function name.
    pub fn with_resolver_function(mut self, name: impl Into<String>) -> Self {
        self.resolver_function = name.into();
        self
    }
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_role_prefix() -> String {
    "tenant_".to_string()
}

fn default_resolver_function() -> String {
    "tenancy_current_tenant".to_string()
}

fn default_policy_name() -> String {
    "tenant_select_policy".to_string()
}

fn validate_identifier(value: &str) -> Result<(), validator::ValidationError> {
    if is_plain_identifier(value) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("Invalid SQL identifier"))
    }
}

impl Default for TenancySettings {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            role_prefix: default_role_prefix(),
            resolver_function: default_resolver_function(),
            policy_name: default_policy_name()
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ObservabilityConfig {
    /// Logging level (trace/debug/info/warn/error)
    #[serde(default = "default_logging_level")]
    #[validate(custom(function = "validate_logging_level"))]
    pub logging_level: String,

    /// Emit JSON formatted log lines
    #[serde(default)]
    pub json_logs: bool
}

fn default_logging_level() -> String {
    "info".to_string()
}

fn validate_logging_level(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(validator::ValidationError::new("Invalid logging level"))
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            logging_level: default_logging_level(),
            json_logs: false
        }
    }
}
