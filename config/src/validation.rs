//! # Configuration Validation
//!
//! Validates configuration structures using the `validator` crate.

use crate::config::Config;
use validator::Validate;

/// Validate configuration structure.
///
/// ## Validation Rules
/// ### PostgreSQL
/// - `host`: 1-255 characters
/// - `port`: 1-65535
/// - `database`, `username`: 1-63 characters
/// - `pool_size`: 1-100
/// - `timeout_seconds`: 1-300
///
/// ### Tenancy
/// - `schema`, `role_prefix`, `resolver_function`, `policy_name`: plain SQL
///   identifiers (`[A-Za-z_][A-Za-z0-9_$]*`, at most 63 bytes)
///
/// ### Observability
/// - `logging_level`: must be "trace", "debug", "info", "warn", or "error"
pub fn validate(config: &Config) -> Result<(), validator::ValidationErrors> {
    config.validate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_invalid_postgres_host() {
        let mut config = Config::default();
        config.postgres.host = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_invalid_postgres_port() {
        let mut config = Config::default();
        config.postgres.port = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_postgres_pool_size_out_of_range() {
        let mut config = Config::default();
        config.postgres.pool_size = 101;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_postgres_timeout_out_of_range() {
        let mut config = Config::default();
        config.postgres.timeout_seconds = 301;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_quoted_role_prefix() {
        let mut config = Config::default();
        config.tenancy.role_prefix = "tenant\"; DROP ROLE admin; --".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_schema() {
        let mut config = Config::default();
        config.tenancy.schema = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_resolver_with_parentheses() {
        let mut config = Config::default();
        config.tenancy.resolver_function = "current_tenant()".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_invalid_logging_level() {
        let mut config = Config::default();
        config.observability.logging_level = "verbose".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_valid_logging_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let mut config = Config::default();
            config.observability.logging_level = level.to_string();
            assert!(validate(&config).is_ok());
        }
    }
}
