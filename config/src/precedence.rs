//! # Configuration Precedence
//!
//! Merges configuration from multiple sources with precedence rules.
//!
//! # Precedence Order
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values (lowest priority)
//!
//! A field in a higher-priority source only wins when it differs from the
//! built-in default, so sources that leave a field unset never clobber a
//! value set by a lower-priority source.

use crate::config::{Config, ObservabilityConfig, PostgresConfig, TenancySettings};

/// Merge multiple configuration sources with precedence.
///
/// ## Usage
/// ```rust,no_run
/// use config::{Config, load_from_env, load_from_file, merge_configs};
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let from_file = load_from_file(Path::new("tenancy.toml"))?;
///     let from_env = load_from_env()?;
///
///     let _config = merge_configs(Config::default(), from_file, "file", from_env, "env", None, "cli");
///     Ok(())
/// }
/// ```
pub fn merge_configs(
    defaults: Config,
    file_config: Config,
    file_source_name: &str,
    env_config: Config,
    env_source_name: &str,
    cli_config: Option<Config>,
    cli_source_name: &str
) -> Config {
    let mut config = defaults;

    config = merge_with_logging(config, file_config, file_source_name);
    config = merge_with_logging(config, env_config, env_source_name);

    if let Some(cli) = cli_config {
        config = merge_with_logging(config, cli, cli_source_name);
    }

    config
}

fn merge_with_logging(mut base: Config, override_config: Config, source_name: &str) -> Config {
    let mut changes = Vec::new();

    merge_postgres(&mut base.postgres, &override_config.postgres, &mut changes);
    merge_tenancy(&mut base.tenancy, &override_config.tenancy, &mut changes);
    merge_observability(
        &mut base.observability,
        &override_config.observability,
        &mut changes
    );

    if !changes.is_empty() {
        tracing::debug!("Configuration from {}: {:?}", source_name, changes);
    }

    base
}

fn merge_field<T: PartialEq + Clone + std::fmt::Display>(
    base: &mut T,
    candidate: &T,
    default: &T,
    name: &str,
    changes: &mut Vec<String>
) {
    if candidate != default && candidate != base {
        changes.push(format!("{} = {}", name, candidate));
        base.clone_from(candidate);
    }
}

fn merge_postgres(
    base: &mut PostgresConfig,
    override_config: &PostgresConfig,
    changes: &mut Vec<String>
) {
    let defaults = PostgresConfig::default();
    merge_field(
        &mut base.host,
        &override_config.host,
        &defaults.host,
        "postgres.host",
        changes
    );
    merge_field(
        &mut base.port,
        &override_config.port,
        &defaults.port,
        "postgres.port",
        changes
    );
    merge_field(
        &mut base.database,
        &override_config.database,
        &defaults.database,
        "postgres.database",
        changes
    );
    merge_field(
        &mut base.username,
        &override_config.username,
        &defaults.username,
        "postgres.username",
        changes
    );
    if !override_config.password.is_empty() && override_config.password != base.password {
        changes.push("postgres.password = ***".to_string());
        base.password.clone_from(&override_config.password);
    }
    merge_field(
        &mut base.pool_size,
        &override_config.pool_size,
        &defaults.pool_size,
        "postgres.pool_size",
        changes
    );
    merge_field(
        &mut base.timeout_seconds,
        &override_config.timeout_seconds,
        &defaults.timeout_seconds,
        "postgres.timeout_seconds",
        changes
    );
}

fn merge_tenancy(
    base: &mut TenancySettings,
    override_config: &TenancySettings,
    changes: &mut Vec<String>
) {
    let defaults = TenancySettings::default();
    merge_field(
        &mut base.schema,
        &override_config.schema,
        &defaults.schema,
        "tenancy.schema",
        changes
    );
    merge_field(
        &mut base.role_prefix,
        &override_config.role_prefix,
        &defaults.role_prefix,
        "tenancy.role_prefix",
        changes
    );
    merge_field(
        &mut base.resolver_function,
        &override_config.resolver_function,
        &defaults.resolver_function,
        "tenancy.resolver_function",
        changes
    );
    merge_field(
        &mut base.policy_name,
        &override_config.policy_name,
        &defaults.policy_name,
        "tenancy.policy_name",
        changes
    );
}

fn merge_observability(
    base: &mut ObservabilityConfig,
    override_config: &ObservabilityConfig,
    changes: &mut Vec<String>
) {
    let defaults = ObservabilityConfig::default();
    merge_field(
        &mut base.logging_level,
        &override_config.logging_level,
        &defaults.logging_level,
        "observability.logging_level",
        changes
    );
    merge_field(
        &mut base.json_logs,
        &override_config.json_logs,
        &defaults.json_logs,
        "observability.json_logs",
        changes
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_configs_precedence() {
        let file_config = Config {
            postgres: PostgresConfig {
                host: "file_host".to_string(),
                port: 6000,
                ..Default::default()
            },
            ..Default::default()
        };

        let env_config = Config {
            postgres: PostgresConfig {
                port: 7000,
                ..Default::default()
            },
            ..Default::default()
        };

        let cli_config = Config {
            tenancy: TenancySettings {
                role_prefix: "cli_".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = merge_configs(
            Config::default(),
            file_config,
            "file",
            env_config,
            "env",
            Some(cli_config),
            "cli"
        );

        assert_eq!(merged.postgres.host, "file_host");
        assert_eq!(merged.postgres.port, 7000);
        assert_eq!(merged.tenancy.role_prefix, "cli_");
        assert_eq!(merged.tenancy.schema, "public");
    }

    #[test]
    fn test_default_valued_override_does_not_clobber() {
        let file_config = Config {
            observability: ObservabilityConfig {
                logging_level: "debug".to_string(),
                json_logs: true
            },
            ..Default::default()
        };

        let merged = merge_configs(
            Config::default(),
            file_config,
            "file",
            Config::default(),
            "env",
            None,
            "cli"
        );

        assert_eq!(merged.observability.logging_level, "debug");
        assert!(merged.observability.json_logs);
    }

    #[test]
    fn test_password_override() {
        let env_config = Config {
            postgres: PostgresConfig {
                password: "from-env".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = merge_configs(
            Config::default(),
            Config::default(),
            "file",
            env_config,
            "env",
            None,
            "cli"
        );
        assert_eq!(merged.postgres.password, "from-env");
    }
}
