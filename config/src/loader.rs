//! # Environment Variable Loader
//!
//! Loads configuration from environment variables following 12-factor app
//! principles.
//!
//! # Naming Convention
//! - `PG_*`: PostgreSQL settings
//! - `TN_*`: Tenancy settings
//! - `OB_*`: Observability settings

use crate::config::{Config, ObservabilityConfig, PostgresConfig, TenancySettings};
use std::env;

/// Load configuration from environment variables.
///
/// Unset or unparsable variables fall back to the defaults.
///
/// ## Environment Variables
/// ### PostgreSQL Settings (`PG_*`)
/// - `PG_HOST`: Database host (default: "localhost")
/// - `PG_PORT`: Database port (default: 5432)
/// - `PG_DATABASE`: Database name (default: "postgres")
/// - `PG_USERNAME`: Database user (default: "postgres")
/// - `PG_PASSWORD`: Database password (default: "")
/// - `PG_POOL_SIZE`: Connection pool size (default: 10)
/// - `PG_TIMEOUT_SECONDS`: Acquire timeout in seconds (default: 30)
///
/// ### Tenancy Settings (`TN_*`)
/// - `TN_SCHEMA`: Schema holding tenant tables (default: "public")
/// - `TN_ROLE_PREFIX`: Tenant role prefix (default: "tenant_")
/// - `TN_RESOLVER_FUNCTION`: Current-tenant function (default:
///   "tenancy_current_tenant")
/// - `TN_POLICY_NAME`: Isolation policy name (default:
///   "tenant_select_policy")
///
/// ### Observability Settings (`OB_*`)
/// - `OB_LOGGING_LEVEL`: trace/debug/info/warn/error (default: "info")
/// - `OB_JSON_LOGS`: JSON log lines (true/false, default: false)
pub fn load_from_env() -> Result<Config, Box<dyn std::error::Error>> {
    Ok(Config {
        postgres: load_postgres_from_env()?,
        tenancy: load_tenancy_from_env()?,
        observability: load_observability_from_env()?
    })
}

fn load_postgres_from_env() -> Result<PostgresConfig, Box<dyn std::error::Error>> {
    let defaults = PostgresConfig::default();
    Ok(PostgresConfig {
        host: env::var("PG_HOST").unwrap_or(defaults.host),
        port: parse_env("PG_PORT").unwrap_or(defaults.port),
        database: env::var("PG_DATABASE").unwrap_or(defaults.database),
        username: env::var("PG_USERNAME").unwrap_or(defaults.username),
        password: env::var("PG_PASSWORD").unwrap_or_default(),
        pool_size: parse_env("PG_POOL_SIZE").unwrap_or(defaults.pool_size),
        timeout_seconds: parse_env("PG_TIMEOUT_SECONDS").unwrap_or(defaults.timeout_seconds)
    })
}

fn load_tenancy_from_env() -> Result<TenancySettings, Box<dyn std::error::Error>> {
    let defaults = TenancySettings::default();
    Ok(TenancySettings {
        schema: env::var("TN_SCHEMA").unwrap_or(defaults.schema),
        role_prefix: env::var("TN_ROLE_PREFIX").unwrap_or(defaults.role_prefix),
        resolver_function: env::var("TN_RESOLVER_FUNCTION").unwrap_or(defaults.resolver_function),
        policy_name: env::var("TN_POLICY_NAME").unwrap_or(defaults.policy_name)
    })
}

fn load_observability_from_env() -> Result<ObservabilityConfig, Box<dyn std::error::Error>> {
    let defaults = ObservabilityConfig::default();
    Ok(ObservabilityConfig {
        logging_level: env::var("OB_LOGGING_LEVEL").unwrap_or(defaults.logging_level),
        json_logs: parse_env("OB_JSON_LOGS").unwrap_or(defaults.json_logs)
    })
}

fn parse_env<T>(key: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static
{
    match env::var(key) {
        Ok(s) => s
            .parse::<T>()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>),
        Err(e) => Err(Box::new(e) as Box<dyn std::error::Error>)
    }
}
