//! Configuration loading and log setup for the CLI.

use std::path::Path;

use anyhow::{Context, anyhow};
use config::{
    Config, ObservabilityConfig, load_from_env, load_from_file, merge_configs, validate,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Defaults, then the optional config file, then `PG_*`/`TN_*`/`OB_*`
/// environment variables. The result is validated before use.
pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let file_config = match path {
        Some(path) => load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default()
    };
    let env_config =
        load_from_env().map_err(|e| anyhow!("Invalid environment configuration: {}", e))?;

    let config = merge_configs(
        Config::default(),
        file_config,
        "file",
        env_config,
        "env",
        None,
        "cli"
    );
    validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured
/// level. Logs go to stderr so command output stays machine readable.
pub fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&observability.logging_level));
    let registry = tracing_subscriber::registry().with(filter);

    if observability.json_logs {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn test_load_without_file_uses_defaults() {
        let config = load(None).unwrap();
        assert_eq!(config.tenancy.role_prefix, "tenant_");
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[tenancy]\nrole_prefix = \"org_\"").unwrap();

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.tenancy.role_prefix, "org_");
    }

    #[test]
    #[serial]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[tenancy]\nschema = \"public; DROP\"").unwrap();

        assert!(load(Some(file.path())).is_err());
    }
}
