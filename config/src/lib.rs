//! # Configuration System
//!
//! Centralized configuration for the tenant isolation layer.
//!
//! This crate provides:
//! - Configuration structures (PostgreSQL connection, tenancy naming, logging)
//! - Environment variable loading (12-factor app principles)
//! - Configuration file loading (TOML/YAML)
//! - Configuration precedence (CLI > env > file > defaults)
//! - Configuration validation

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod precedence;
pub mod validation;

pub use config::{
    Config, ObservabilityConfig, PostgresConfig, TenancySettings, is_plain_identifier,
};
pub use file_loader::{ConfigFileError, load_from_file, load_from_toml, load_from_yaml};
pub use loader::load_from_env;
pub use precedence::merge_configs;
pub use validation::validate;
pub use ::validator::Validate;
