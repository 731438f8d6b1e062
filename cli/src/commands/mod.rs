pub mod completion;
pub mod migrate;
pub mod policy;
pub mod tenants;
pub mod whoami;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::Config;
use tenancy::TenantManager;

#[derive(Parser)]
#[command(
    name = "pg-tenants",
    author,
    version,
    about = "pg-tenants - tenant roles and row-level security for PostgreSQL",
    long_about = "Each tenant is a PostgreSQL role. Tables carrying a 'tenant' column are \
                  isolated with row-level security policies that resolve the tenant from the \
                  session role.\n\nConnection settings come from PG_* variables, naming from \
                  TN_* variables, optionally layered over a --config file."
)]
pub struct Cli {
    /// Configuration file (TOML or YAML)
    #[arg(long, global = true, env = "PG_TENANTS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(subcommand, about = "Create, delete and list tenants")]
    Tenants(tenants::TenantsCommand),

    #[command(subcommand, about = "Render row-level security DDL")]
    Policy(policy::PolicyCommand),

    #[command(subcommand, about = "Plan or apply RLS migrations for a declared model")]
    Migrate(migrate::MigrateCommand),

    #[command(about = "Show the database role a session runs as")]
    Whoami(whoami::WhoamiArgs),

    #[command(about = "Generate shell completions")]
    Completion(completion::CompletionArgs)
}

pub(crate) async fn connect(config: &Config) -> anyhow::Result<TenantManager> {
    TenantManager::connect(&config.postgres, config.tenancy.clone())
        .await
        .with_context(|| {
            format!(
                "Failed to connect to {}",
                config.postgres.redacted_url()
            )
        })
}
