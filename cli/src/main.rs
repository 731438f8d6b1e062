use anyhow::Result;
use clap::Parser;

mod commands;
mod models;
mod output;
mod settings;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = settings::load(cli.config.as_deref())?;
    settings::init_tracing(&config.observability);

    match cli.command {
        Commands::Tenants(cmd) => commands::tenants::run(cmd, &config).await,
        Commands::Policy(cmd) => commands::policy::run(cmd, &config),
        Commands::Migrate(cmd) => commands::migrate::run(cmd, &config).await,
        Commands::Whoami(args) => commands::whoami::run(args, &config).await,
        Commands::Completion(args) => commands::completion::run(args)
    }
}
