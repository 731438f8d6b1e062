use std::path::PathBuf;

use clap::{Args, Subcommand};
use config::Config;
use serde_json::json;
use tenancy::MigrationOp;

use crate::{models, output};

#[derive(Subcommand)]
pub enum MigrateCommand {
    #[command(about = "Show the RLS operations the live database still needs")]
    Plan(MigrateArgs),

    #[command(about = "Execute the pending RLS operations in one transaction")]
    Apply(MigrateArgs)
}

#[derive(Args)]
pub struct MigrateArgs {
    /// Table model file (TOML or YAML) declaring tables and their RLS marks
    #[arg(long, short)]
    pub models: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool
}

pub async fn run(cmd: MigrateCommand, config: &Config) -> anyhow::Result<()> {
    match cmd {
        MigrateCommand::Plan(args) => run_plan(args, config).await,
        MigrateCommand::Apply(args) => run_apply(args, config).await
    }
}

async fn run_plan(args: MigrateArgs, config: &Config) -> anyhow::Result<()> {
    let metadata = models::load(&args.models)?;
    let manager = super::connect(config).await?;
    let ops = manager.plan_rls(&[metadata]).await?;

    if args.json {
        print_json("migrate_plan", &ops)?;
    } else if ops.is_empty() {
        output::success("Row level security is up to date");
    } else {
        output::info(&format!("{} pending operation(s)", ops.len()));
        output::sql_block(ops.iter().filter_map(MigrationOp::sql));
    }
    Ok(())
}

async fn run_apply(args: MigrateArgs, config: &Config) -> anyhow::Result<()> {
    let metadata = models::load(&args.models)?;
    let manager = super::connect(config).await?;
    let ops = manager.apply_rls(&[metadata]).await?;

    if args.json {
        print_json("migrate_apply", &ops)?;
    } else if ops.is_empty() {
        output::success("Row level security is up to date");
    } else {
        output::success(&format!("Applied {} operation(s)", ops.len()));
    }
    Ok(())
}

fn print_json(operation: &str, ops: &[MigrationOp]) -> anyhow::Result<()> {
    let output = json!({
        "operation": operation,
        "count": ops.len(),
        "operations": ops
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
