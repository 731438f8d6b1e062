use clap::{Args, Subcommand};
use config::Config;
use tenancy::PolicyTemplate;
use tenancy::identifier::ensure_plain;
use tenancy::policy::{enable_rls_statement, render_resolver_function};

use crate::output;

#[derive(Subcommand)]
pub enum PolicyCommand {
    #[command(about = "Print the isolation policy for a table")]
    Render(RenderArgs),

    #[command(about = "Print the tenant resolver function")]
    Resolver
}

#[derive(Args)]
pub struct RenderArgs {
    /// Table to render the policy for
    pub table: String,

    /// Resolver function referenced by the policy (defaults to the
    /// schema-qualified configured function)
    #[arg(long)]
    pub resolver: Option<String>,

    /// Also print the ALTER TABLE statement enabling row-level security
    #[arg(long)]
    pub enable: bool
}

pub fn run(cmd: PolicyCommand, config: &Config) -> anyhow::Result<()> {
    match cmd {
        PolicyCommand::Render(args) => run_render(args, config),
        PolicyCommand::Resolver => {
            let tenancy = &config.tenancy;
            output::sql_block([render_resolver_function(
                &tenancy.schema,
                &tenancy.resolver_function,
                &tenancy.role_prefix
            )
            .as_str()]);
            Ok(())
        }
    }
}

fn run_render(args: RenderArgs, config: &Config) -> anyhow::Result<()> {
    let table = ensure_plain(&args.table)?;
    let resolver = args
        .resolver
        .unwrap_or_else(|| config.tenancy.qualified_resolver());
    let template = PolicyTemplate::new(config.tenancy.policy_name.clone(), resolver);

    let mut statements = Vec::new();
    if args.enable {
        statements.push(enable_rls_statement(table));
    }
    statements.push(template.render(table));
    output::sql_block(statements.iter().map(String::as_str));
    Ok(())
}
