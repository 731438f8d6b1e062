use clap::{Args, Subcommand};
use config::Config;
use serde_json::json;

use crate::output;

#[derive(Subcommand)]
pub enum TenantsCommand {
    #[command(about = "Create a tenant role with table privileges")]
    Create(TenantArgs),

    #[command(about = "Delete a tenant role and everything it owns")]
    Delete(TenantArgs),

    #[command(about = "List existing tenants")]
    List(TenantListArgs)
}

#[derive(Args)]
pub struct TenantArgs {
    /// Tenant slug (the role name without its prefix)
    pub slug: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool
}

#[derive(Args)]
pub struct TenantListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool
}

pub async fn run(cmd: TenantsCommand, config: &Config) -> anyhow::Result<()> {
    match cmd {
        TenantsCommand::Create(args) => run_create(args, config).await,
        TenantsCommand::Delete(args) => run_delete(args, config).await,
        TenantsCommand::List(args) => run_list(args, config).await
    }
}

async fn run_create(args: TenantArgs, config: &Config) -> anyhow::Result<()> {
    let manager = super::connect(config).await?;
    let role = manager.get_tenant_role_name(&args.slug)?;
    manager.create_tenant(&args.slug).await?;

    if args.json {
        let output = json!({
            "operation": "tenant_create",
            "tenant": args.slug,
            "role": role
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        output::success(&format!("Created tenant '{}' (role {})", args.slug, role));
    }
    Ok(())
}

async fn run_delete(args: TenantArgs, config: &Config) -> anyhow::Result<()> {
    let manager = super::connect(config).await?;
    let role = manager.get_tenant_role_name(&args.slug)?;
    manager.delete_tenant(&args.slug).await?;

    if args.json {
        let output = json!({
            "operation": "tenant_delete",
            "tenant": args.slug,
            "role": role
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        output::success(&format!("Deleted tenant '{}' (role {})", args.slug, role));
    }
    Ok(())
}

async fn run_list(args: TenantListArgs, config: &Config) -> anyhow::Result<()> {
    let manager = super::connect(config).await?;
    let mut tenants: Vec<String> = manager.list_tenants().await?.into_iter().collect();
    tenants.sort();

    if args.json {
        let output = json!({
            "prefix": config.tenancy.role_prefix,
            "tenants": tenants
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if tenants.is_empty() {
        output::info(&format!(
            "No roles with prefix '{}' found",
            config.tenancy.role_prefix
        ));
        output::hint("Create one with: pg-tenants tenants create <slug>");
        return Ok(());
    }

    output::header(&format!("Tenants ({})", tenants.len()));
    for tenant in &tenants {
        println!("  {}", tenant);
    }
    Ok(())
}
