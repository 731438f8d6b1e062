use clap::Args;
use config::Config;
use serde_json::json;

#[derive(Args)]
pub struct WhoamiArgs {
    /// Open a session as this tenant instead of the admin user
    #[arg(long)]
    pub tenant: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool
}

pub async fn run(args: WhoamiArgs, config: &Config) -> anyhow::Result<()> {
    let manager = super::connect(config).await?;
    let mut session = match &args.tenant {
        Some(slug) => manager.new_session(slug).await?,
        None => manager.new_admin_session().await?
    };
    let user = session.current_user().await?;

    if args.json {
        let output = json!({
            "tenant": session.tenant(),
            "currentUser": user,
            "state": session.state().to_string()
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", user);
    }
    Ok(())
}
