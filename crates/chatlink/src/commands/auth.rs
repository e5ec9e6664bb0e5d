//! Authentication command handlers.
//!
//! Handles signing in to OAuth-protected servers and removing stored
//! credentials.

use crate::runtime::Runtime;
use anyhow::{anyhow, bail};
use chatlink_core::{Config, ConfigurationProvider};
use clap::Args;

#[derive(Args)]
pub struct AuthArgs {
    /// Server URL, name or id
    pub server: String,
}

#[derive(Args)]
pub struct LogoutArgs {
    /// Server URL, name or id
    #[arg(required_unless_present = "all")]
    pub server: Option<String>,

    /// Remove credentials for every server
    #[arg(long, conflicts_with = "server")]
    pub all: bool,
}

/// Run the browser sign-in for one server.
pub async fn handle_auth(args: AuthArgs, config: &Config) -> anyhow::Result<()> {
    let server = config
        .server(&args.server)
        .ok_or_else(|| anyhow!("No server matching '{}'", args.server))?;
    let Some(client) = server.oauth_client() else {
        bail!(
            "{} has no OAuth client configured; add one with `chatlink servers add --client-id`",
            server.display_name()
        );
    };

    let runtime = Runtime::new(config)?;
    let progress = runtime.print_progress();

    let result = runtime
        .authenticator
        .authenticate(server.url(), &client)
        .await;
    progress.abort();
    result?;

    println!("✓ Signed in to {}", server.display_name());
    Ok(())
}

/// Remove stored tokens.
pub async fn handle_logout(args: LogoutArgs, config: &Config) -> anyhow::Result<()> {
    let runtime = Runtime::new(config)?;

    if args.all {
        runtime.authenticator.logout_all().await?;
        println!("✓ Removed all stored credentials");
        return Ok(());
    }

    let Some(key) = args.server else {
        bail!("Specify a server or --all");
    };
    // Tokens may outlive the server entry; fall back to the raw key.
    let (url, label) = match config.server(&key) {
        Some(server) => (server.url().to_string(), server.display_name()),
        None => (key.clone(), key.clone()),
    };

    if runtime.authenticator.logout(&url).await? {
        println!("✓ Signed out of {label}");
    } else {
        println!("No stored credentials for {label}");
    }
    Ok(())
}
