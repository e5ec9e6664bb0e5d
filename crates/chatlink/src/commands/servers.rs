//! Server list management command handlers.
//!
//! Handles adding, removing, enabling and listing MCP servers.

use crate::runtime;
use anyhow::bail;
use chatlink_auth::{FileTokenStore, TokenStore};
use chatlink_core::{Config, ServerConfiguration};
use chatlink_mcp::TokenPlacement;
use clap::Subcommand;
use std::path::Path;

/// Server subcommands.
#[derive(Subcommand)]
pub enum ServerCommands {
    /// List configured servers
    List,
    /// Add a server
    Add {
        /// Display name
        name: String,
        /// MCP endpoint URL
        url: String,
        /// OAuth client id registered with the server
        #[arg(long)]
        client_id: Option<String>,
        /// OAuth client secret
        #[arg(long, requires = "client_id")]
        client_secret: Option<String>,
        /// Send the access token as a query parameter instead of a header
        #[arg(long)]
        query_token: bool,
        /// Expect plain JSON replies instead of event streams
        #[arg(long)]
        no_streaming: bool,
        /// Request timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Remove a server
    Remove {
        /// Server URL, name or id
        server: String,
    },
    /// Enable a server
    Enable {
        /// Server URL, name or id
        server: String,
    },
    /// Disable a server
    Disable {
        /// Server URL, name or id
        server: String,
    },
}

/// Handle server commands.
pub async fn handle_servers(
    command: ServerCommands,
    config: &Config,
    explicit: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        ServerCommands::List => list_servers(config).await,
        ServerCommands::Add {
            name,
            url,
            client_id,
            client_secret,
            query_token,
            no_streaming,
            timeout_ms,
        } => {
            let mut server = ServerConfiguration::new(name, url)
                .with_streaming(!no_streaming)
                .with_token_placement(if query_token {
                    TokenPlacement::Query
                } else {
                    TokenPlacement::Header
                });
            if let Some(client_id) = client_id {
                server = server.with_oauth(client_id, client_secret);
            }
            if let Some(timeout_ms) = timeout_ms {
                server = server.with_timeout_ms(timeout_ms);
            }
            add_server(explicit, server).await
        }
        ServerCommands::Remove { server } => remove_server(explicit, &server).await,
        ServerCommands::Enable { server } => set_enabled(explicit, &server, true).await,
        ServerCommands::Disable { server } => set_enabled(explicit, &server, false).await,
    }
}

async fn list_servers(config: &Config) -> anyhow::Result<()> {
    if config.servers.is_empty() {
        println!("No MCP servers configured");
        println!();
        println!("Add one with: chatlink servers add <name> <url>");
        return Ok(());
    }

    // Sign-in state is informational; a missing data dir just hides it.
    let store = FileTokenStore::new().ok();

    println!("MCP servers:");
    println!();
    for server in &config.servers {
        let marker = if server.enabled() { "●" } else { "○" };
        println!("  {marker} {}", server.display_name());
        println!("    url:     {}", server.url());

        if server.oauth_client().is_some() {
            let signed_in = match &store {
                Some(store) => store.has_token(server.url()).await.unwrap_or(false),
                None => false,
            };
            let state = if signed_in { "signed in" } else { "not signed in" };
            println!("    oauth:   {state}");
        }
        if !server.enabled() {
            println!("    status:  disabled");
        }
    }

    Ok(())
}

async fn add_server(explicit: Option<&Path>, server: ServerConfiguration) -> anyhow::Result<()> {
    let path = runtime::writable_path(explicit)?;
    let mut config = runtime::load_writable(&path).await?;

    let name = server.display_name();
    config.add_server(server)?;
    config.save(&path).await?;

    println!("✓ Added MCP server '{name}'");
    println!();
    println!("Configuration saved to {}", path.display());
    Ok(())
}

async fn remove_server(explicit: Option<&Path>, key: &str) -> anyhow::Result<()> {
    let path = runtime::writable_path(explicit)?;
    let mut config = runtime::load_writable(&path).await?;

    let Some(removed) = config.remove_server(key) else {
        bail!("No server matching '{key}' in {}", path.display());
    };
    config.save(&path).await?;

    println!("✓ Removed MCP server '{}'", removed.display_name());
    Ok(())
}

async fn set_enabled(explicit: Option<&Path>, key: &str, enabled: bool) -> anyhow::Result<()> {
    let path = runtime::writable_path(explicit)?;
    let mut config = runtime::load_writable(&path).await?;

    if !config.set_server_enabled(key, enabled) {
        bail!("No server matching '{key}' in {}", path.display());
    }
    config.save(&path).await?;

    let verb = if enabled { "Enabled" } else { "Disabled" };
    println!("✓ {verb} MCP server '{key}'");
    Ok(())
}
