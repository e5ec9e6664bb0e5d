//! chatlink - MCP tools for chat sessions.
//!
//! This is the main entry point for the chatlink CLI.

mod commands;
mod runtime;

use chatlink_util::log::{self, LogConfig, LogLevel};
use clap::{Parser, Subcommand};
use commands::{AuthArgs, LogoutArgs, ServerCommands};
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "chatlink")]
#[command(author, version, about = "Connect chat sessions to tools on remote MCP servers", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this configuration file instead of the global and project files
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configured MCP servers
    Servers {
        #[command(subcommand)]
        command: ServerCommands,
    },
    /// Connect to all enabled servers and report their status
    Connect,
    /// List the tools offered by connected servers
    Tools {
        /// Print the tool definitions handed to the model as JSON
        #[arg(long)]
        json: bool,
    },
    /// Call a tool
    Call {
        /// Tool name as listed by `chatlink tools`
        tool: String,
        /// Primary input for the tool
        input: String,
        /// Other arguments as a JSON object
        #[arg(long = "args")]
        args: Option<String>,
    },
    /// Sign in to an OAuth-protected server
    Auth(AuthArgs),
    /// Remove stored credentials
    Logout(LogoutArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let creates_config = matches!(cli.command, Commands::Servers { .. });
    let (config, sources) = runtime::load_config(cli.config.as_deref(), creates_config).await?;

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        config.log_level().unwrap_or(LogLevel::Info)
    };
    let log_file = log::init(LogConfig {
        print: cli.verbose,
        level,
        include_location: cli.verbose,
        file: Some(log::default_log_path()),
    });
    if let Some(path) = &log_file {
        debug!(path = %path.display(), "Logging to file");
    }
    info!(sources = ?sources, servers = config.servers.len(), "Loaded configuration");

    match cli.command {
        Commands::Servers { command } => {
            commands::handle_servers(command, &config, cli.config.as_deref()).await?;
        }
        Commands::Connect => {
            commands::handle_connect(&config).await?;
        }
        Commands::Tools { json } => {
            commands::handle_tools(&config, json).await?;
        }
        Commands::Call { tool, input, args } => {
            commands::handle_call(&config, &tool, &input, args.as_deref()).await?;
        }
        Commands::Auth(args) => {
            commands::handle_auth(args, &config).await?;
        }
        Commands::Logout(args) => {
            commands::handle_logout(args, &config).await?;
        }
    }

    Ok(())
}
