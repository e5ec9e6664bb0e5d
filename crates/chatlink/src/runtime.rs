//! Wiring of the long-lived components for one CLI invocation.

use anyhow::{bail, Context};
use chatlink_auth::{FileTokenStore, TokenStore};
use chatlink_core::{Config, ConnectionOrchestrator, ProgressBus};
use chatlink_mcp::{LoopbackAuthorizationAgent, Notifier, OAuthAuthenticator};
use chatlink_tools::{SchemaFieldMapper, ToolBridge};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Load the configuration, from `explicit` alone when given.
///
/// A missing explicit file is an error unless `allow_missing` is set, as it
/// is for commands that create the file.
pub async fn load_config(
    explicit: Option<&Path>,
    allow_missing: bool,
) -> anyhow::Result<(Config, Vec<PathBuf>)> {
    match explicit {
        Some(path) if path.exists() => {
            let config = Config::load_file(path)
                .await
                .with_context(|| format!("Failed to load {}", path.display()))?;
            config.validate()?;
            Ok((config, vec![path.to_path_buf()]))
        }
        Some(_) if allow_missing => Ok((Config::default(), Vec::new())),
        Some(path) => bail!("Configuration file {} does not exist", path.display()),
        None => {
            let cwd = std::env::current_dir()?;
            Ok(Config::load(Some(&cwd)).await?)
        }
    }
}

/// File that server edits are written to.
pub fn writable_path(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(Config::default_path()?),
    }
}

/// Load only the file at `path`, so a save does not copy in other sources.
pub async fn load_writable(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    Config::load_file(path)
        .await
        .with_context(|| format!("Failed to load {}", path.display()))
}

/// Components shared by the connecting commands.
pub struct Runtime {
    pub bus: ProgressBus,
    pub authenticator: Arc<OAuthAuthenticator>,
    pub orchestrator: Arc<ConnectionOrchestrator>,
}

impl Runtime {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let bus = ProgressBus::new();
        let notifier: Arc<dyn Notifier> = Arc::new(bus.clone());
        let store: Arc<dyn TokenStore> =
            Arc::new(FileTokenStore::new().context("Failed to open token store")?);

        let oauth = config.oauth_settings();
        let mut agent = LoopbackAuthorizationAgent::new()
            .with_port(oauth.callback_port())
            .with_timeout(oauth.timeout());
        if let Some(uri) = &oauth.redirect_uri {
            agent = agent.with_redirect_uri(uri.clone());
        }

        let authenticator = Arc::new(
            OAuthAuthenticator::new(store.clone(), Arc::new(agent))
                .with_notifier(notifier.clone())
                .with_pkce(oauth.use_pkce()),
        );

        let mapper = Arc::new(SchemaFieldMapper::new(
            config.bridge_settings().fallback_argument_key(),
        ));
        let bridge = Arc::new(ToolBridge::new(mapper, notifier.clone()));

        let orchestrator = Arc::new(ConnectionOrchestrator::new(
            Arc::new(config.clone()),
            authenticator.clone(),
            store,
            bridge,
            notifier,
        ));

        Ok(Self {
            bus,
            authenticator,
            orchestrator,
        })
    }

    /// Print progress messages to stderr until the bus goes away.
    pub fn print_progress(&self) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(message) => eprintln!("  {message}"),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
