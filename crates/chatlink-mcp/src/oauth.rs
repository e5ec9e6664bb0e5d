//! OAuth 2.0 authorization-code flow for MCP servers.
//!
//! ```text
//! Idle -> CheckCachedToken -> [valid] ---------------------------------> Authenticated
//!                          -> [invalid/absent] -> Authorizing -> Exchanging -> Authenticated
//!                                                 -> [cancel / error] -> Failed
//! ```
//!
//! A cached token is checked with an `initialize` probe; only HTTP 200
//! keeps it. Otherwise the browser step runs through an
//! [`AuthorizationAgent`] and the returned code is exchanged at
//! `/oauth/token`. The token is stored keyed by server URL.

use crate::error::AuthError;
use crate::notify::{self, Notifier};
use crate::protocol::{InitializeParams, JsonRpcRequest, METHOD_INITIALIZE};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chatlink_auth::TokenStore;
use rand::Rng;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;

/// Prefix of every generated `state` value.
pub const STATE_PREFIX: &str = "chatlink-";

pub const AUTHORIZE_PATH: &str = "/oauth/authorize";
pub const TOKEN_PATH: &str = "/oauth/token";

/// Default timeout for the token probe and code exchange.
pub const DEFAULT_OAUTH_TIMEOUT: Duration = Duration::from_secs(30);

/// Pre-registered OAuth client for one server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
}

impl OAuthClientConfig {
    pub fn new(client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            scope: None,
        }
    }
}

/// Where an authentication for a server currently stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthPhase {
    #[default]
    Idle,
    CheckCachedToken,
    Authorizing,
    Exchanging,
    Authenticated,
    Failed,
}

/// Performs the interactive part of the flow: shows the authorization page
/// and resolves with the redirect it ends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthorizationAgent: Send + Sync {
    /// Redirect URI registered for the client.
    fn redirect_uri(&self) -> String;

    /// Open `authorization_url` and wait for the redirect back.
    ///
    /// Fails with [`AuthError::UserCancelled`] when the user dismisses the
    /// flow.
    async fn authorize(&self, authorization_url: &Url) -> Result<Url, AuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Drives the OAuth flow and owns the cached tokens.
pub struct OAuthAuthenticator {
    http: reqwest::Client,
    store: Arc<dyn TokenStore>,
    agent: Arc<dyn AuthorizationAgent>,
    notifier: Arc<dyn Notifier>,
    use_pkce: bool,
    timeout: Duration,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    phases: RwLock<HashMap<String, AuthPhase>>,
}

impl OAuthAuthenticator {
    pub fn new(store: Arc<dyn TokenStore>, agent: Arc<dyn AuthorizationAgent>) -> Self {
        Self {
            http: reqwest::Client::new(),
            store,
            agent,
            notifier: notify::noop(),
            use_pkce: false,
            timeout: DEFAULT_OAUTH_TIMEOUT,
            locks: Mutex::new(HashMap::new()),
            phases: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Send an S256 PKCE challenge along with the client secret.
    pub fn with_pkce(mut self, use_pkce: bool) -> Self {
        self.use_pkce = use_pkce;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Current phase for a server.
    pub async fn phase(&self, server_url: &str) -> AuthPhase {
        self.phases
            .read()
            .await
            .get(server_url)
            .copied()
            .unwrap_or_default()
    }

    async fn set_phase(&self, server_url: &str, phase: AuthPhase) {
        debug!(server = %server_url, ?phase, "OAuth phase");
        self.phases
            .write()
            .await
            .insert(server_url.to_string(), phase);
    }

    async fn server_lock(&self, server_url: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(server_url.to_string())
            .or_default()
            .clone()
    }

    /// Return a valid access token for the server, running the browser flow
    /// when no usable token is cached.
    pub async fn authenticate(
        &self,
        server_url: &str,
        client: &OAuthClientConfig,
    ) -> Result<String, AuthError> {
        let lock = self.server_lock(server_url).await;
        let _guard = lock.lock().await;

        match self.run_flow(server_url, client).await {
            Ok(token) => {
                self.set_phase(server_url, AuthPhase::Authenticated).await;
                Ok(token)
            }
            Err(e) => {
                warn!(server = %server_url, error = %e, "OAuth authentication failed");
                self.notifier
                    .notify(&format!("Sign-in to {} failed: {e}", host_of(server_url)));
                self.set_phase(server_url, AuthPhase::Failed).await;
                Err(e)
            }
        }
    }

    async fn run_flow(
        &self,
        server_url: &str,
        client: &OAuthClientConfig,
    ) -> Result<String, AuthError> {
        let host = host_of(server_url);

        self.set_phase(server_url, AuthPhase::CheckCachedToken).await;
        if let Some(token) = self.store.get(server_url).await? {
            self.notifier
                .notify(&format!("Checking saved credentials for {host}..."));
            if self.probe_token(server_url, &token).await {
                info!(server = %server_url, "Cached token is valid");
                return Ok(token);
            }
            info!(server = %server_url, "Cached token rejected, discarding");
            self.store.delete(server_url).await?;
        }

        self.set_phase(server_url, AuthPhase::Authorizing).await;
        let state = generate_state();
        let verifier = self.use_pkce.then(generate_code_verifier);
        let redirect_uri = self.agent.redirect_uri();
        let auth_url = authorization_url(
            server_url,
            client,
            &redirect_uri,
            &state,
            verifier.as_deref().map(code_challenge).as_deref(),
        )?;

        self.notifier
            .notify(&format!("Opening browser to sign in to {host}..."));
        let callback = self.agent.authorize(&auth_url).await?;
        let code = parse_callback(&callback, &state)?;

        self.set_phase(server_url, AuthPhase::Exchanging).await;
        self.notifier.notify("Exchanging authorization code...");
        let token = self
            .exchange_code(server_url, client, &code, &redirect_uri, verifier.as_deref())
            .await?;

        self.store.save(server_url, &token).await?;
        info!(server = %server_url, "OAuth authentication complete");
        self.notifier.notify(&format!("Signed in to {host}"));
        Ok(token)
    }

    /// Check a token with an `initialize` request. Only HTTP 200 counts as
    /// valid; network errors count as invalid.
    pub async fn probe_token(&self, server_url: &str, token: &str) -> bool {
        let params = serde_json::to_value(InitializeParams::default()).ok();
        let request = JsonRpcRequest::new(1, METHOD_INITIALIZE, params);

        let result = self
            .http
            .post(server_url)
            .timeout(self.timeout)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ACCEPT, "application/json, text/event-stream")
            .json(&request)
            .send()
            .await;

        match result {
            Ok(response) => {
                debug!(server = %server_url, status = %response.status(), "Token probe");
                response.status() == StatusCode::OK
            }
            Err(e) => {
                debug!(server = %server_url, error = %e, "Token probe failed");
                false
            }
        }
    }

    async fn exchange_code(
        &self,
        server_url: &str,
        client: &OAuthClientConfig,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<String, AuthError> {
        let token_url = token_url(server_url)?;

        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", client.client_id.as_str()),
            ("redirect_uri", redirect_uri),
        ];
        if let Some(secret) = client.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier));
        }

        let response = self
            .http
            .post(token_url)
            .timeout(self.timeout)
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::network(format!("token request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::network(format!("failed to read token response: {e}")))?;

        if status != StatusCode::OK {
            return Err(AuthError::HttpExchangeFailed {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::MalformedTokenResponse(e.to_string()))?;

        match parsed.access_token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(AuthError::MalformedTokenResponse(
                "missing access_token".to_string(),
            )),
        }
    }

    /// Forget the token for one server.
    pub async fn logout(&self, server_url: &str) -> Result<bool, AuthError> {
        let lock = self.server_lock(server_url).await;
        let _guard = lock.lock().await;

        let removed = self.store.delete(server_url).await?;
        self.phases.write().await.remove(server_url);
        info!(server = %server_url, removed, "Logged out");
        Ok(removed)
    }

    /// Forget every stored token.
    pub async fn logout_all(&self) -> Result<(), AuthError> {
        self.store.delete_all().await?;
        self.phases.write().await.clear();
        info!("Logged out from all servers");
        Ok(())
    }

    /// Whether a token is stored for the server. Does not validate it.
    pub async fn is_authenticated(&self, server_url: &str) -> Result<bool, AuthError> {
        Ok(self.store.has_token(server_url).await?)
    }

    /// Stored token for the server, if any.
    pub async fn access_token(&self, server_url: &str) -> Result<Option<String>, AuthError> {
        Ok(self.store.get(server_url).await?)
    }
}

/// Random `state` value.
pub fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..16).map(|_| rng.gen()).collect();
    format!("{STATE_PREFIX}{}", URL_SAFE_NO_PAD.encode(&bytes))
}

/// PKCE code verifier.
pub fn generate_code_verifier() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// S256 code challenge for a verifier.
pub fn code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

fn origin_url(server_url: &str, path: &str) -> Result<Url, AuthError> {
    let mut url =
        Url::parse(server_url).map_err(|e| AuthError::InvalidServerUrl(format!("{server_url}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(AuthError::InvalidServerUrl(server_url.to_string()));
    }
    url.set_path(path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Authorization page for the server: its origin plus `/oauth/authorize`.
pub fn authorization_url(
    server_url: &str,
    client: &OAuthClientConfig,
    redirect_uri: &str,
    state: &str,
    code_challenge: Option<&str>,
) -> Result<Url, AuthError> {
    let mut url = origin_url(server_url, AUTHORIZE_PATH)?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("client_id", &client.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("state", state);
        if let Some(scope) = client.scope.as_deref() {
            query.append_pair("scope", scope);
        }
        if let Some(challenge) = code_challenge {
            query
                .append_pair("code_challenge", challenge)
                .append_pair("code_challenge_method", "S256");
        }
    }
    Ok(url)
}

/// Token endpoint for the server: its origin plus `/oauth/token`.
pub fn token_url(server_url: &str) -> Result<Url, AuthError> {
    origin_url(server_url, TOKEN_PATH)
}

/// Pull the authorization code out of a redirect, checking `state`.
pub fn parse_callback(callback: &Url, expected_state: &str) -> Result<String, AuthError> {
    let params: HashMap<String, String> = callback
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    match params.get("state") {
        Some(state) if state == expected_state => {}
        Some(_) => return Err(AuthError::invalid_callback("state mismatch")),
        None => return Err(AuthError::invalid_callback("missing state parameter")),
    }

    if let Some(error) = params.get("error") {
        let message = params
            .get("error_description")
            .cloned()
            .unwrap_or_else(|| error.clone());
        return Err(AuthError::AuthorizationDenied(message));
    }

    match params.get("code") {
        Some(code) if !code.is_empty() => Ok(code.clone()),
        _ => Err(AuthError::MissingAuthorizationCode),
    }
}

fn host_of(server_url: &str) -> String {
    Url::parse(server_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| server_url.to_string())
}
