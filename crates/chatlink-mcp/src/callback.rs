//! Loopback redirect listener for the OAuth browser step.
//!
//! Opens the authorization page in the system browser and waits for the
//! redirect on `http://127.0.0.1:<port>/oauth/callback`.

use crate::error::AuthError;
use crate::oauth::AuthorizationAgent;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_CALLBACK_PORT: u16 = 19876;
pub const CALLBACK_PATH: &str = "/oauth/callback";
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Time one browser connection gets to send its request line.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens a URL for the user.
pub type BrowserLauncher = Arc<dyn Fn(&Url) -> std::io::Result<()> + Send + Sync>;

const HTML_SUCCESS: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>chatlink - Signed in</title>
  <style>
    body { font-family: system-ui, -apple-system, sans-serif; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background: #0f172a; color: #e2e8f0; }
    .box { text-align: center; padding: 2rem; }
    h1 { color: #4ade80; }
  </style>
</head>
<body>
  <div class="box">
    <h1>Signed in</h1>
    <p>You can close this tab and go back to chatlink.</p>
  </div>
  <script>setTimeout(() => window.close(), 2000);</script>
</body>
</html>"#;

fn html_error(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>chatlink - Sign-in failed</title>
  <style>
    body {{ font-family: system-ui, -apple-system, sans-serif; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background: #0f172a; color: #e2e8f0; }}
    .box {{ text-align: center; padding: 2rem; }}
    h1 {{ color: #f87171; }}
    code {{ color: #fca5a5; }}
  </style>
</head>
<body>
  <div class="box">
    <h1>Sign-in failed</h1>
    <p><code>{}</code></p>
  </div>
</body>
</html>"#,
        html_escape(message)
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn http_response(status: u16, content_type: &str, body: &str) -> String {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        _ => "Unknown",
    };
    format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// [`AuthorizationAgent`] backed by the system browser and a loopback
/// listener.
///
/// Flows are serialized: only one authorization waits on the port at a time.
pub struct LoopbackAuthorizationAgent {
    port: u16,
    redirect_uri: Option<String>,
    timeout: Duration,
    launcher: BrowserLauncher,
    flow: Mutex<()>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl LoopbackAuthorizationAgent {
    pub fn new() -> Self {
        Self {
            port: DEFAULT_CALLBACK_PORT,
            redirect_uri: None,
            timeout: DEFAULT_CALLBACK_TIMEOUT,
            launcher: Arc::new(|url: &Url| open::that(url.as_str())),
            flow: Mutex::new(()),
            cancel: Mutex::new(None),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Advertise a different redirect URI, e.g. one forwarded to the
    /// loopback port. The listener still serves `CALLBACK_PATH`.
    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the browser launcher.
    pub fn with_launcher(mut self, launcher: BrowserLauncher) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Abort the pending authorization, if any. It fails with
    /// [`AuthError::UserCancelled`].
    pub async fn cancel(&self) {
        if let Some(token) = self.cancel.lock().await.take() {
            info!("Cancelling pending authorization");
            token.cancel();
        }
    }

    async fn wait_for_redirect(
        &self,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<Url, AuthError> {
        // Browsers open speculative sockets; serve each connection on its own.
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(AuthError::UserCancelled),
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let port = self.port;
                        connections.spawn(async move {
                            let handled = handle_connection(stream, port);
                            tokio::time::timeout(REQUEST_READ_TIMEOUT, handled)
                                .await
                                .unwrap_or_else(|_| {
                                    Err(std::io::Error::new(
                                        std::io::ErrorKind::TimedOut,
                                        "no request received",
                                    ))
                                })
                        });
                    }
                    Err(e) => warn!(error = %e, "Failed to accept callback connection"),
                },
                Some(joined) = connections.join_next() => match joined {
                    Ok(Ok(Some(redirect))) => return Ok(redirect),
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => debug!(error = %e, "Error handling OAuth callback"),
                    Err(e) => warn!(error = %e, "Callback handler did not complete"),
                },
            }
        }
    }
}

impl Default for LoopbackAuthorizationAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthorizationAgent for LoopbackAuthorizationAgent {
    fn redirect_uri(&self) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| format!("http://127.0.0.1:{}{CALLBACK_PATH}", self.port))
    }

    async fn authorize(&self, authorization_url: &Url) -> Result<Url, AuthError> {
        let _flow = self.flow.lock().await;

        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AuthError::CallbackServer(format!("failed to bind {addr}: {e}")))?;
        info!(port = self.port, "Waiting for OAuth callback");

        let token = CancellationToken::new();
        *self.cancel.lock().await = Some(token.clone());

        let result = match (self.launcher)(authorization_url) {
            Ok(()) => {
                match tokio::time::timeout(self.timeout, self.wait_for_redirect(listener, token))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(AuthError::CallbackTimeout),
                }
            }
            Err(e) => Err(AuthError::BrowserLaunch(e.to_string())),
        };

        self.cancel.lock().await.take();
        result
    }
}

/// Answer one browser request. Returns the redirect URL when the request hit
/// the callback path.
async fn handle_connection(mut stream: TcpStream, port: u16) -> std::io::Result<Option<Url>> {
    let mut buffer = [0u8; 4096];
    let n = stream.read(&mut buffer).await?;
    let request = String::from_utf8_lossy(&buffer[..n]);

    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1));
    let redirect = target.and_then(|t| Url::parse(&format!("http://127.0.0.1:{port}{t}")).ok());

    let Some(redirect) = redirect else {
        let response = http_response(400, "text/plain", "Bad Request");
        stream.write_all(response.as_bytes()).await?;
        return Ok(None);
    };

    if redirect.path() != CALLBACK_PATH {
        let response = http_response(404, "text/plain", "Not Found");
        stream.write_all(response.as_bytes()).await?;
        return Ok(None);
    }

    let param = |name: &str| {
        redirect
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };
    debug!(has_code = param("code").is_some(), "Received OAuth callback");

    let response = if let Some(error) = param("error") {
        let message = param("error_description").unwrap_or(error);
        http_response(200, "text/html", &html_error(&message))
    } else if param("code").is_some() {
        http_response(200, "text/html", HTML_SUCCESS)
    } else {
        http_response(400, "text/html", &html_error("No authorization code provided"))
    };
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;

    Ok(Some(redirect))
}
