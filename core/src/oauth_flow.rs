//! Interactive authorization-code flow with a single-shot local callback listener.
//!
//! ```text
//! Idle -> AwaitingCallback -> { Succeeded | Failed(reason) | TimedOut } -> Closed
//! ```

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

use crate::auth::{generate_code_challenge, generate_code_verifier, generate_state};
use crate::config::{Config, OAUTH_CALLBACK_PATH, OAUTH_CALLBACK_TIMEOUT};
use crate::error::AuthError;
use crate::provider::{AuthorizationRequest, OAuthProvider};
use crate::token_store::{TokenRecord, TokenStore};

const MAX_HEADER_LINES: usize = 100;
const MAX_REQUEST_HEAD_BYTES: u64 = 16 * 1024;
/// Connections that send nothing (browser preconnects) are dropped after this.
const REQUEST_HEAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    AwaitingCallback,
    Succeeded,
    Failed(String),
    TimedOut,
    Closed,
}

/// Listener placement and the callback wait window.
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub redirect_host: String,
    pub callback_path: String,
    pub timeout: Duration,
}

impl FlowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            port: config.oauth_port,
            ..Self::default()
        }
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: crate::config::DEFAULT_OAUTH_PORT,
            redirect_host: "localhost".to_string(),
            callback_path: OAUTH_CALLBACK_PATH.to_string(),
            timeout: OAUTH_CALLBACK_TIMEOUT,
        }
    }
}

/// Drives the consent flow and persists the resulting token.
pub struct OAuthFlowCoordinator {
    provider: Arc<dyn OAuthProvider>,
    store: TokenStore,
    settings: FlowSettings,
    state: FlowState,
}

impl OAuthFlowCoordinator {
    pub fn new(provider: Arc<dyn OAuthProvider>, store: TokenStore, settings: FlowSettings) -> Self {
        Self {
            provider,
            store,
            settings,
            state: FlowState::Idle,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    /// `Idle -> AwaitingCallback`: bind the listener and build the consent URL.
    /// The wait window starts here.
    pub async fn start(&mut self) -> Result<PendingAuthorization<'_>, AuthError> {
        if self.state != FlowState::Idle {
            return Err(AuthError::OAuthCallback(
                "authorization flow was already started".to_string(),
            ));
        }

        let listener =
            CallbackListener::bind(SocketAddr::new(self.settings.bind_addr, self.settings.port))
                .await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!(
            "http://{}:{port}{}",
            self.settings.redirect_host, self.settings.callback_path
        );

        let csrf_state = generate_state();
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);
        let consent_url = self.provider.authorization_url(&AuthorizationRequest {
            redirect_uri: &redirect_uri,
            state: &csrf_state,
            code_challenge: &code_challenge,
        });

        self.state = FlowState::AwaitingCallback;
        tracing::info!(%redirect_uri, "Waiting for OAuth callback");

        Ok(PendingAuthorization {
            deadline: tokio::time::Instant::now() + self.settings.timeout,
            coordinator: self,
            listener,
            consent_url,
            redirect_uri,
            csrf_state,
            code_verifier,
        })
    }

    fn transition(&mut self, next: FlowState) {
        tracing::debug!(from = ?self.state, to = ?next, "OAuth flow transition");
        self.state = next;
    }
}

/// A started flow waiting for its browser redirect.
pub struct PendingAuthorization<'a> {
    coordinator: &'a mut OAuthFlowCoordinator,
    listener: CallbackListener,
    consent_url: String,
    redirect_uri: String,
    csrf_state: String,
    code_verifier: String,
    deadline: tokio::time::Instant,
}

impl PendingAuthorization<'_> {
    pub fn consent_url(&self) -> &str {
        &self.consent_url
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn csrf_state(&self) -> &str {
        &self.csrf_state
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AuthError> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for exactly one terminal outcome, then close the listener. The
    /// window covers the code exchange as well as the redirect.
    pub async fn await_result(mut self) -> Result<TokenRecord, AuthError> {
        let timeout = self.coordinator.settings.timeout;
        let callback_path = self.coordinator.settings.callback_path.clone();
        let deadline = self.deadline;

        let result = match tokio::time::timeout_at(deadline, self.receive(&callback_path)).await {
            Ok(result) => result,
            Err(_) => {
                self.coordinator.transition(FlowState::TimedOut);
                Err(AuthError::OAuthTimeout(timeout))
            }
        };

        self.close();
        result
    }

    async fn receive(&mut self, callback_path: &str) -> Result<TokenRecord, AuthError> {
        match self.listener.next_callback(callback_path).await {
            Ok((mut stream, params)) => {
                let result = self.complete(&params).await;
                let page = match &result {
                    Ok(_) => CallbackPage::success(),
                    Err(err) => CallbackPage::failure(err),
                };
                if let Err(err) = page.write_to(&mut stream).await {
                    tracing::debug!(error = %err, "Failed to answer OAuth callback request");
                }
                result
            }
            Err(err) => {
                self.coordinator
                    .transition(FlowState::Failed(format!("listener error: {err}")));
                Err(AuthError::Listener(err))
            }
        }
    }

    async fn complete(&mut self, params: &HashMap<String, String>) -> Result<TokenRecord, AuthError> {
        if let Some(error) = params.get("error") {
            self.coordinator.transition(FlowState::Failed(error.clone()));
            return Err(AuthError::OAuthCallback(error.clone()));
        }

        if let Some(state) = params.get("state")
            && state != &self.csrf_state
        {
            self.coordinator
                .transition(FlowState::Failed("state mismatch".to_string()));
            return Err(AuthError::OAuthCallback(
                "state mismatch, possible request forgery".to_string(),
            ));
        }

        let Some(code) = params.get("code").filter(|code| !code.is_empty()) else {
            self.coordinator
                .transition(FlowState::Failed("no code".to_string()));
            return Err(AuthError::OAuthCallback(
                "No authorization code received".to_string(),
            ));
        };

        let record = match self
            .coordinator
            .provider
            .exchange_code(code, &self.redirect_uri, &self.code_verifier)
            .await
        {
            Ok(record) if !record.access_token.is_empty() && !record.refresh_token.is_empty() => {
                record
            }
            Ok(_) => {
                self.coordinator
                    .transition(FlowState::Failed("exchange returned empty tokens".to_string()));
                return Err(AuthError::OAuthExchange(
                    "Failed to obtain tokens from Google".to_string(),
                ));
            }
            Err(err) => {
                self.coordinator
                    .transition(FlowState::Failed(err.to_string()));
                return Err(match err {
                    AuthError::OAuthExchange(_) => err,
                    other => AuthError::OAuthExchange(other.to_string()),
                });
            }
        };

        if let Err(err) = self.coordinator.store.save(&record).await {
            self.coordinator.transition(FlowState::Failed(err.to_string()));
            return Err(err);
        }

        self.coordinator.transition(FlowState::Succeeded);
        tracing::info!(path = %self.coordinator.store.path().display(), "OAuth token saved");
        Ok(record)
    }

    fn close(&mut self) {
        if self.listener.close() {
            self.coordinator.transition(FlowState::Closed);
        }
    }
}

/// Local listener that is shut down at most once.
struct CallbackListener {
    listener: Option<TcpListener>,
    closed: AtomicBool,
}

impl CallbackListener {
    async fn bind(addr: SocketAddr) -> Result<Self, AuthError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener: Some(listener),
            closed: AtomicBool::new(false),
        })
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        match &self.listener {
            Some(listener) => listener.local_addr(),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "callback listener is closed",
            )),
        }
    }

    /// Returns `true` only for the call that actually closed the listener.
    fn close(&mut self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.listener.take();
        true
    }

    /// Accept connections until one targets `callback_path` with `GET`.
    /// Request heads are read concurrently so an idle connection cannot hold
    /// up the real redirect.
    async fn next_callback(
        &mut self,
        callback_path: &str,
    ) -> std::io::Result<(TcpStream, HashMap<String, String>)> {
        let Some(listener) = &self.listener else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "callback listener is closed",
            ));
        };

        let mut heads = JoinSet::new();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (mut stream, peer) = accepted?;
                    heads.spawn(async move {
                        let head =
                            tokio::time::timeout(REQUEST_HEAD_TIMEOUT, read_request_head(&mut stream))
                                .await;
                        (stream, peer, head)
                    });
                }
                Some(joined) = heads.join_next() => {
                    let Ok((mut stream, peer, head)) = joined else {
                        continue;
                    };
                    let (method, target) = match head {
                        Ok(Ok(head)) => head,
                        Ok(Err(err)) => {
                            tracing::debug!(%peer, error = %err, "Discarding malformed callback request");
                            continue;
                        }
                        Err(_) => {
                            tracing::debug!(%peer, "Dropping idle callback connection");
                            continue;
                        }
                    };

                    let url = match url::Url::parse(&format!("http://localhost{target}")) {
                        Ok(url) => url,
                        Err(_) => {
                            let _ = CallbackPage::plain(400, "Bad Request").write_to(&mut stream).await;
                            continue;
                        }
                    };

                    if url.path() != callback_path {
                        let _ = CallbackPage::plain(404, "Not Found").write_to(&mut stream).await;
                        continue;
                    }
                    if method != "GET" {
                        let _ = CallbackPage::plain(405, "Method Not Allowed")
                            .write_to(&mut stream)
                            .await;
                        continue;
                    }

                    let params = url.query_pairs().into_owned().collect();
                    return Ok((stream, params));
                }
            }
        }
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read the request line and drain headers. Returns `(method, target)`.
async fn read_request_head(stream: &mut TcpStream) -> std::io::Result<(String, String)> {
    let mut reader = BufReader::new(stream).take(MAX_REQUEST_HEAD_BYTES);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    if !request_line.ends_with('\n') {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "request line missing or too long",
        ));
    }

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "invalid HTTP request line",
        ));
    };
    let head = (method.to_string(), target.to_string());

    for _ in 0..MAX_HEADER_LINES {
        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }
    Ok(head)
}

struct CallbackPage {
    status: u16,
    reason: &'static str,
    body: String,
}

impl CallbackPage {
    fn success() -> Self {
        Self {
            status: 200,
            reason: "OK",
            body: "<html><head><style>body { font-family: system-ui; text-align: center; padding: 50px; } h1 { color: #22c55e; }</style></head>\
                   <body><h1>Authentication Successful!</h1><p>You can close this window and return to the terminal.</p></body></html>"
                .to_string(),
        }
    }

    fn failure(err: &AuthError) -> Self {
        let (status, reason) = match err {
            AuthError::OAuthCallback(_) => (400, "Bad Request"),
            _ => (500, "Internal Server Error"),
        };
        Self {
            status,
            reason,
            body: format!(
                "<html><body><h1>Authentication Failed</h1><p>{}</p></body></html>",
                escape_html(&err.to_string())
            ),
        }
    }

    fn plain(status: u16, reason: &'static str) -> Self {
        Self {
            status,
            reason,
            body: format!("<html><body><h1>{reason}</h1></body></html>"),
        }
    }

    async fn write_to(&self, stream: &mut TcpStream) -> std::io::Result<()> {
        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status,
            self.reason,
            self.body.len(),
            self.body
        );
        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
