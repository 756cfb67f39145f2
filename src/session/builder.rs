use super::{ChatSession, SessionState, SocketController};
use crate::api::{ChatApi, CredentialsProvider};
use crate::infrastructure::{HttpChatApi, http_to_ws_endpoint};
use crate::messaging::EventRouter;
use crate::types::constants::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_HISTORY_PAGE_SIZE, RECONNECT_INTERVALS,
};
use crate::types::{ChatError, Result};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// What the socket controller does when the server drops the connection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Stay closed until the room is selected again
    #[default]
    Never,
    /// Reconnect after each of these delays in turn, repeating the last one
    Backoff(Vec<Duration>),
}

impl ReconnectPolicy {
    pub fn default_backoff() -> Self {
        Self::Backoff(
            RECONNECT_INTERVALS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct ChatSessionOptions {
    /// REST base, e.g. `https://api.example.com/api/`
    pub api_base: String,
    /// WebSocket base; derived from `api_base`'s origin when `None`
    pub ws_base: Option<String>,
    pub history_page_size: usize,
    /// `None` waits for the handshake indefinitely
    pub connect_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
    pub reconnect: ReconnectPolicy,
    /// Put the unread count back when a mark-read call fails
    pub rollback_unread_on_failure: bool,
}

impl Default for ChatSessionOptions {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            ws_base: None,
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
            connect_timeout: Some(Duration::from_millis(DEFAULT_CONNECT_TIMEOUT)),
            request_timeout: None,
            reconnect: ReconnectPolicy::Never,
            rollback_unread_on_failure: false,
        }
    }
}

/// Builder for ChatSession that validates options and wires the components
pub struct ChatSessionBuilder {
    options: ChatSessionOptions,
    credentials: Option<Arc<dyn CredentialsProvider>>,
    api: Option<Arc<dyn ChatApi>>,
}

impl ChatSessionBuilder {
    pub fn new(options: ChatSessionOptions) -> Self {
        Self {
            options,
            credentials: None,
            api: None,
        }
    }

    pub fn credentials(mut self, provider: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    /// Use a custom REST implementation instead of [`HttpChatApi`]
    pub fn api(mut self, api: Arc<dyn ChatApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn build(self) -> Result<ChatSession> {
        let credentials = self
            .credentials
            .ok_or_else(|| ChatError::Auth("credentials provider is required".to_string()))?;

        if self.options.history_page_size == 0 {
            return Err(ChatError::Config(
                "history_page_size must be positive".to_string(),
            ));
        }

        let api_base = parse_with_scheme(&self.options.api_base, &["http", "https"])?;
        let ws_base = match &self.options.ws_base {
            Some(ws) => parse_with_scheme(ws, &["ws", "wss"])?,
            None => {
                let origin = api_base.join("/")?;
                Url::parse(&http_to_ws_endpoint(origin.as_str()))?
            }
        };

        let api: Arc<dyn ChatApi> = match self.api {
            Some(api) => api,
            None => Arc::new(HttpChatApi::new(
                api_base.as_str(),
                Arc::clone(&credentials),
                self.options.request_timeout,
            )?),
        };

        let state = Arc::new(SessionState::new(
            api,
            Arc::clone(&credentials),
            self.options.rollback_unread_on_failure,
        ));
        let router = Arc::new(EventRouter::new(Arc::clone(&state)));
        let controller = SocketController::new(
            Arc::clone(&state),
            ws_base,
            credentials,
            self.options.connect_timeout,
            self.options.reconnect.clone(),
            router,
        );

        Ok(ChatSession {
            options: Arc::new(self.options),
            state,
            controller: Arc::new(controller),
        })
    }
}

fn parse_with_scheme(raw: &str, schemes: &[&str]) -> Result<Url> {
    if raw.is_empty() {
        return Err(ChatError::Config("endpoint URL is required".to_string()));
    }
    let url = Url::parse(raw)?;
    if !schemes.contains(&url.scheme()) {
        return Err(ChatError::Config(format!(
            "unsupported scheme '{}' in {}, expected one of {:?}",
            url.scheme(),
            raw,
            schemes
        )));
    }
    Ok(url)
}
