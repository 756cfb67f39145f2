use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors that can occur when using the chat client.
#[derive(Error, Debug)]
pub enum ChatError {
    /// WebSocket protocol error (handshake failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// HTTP transport error from the REST client
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// REST endpoint answered with a non-success status
    #[error("{method} {url} failed with status {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error (malformed endpoint URL)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// No usable credentials were available
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Socket connect attempt did not complete in time
    #[error("Timeout error")]
    Timeout,

    /// Sending failed; the composed text is handed back so it is not lost
    #[error("Failed to send message: {reason}")]
    SendFailed { draft: String, reason: String },
}

impl ChatError {
    /// The draft carried by a failed send, if any.
    pub fn draft(&self) -> Option<&str> {
        match self {
            Self::SendFailed { draft, .. } => Some(draft),
            _ => None,
        }
    }
}

/// Convenience type alias for `Result<T, ChatError>`.
pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_failure_exposes_draft() {
        let err = ChatError::SendFailed {
            draft: "hello".to_string(),
            reason: "boom".to_string(),
        };
        assert_eq!(err.draft(), Some("hello"));
        assert_eq!(err.to_string(), "Failed to send message: boom");
        assert_eq!(ChatError::Timeout.draft(), None);
    }

    #[test]
    fn status_error_message() {
        let err = ChatError::Status {
            method: "GET",
            url: "http://localhost/chat/rooms/".to_string(),
            status: 503,
        };
        assert_eq!(
            err.to_string(),
            "GET http://localhost/chat/rooms/ failed with status 503"
        );
    }
}
