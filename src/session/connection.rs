use crate::types::Result;
use crate::types::constants::WS_CLOSE_NORMAL;
use futures::SinkExt;
use futures::stream::SplitSink;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;

/// Lifecycle of the room socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Closed,
    Connecting,
    Open,
}

/// Holds the write half of the live socket and publishes its state
pub struct ConnectionManager {
    writer: Mutex<Option<WsWriter>>,
    state_tx: watch::Sender<SocketState>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(SocketState::Closed);
        Self {
            writer: Mutex::new(None),
            state_tx,
        }
    }

    /// Sets the WebSocket write sink (called after successful connection)
    pub async fn set_writer(&self, writer: WsWriter) {
        *self.writer.lock().await = Some(writer);
    }

    pub fn state(&self) -> SocketState {
        *self.state_tx.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<SocketState> {
        self.state_tx.subscribe()
    }

    pub fn set_state(&self, new_state: SocketState) {
        self.state_tx.send_if_modified(|state| {
            if *state == new_state {
                return false;
            }
            tracing::debug!("Socket state {:?} -> {:?}", state, new_state);
            *state = new_state;
            true
        });
    }

    /// Close the socket. Closing an already-closed socket is a no-op.
    pub async fn close(&self) -> Result<()> {
        let writer = self.writer.lock().await.take();
        let result = match writer {
            Some(mut ws) => {
                let frame = CloseFrame {
                    code: CloseCode::from(WS_CLOSE_NORMAL),
                    reason: "room closed".into(),
                };
                let sent = ws.send(Message::Close(Some(frame))).await;
                let _ = ws.close().await;
                sent.map_err(Into::into)
            }
            None => Ok(()),
        };
        self.set_state(SocketState::Closed);
        result
    }

    /// Drop the writer after the server went away
    pub async fn clear_writer(&self) {
        self.writer.lock().await.take();
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn close_without_socket_is_noop() {
        let connection = ConnectionManager::new();
        let rx = connection.watch();
        connection.close().await.unwrap();
        connection.close().await.unwrap();
        assert_eq!(connection.state(), SocketState::Closed);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn state_changes_are_published_once() {
        let connection = ConnectionManager::new();
        let mut rx = connection.watch();

        connection.set_state(SocketState::Connecting);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SocketState::Connecting);

        connection.set_state(SocketState::Connecting);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(connection.state(), SocketState::Connecting);
    }
}
