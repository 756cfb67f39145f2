use super::connection::{ConnectionManager, SocketState, WsStream};
use super::{ReconnectPolicy, Selection, SessionState};
use crate::api::CredentialsProvider;
use crate::infrastructure::{ReconnectTimer, TaskManager};
use crate::messaging::EventRouter;
use crate::types::constants::TOKEN_QUERY_PARAM;
use crate::types::{ChatError, Result, RoomId};
use futures::stream::{SplitStream, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Owns the single room socket.
///
/// Every `open` first tears down the previous connection and waits for its
/// task to finish, so at most one socket is ever live. The selection is
/// switched under the same lock, so the live socket always belongs to the
/// most recently selected room.
pub struct SocketController {
    state: Arc<SessionState>,
    ws_base: Url,
    credentials: Arc<dyn CredentialsProvider>,
    connect_timeout: Option<Duration>,
    reconnect: ReconnectPolicy,
    router: Arc<EventRouter>,
    connection: Arc<ConnectionManager>,
    /// Also serializes open/close
    tasks: Mutex<TaskManager>,
    generation: Arc<AtomicU64>,
    scope: RwLock<Option<RoomId>>,
}

impl SocketController {
    pub fn new(
        state: Arc<SessionState>,
        ws_base: Url,
        credentials: Arc<dyn CredentialsProvider>,
        connect_timeout: Option<Duration>,
        reconnect: ReconnectPolicy,
        router: Arc<EventRouter>,
    ) -> Self {
        Self {
            state,
            ws_base,
            credentials,
            connect_timeout,
            reconnect,
            router,
            connection: Arc::new(ConnectionManager::new()),
            tasks: Mutex::new(TaskManager::new()),
            generation: Arc::new(AtomicU64::new(0)),
            scope: RwLock::new(None),
        }
    }

    /// Socket URL for a room, carrying the current access token.
    pub fn socket_url(&self, room: RoomId) -> Result<Url> {
        let creds = self
            .credentials
            .credentials()
            .ok_or_else(|| ChatError::Auth("no access token available".to_string()))?;

        let mut base = self.ws_base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let mut url = base.join(&format!("ws/chat/rooms/{}/", room))?;
        url.query_pairs_mut()
            .append_pair(TOKEN_QUERY_PARAM, &creds.access_token);
        Ok(url)
    }

    /// Select `room`, close any current socket, then start connecting.
    ///
    /// Returns the new selection stamp once the connection task is started;
    /// follow [`watch_state`](Self::watch_state) for `Open`.
    pub async fn open(&self, room: RoomId) -> Result<Selection> {
        let mut tasks = self.tasks.lock().await;
        let selection = self.state.select(Some(room)).await;
        self.teardown(&mut tasks).await;

        let url = self.socket_url(room)?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.scope.write().await = Some(room);
        self.connection.set_state(SocketState::Connecting);

        let runner = ConnectionRunner {
            room,
            url,
            generation,
            current: Arc::clone(&self.generation),
            connect_timeout: self.connect_timeout,
            reconnect: self.reconnect.clone(),
            connection: Arc::clone(&self.connection),
            router: Arc::clone(&self.router),
        };
        tasks.spawn(runner.run());
        Ok(selection)
    }

    /// Clear the selection and close the socket, if any. Idempotent.
    pub async fn close(&self) {
        let mut tasks = self.tasks.lock().await;
        self.state.select(None).await;
        self.teardown(&mut tasks).await;
    }

    async fn teardown(&self, tasks: &mut TaskManager) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let live = tasks.live();
        if live > 0 {
            tracing::debug!("Stopping {} socket task(s)", live);
        }
        tasks.shutdown().await;
        if let Some(room) = self.scope.write().await.take() {
            tracing::info!("Closing socket for room {}", room);
        }
        if let Err(e) = self.connection.close().await {
            tracing::debug!("Error while closing socket: {}", e);
        }
    }

    pub fn state(&self) -> SocketState {
        self.connection.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<SocketState> {
        self.connection.watch()
    }

    /// Room the socket is scoped to, while one is open or connecting
    pub async fn scope(&self) -> Option<RoomId> {
        if self.state() == SocketState::Closed {
            return None;
        }
        *self.scope.read().await
    }
}

/// Background task driving one room's socket: connect, pump frames, and
/// reconnect according to policy.
struct ConnectionRunner {
    room: RoomId,
    url: Url,
    generation: u64,
    current: Arc<AtomicU64>,
    connect_timeout: Option<Duration>,
    reconnect: ReconnectPolicy,
    connection: Arc<ConnectionManager>,
    router: Arc<EventRouter>,
}

impl ConnectionRunner {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    async fn run(self) {
        let mut timer = match &self.reconnect {
            ReconnectPolicy::Never => None,
            ReconnectPolicy::Backoff(steps) => Some(ReconnectTimer::new(steps.clone())),
        };

        loop {
            if !self.is_current() {
                return;
            }
            self.connection.set_state(SocketState::Connecting);

            match self.connect().await {
                Ok(stream) => {
                    if let Some(timer) = timer.as_mut() {
                        timer.reset();
                    }
                    self.serve(stream).await;
                }
                Err(e) => {
                    tracing::error!("Socket connect for room {} failed: {}", self.room, e);
                    self.connection.set_state(SocketState::Closed);
                }
            }

            match timer.as_mut() {
                Some(timer) if self.is_current() => {
                    timer.wait().await;
                    tracing::info!(
                        "Reconnecting socket for room {} (attempt {})",
                        self.room,
                        timer.attempts()
                    );
                }
                _ => return,
            }
        }
    }

    async fn connect(&self) -> Result<WsStream> {
        let mut redacted = self.url.clone();
        redacted.set_query(None);
        tracing::info!("Connecting to {}", redacted);

        let handshake = connect_async(self.url.as_str());
        let (stream, _) = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, handshake)
                .await
                .map_err(|_| ChatError::Timeout)??,
            None => handshake.await?,
        };
        Ok(stream)
    }

    async fn serve(&self, stream: WsStream) {
        let (write_half, read_half) = stream.split();
        self.connection.set_writer(write_half).await;
        self.connection.set_state(SocketState::Open);
        tracing::info!("Socket open for room {}", self.room);

        // the read confirmation is not tied to this socket's lifetime
        let router = Arc::clone(&self.router);
        let room = self.room;
        tokio::spawn(async move {
            router.on_open(room).await;
        });

        self.pump(read_half).await;

        self.connection.clear_writer().await;
        self.connection.set_state(SocketState::Closed);
    }

    async fn pump(&self, mut read_half: SplitStream<WsStream>) {
        while let Some(frame) = read_half.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    tracing::debug!("Received frame on room {}: {}", self.room, text.as_str());
                    self.router.route_text(self.room, text.as_str()).await;
                }
                Ok(Message::Close(frame)) => {
                    match frame {
                        Some(close_frame) => tracing::warn!(
                            "Server closed socket for room {}: code={:?}, reason='{}'",
                            self.room,
                            close_frame.code,
                            close_frame.reason.as_str()
                        ),
                        None => tracing::warn!(
                            "Server closed socket for room {} without close frame",
                            self.room
                        ),
                    }
                    break;
                }
                Ok(Message::Binary(data)) => {
                    tracing::warn!("Ignoring binary frame ({} bytes)", data.len());
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Socket read error on room {}: {}", self.room, e);
                    break;
                }
            }
        }
        tracing::info!("Socket for room {} finished", self.room);
    }
}
