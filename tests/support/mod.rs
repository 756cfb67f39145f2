#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::{SinkExt, StreamExt};
use pharmachat::api::{ChatApi, HistoryQuery};
use pharmachat::types::{
    ChatError, Member, MembershipId, Message, MessageId, PharmacyId, Result, Room, RoomId,
    RoomKind, UserId,
};
use pharmachat::{ChatSession, ChatSessionOptions, StaticCredentials};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

pub const MY_USER: UserId = 12;
pub const MY_MEMBERSHIP: MembershipId = 7;

/// Lets a test hold a fake call open until it says so
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

impl Gate {
    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

#[derive(Default)]
pub struct FakeBackend {
    pub rooms: Vec<Room>,
    /// Oldest first
    pub messages: HashMap<RoomId, Vec<Message>>,
    pub group_rooms: HashMap<PharmacyId, Room>,
    pub members: HashMap<PharmacyId, Vec<Member>>,
    pub next_room_id: RoomId,
    pub posted: Vec<(RoomId, String)>,
    pub mark_read_calls: Vec<RoomId>,
    pub fetch_calls: Vec<(RoomId, HistoryQuery)>,
    pub group_calls: usize,
    pub fail_list_rooms: bool,
    pub fail_post: bool,
    pub fail_mark_read: bool,
}

/// In-memory [`ChatApi`]
#[derive(Default)]
pub struct FakeChatApi {
    pub backend: Mutex<FakeBackend>,
    history_gates: Mutex<HashMap<RoomId, Arc<Gate>>>,
    mark_read_gate: Mutex<Option<Arc<Gate>>>,
}

impl FakeChatApi {
    pub fn new() -> Arc<Self> {
        let api = Self::default();
        api.backend.lock().unwrap().next_room_id = 1000;
        Arc::new(api)
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeBackend) -> R) -> R {
        f(&mut self.backend.lock().unwrap())
    }

    pub fn gate_history(&self, room: RoomId) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.history_gates
            .lock()
            .unwrap()
            .insert(room, Arc::clone(&gate));
        gate
    }

    pub fn gate_mark_read(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.mark_read_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    fn unavailable(what: &str) -> ChatError {
        ChatError::Status {
            method: "FAKE",
            url: what.to_string(),
            status: 503,
        }
    }
}

#[async_trait]
impl ChatApi for FakeChatApi {
    async fn list_rooms(&self) -> Result<Vec<Room>> {
        self.with(|b| {
            if b.fail_list_rooms {
                Err(Self::unavailable("rooms"))
            } else {
                Ok(b.rooms.clone())
            }
        })
    }

    async fn fetch_messages(&self, room: RoomId, query: HistoryQuery) -> Result<Vec<Message>> {
        let gate = self.history_gates.lock().unwrap().get(&room).cloned();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        self.with(|b| {
            b.fetch_calls.push((room, query));
            let all = b.messages.get(&room).cloned().unwrap_or_default();
            let end = match query.before {
                Some(before) => all.iter().position(|m| m.id == before).unwrap_or(0),
                None => all.len(),
            };
            let start = end.saturating_sub(query.limit);
            Ok(all[start..end].iter().rev().cloned().collect())
        })
    }

    async fn post_message(&self, room: RoomId, body: &str) -> Result<()> {
        self.with(|b| {
            if b.fail_post {
                return Err(Self::unavailable("post"));
            }
            b.posted.push((room, body.to_string()));
            Ok(())
        })
    }

    async fn mark_read(&self, room: RoomId) -> Result<()> {
        let gate = self.mark_read_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        self.with(|b| {
            b.mark_read_calls.push(room);
            if b.fail_mark_read {
                Err(Self::unavailable("read"))
            } else {
                Ok(())
            }
        })
    }

    async fn get_or_create_group_room(&self, pharmacy: PharmacyId) -> Result<Room> {
        self.with(|b| {
            b.group_calls += 1;
            if let Some(room) = b.group_rooms.get(&pharmacy) {
                return Ok(room.clone());
            }
            let id = b.next_room_id;
            b.next_room_id += 1;
            let room = Room {
                kind: RoomKind::Group,
                pharmacy: Some(pharmacy),
                title: format!("Pharmacy {}", pharmacy),
                ..Room::placeholder(id)
            };
            b.group_rooms.insert(pharmacy, room.clone());
            Ok(room)
        })
    }

    async fn start_direct_message(&self, pharmacy: PharmacyId, partner: UserId) -> Result<Room> {
        self.with(|b| {
            let members = b.members.get(&pharmacy).cloned().unwrap_or_default();
            let membership_of = |user: UserId| {
                members
                    .iter()
                    .find(|m| m.user_id == user)
                    .map(|m| m.membership_id)
            };
            let participants: Vec<MembershipId> = [membership_of(MY_USER), membership_of(partner)]
                .into_iter()
                .flatten()
                .collect();

            let id = b.next_room_id;
            b.next_room_id += 1;
            Ok(Room {
                kind: RoomKind::Direct,
                pharmacy: Some(pharmacy),
                participant_ids: participants,
                ..Room::placeholder(id)
            })
        })
    }

    async fn list_members(&self, pharmacy: PharmacyId) -> Result<Vec<Member>> {
        self.with(|b| Ok(b.members.get(&pharmacy).cloned().unwrap_or_default()))
    }
}

pub fn at(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_767_225_600 + secs, 0).unwrap()
}

pub fn message(id: MessageId, sender: MembershipId, body: &str, secs: i64) -> Message {
    Message {
        id,
        conversation: None,
        sender,
        body: body.to_string(),
        created_at: at(secs),
    }
}

pub fn room(id: RoomId, kind: RoomKind, pharmacy: PharmacyId, unread: u32) -> Room {
    Room {
        kind,
        pharmacy: Some(pharmacy),
        title: format!("Room {}", id),
        unread_count: unread,
        ..Room::placeholder(id)
    }
}

pub fn member(membership_id: MembershipId, user_id: UserId, name: &str) -> Member {
    Member {
        membership_id,
        user_id,
        name: name.to_string(),
        email: String::new(),
        avatar: None,
    }
}

const CLOSE_SENTINEL: &str = "__close__";

/// Local WebSocket server standing in for the backend's room sockets
pub struct FakeSocketServer {
    pub addr: SocketAddr,
    live: Arc<AtomicUsize>,
    accepted: Arc<AtomicUsize>,
    paths: Arc<Mutex<Vec<String>>>,
    frames: broadcast::Sender<String>,
    handle: JoinHandle<()>,
}

impl FakeSocketServer {
    /// Starts a server that greets every connection with a `ready` frame
    /// binding `ready_membership`.
    pub async fn start(ready_membership: Option<MembershipId>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let live = Arc::new(AtomicUsize::new(0));
        let accepted = Arc::new(AtomicUsize::new(0));
        let paths = Arc::new(Mutex::new(Vec::new()));
        let (frames, _) = broadcast::channel::<String>(64);

        let handle = {
            let live = Arc::clone(&live);
            let accepted = Arc::clone(&accepted);
            let paths = Arc::clone(&paths);
            let frames = frames.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let live = Arc::clone(&live);
                    let accepted = Arc::clone(&accepted);
                    let paths = Arc::clone(&paths);
                    let mut rx = frames.subscribe();
                    tokio::spawn(async move {
                        let seen = Arc::new(Mutex::new(String::new()));
                        let slot = Arc::clone(&seen);
                        let callback = move |req: &Request,
                                             resp: Response|
                              -> std::result::Result<Response, ErrorResponse> {
                            *slot.lock().unwrap() = req.uri().to_string();
                            Ok(resp)
                        };
                        let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await
                        else {
                            return;
                        };
                        let path = seen.lock().unwrap().clone();
                        paths.lock().unwrap().push(path);
                        accepted.fetch_add(1, Ordering::SeqCst);
                        live.fetch_add(1, Ordering::SeqCst);

                        if let Some(id) = ready_membership {
                            let ready = serde_json::json!({"type": "ready", "membership_id": id});
                            let _ = ws.send(WsMessage::Text(ready.to_string().into())).await;
                        }

                        loop {
                            tokio::select! {
                                incoming = ws.next() => match incoming {
                                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                                    Some(Ok(_)) => {}
                                },
                                frame = rx.recv() => match frame {
                                    Ok(frame) if frame == CLOSE_SENTINEL => {
                                        let _ = ws.close(None).await;
                                        break;
                                    }
                                    Ok(frame) => {
                                        if ws.send(WsMessage::Text(frame.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                                    Err(broadcast::error::RecvError::Closed) => break,
                                },
                            }
                        }
                        live.fetch_sub(1, Ordering::SeqCst);
                    });
                }
            })
        };

        Self {
            addr,
            live,
            accepted,
            paths,
            frames,
            handle,
        }
    }

    pub fn ws_base(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Send a frame to every connected socket
    pub fn push(&self, frame: serde_json::Value) {
        let _ = self.frames.send(frame.to_string());
    }

    /// Close every connection from the server side
    pub fn drop_all(&self) {
        let _ = self.frames.send(CLOSE_SENTINEL.to_string());
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

impl Drop for FakeSocketServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn session(
    api: &Arc<FakeChatApi>,
    server: &FakeSocketServer,
    configure: impl FnOnce(&mut ChatSessionOptions),
) -> ChatSession {
    let mut options = ChatSessionOptions {
        api_base: "http://127.0.0.1:9/api/".to_string(),
        ws_base: Some(server.ws_base()),
        connect_timeout: Some(Duration::from_secs(2)),
        ..Default::default()
    };
    configure(&mut options);

    ChatSession::builder(options)
        .credentials(Arc::new(StaticCredentials::new("secret", MY_USER)))
        .api(Arc::clone(api) as Arc<dyn ChatApi>)
        .build()
        .unwrap()
}

/// Poll `check` until it holds, failing the test after two seconds.
pub async fn eventually(mut check: impl AsyncFnMut() -> bool) {
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}
