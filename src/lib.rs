//! # pharmachat
//!
//! Realtime chat client for the pharmacy workforce backend: room directory with
//! unread counters, per-room message logs, read tracking, and a single room
//! socket that follows the selected room.
//!
//! ## Example
//!
//! ```no_run
//! use pharmachat::{ChatSession, ChatSessionOptions, StaticCredentials};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = ChatSession::new(
//!         ChatSessionOptions {
//!             api_base: "https://api.example.com/api/".to_string(),
//!             ..Default::default()
//!         },
//!         Arc::new(StaticCredentials::new("access-token", 12)),
//!     )?;
//!
//!     session.initial_load(&[5]).await?;
//!     println!("{} unread", session.total_unread().await);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod directory;
pub mod infrastructure;
pub mod membership;
pub mod messaging;
pub mod read_state;
pub mod session;
pub mod store;
pub mod types;

pub use api::{ChatApi, Credentials, CredentialsProvider, HistoryQuery, StaticCredentials};
pub use directory::RoomDirectory;
pub use infrastructure::HttpChatApi;
pub use messaging::{BadgeEvent, SocketEvent, SocketEventKind};
pub use session::{
    ChatSession, ChatSessionBuilder, ChatSessionOptions, HistoryLoad, ReconnectPolicy,
    SocketState,
};
pub use store::MessageStore;
pub use types::{ChatError, Member, Message, Room, RoomKind};
