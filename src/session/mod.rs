// Module declarations
mod builder;
mod connection;
mod controller;
mod session;
mod state;

// Public API exports
pub use builder::{ChatSessionBuilder, ChatSessionOptions, ReconnectPolicy};
pub use connection::{ConnectionManager, SocketState};
pub use controller::SocketController;
pub use session::{ChatSession, HistoryLoad};
pub use state::{Selection, SessionState};
