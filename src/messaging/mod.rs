// Messaging module - Socket frame parsing and event routing
pub mod event;
pub mod router;

pub use event::{BadgeEvent, SocketEvent, SocketEventKind};
pub use router::EventRouter;
