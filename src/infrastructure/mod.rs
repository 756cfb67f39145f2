// Infrastructure module - REST transport and background task plumbing
pub mod http;
pub mod task_manager;
pub mod timer;

pub use http::{HttpChatApi, http_to_ws_endpoint};
pub use task_manager::TaskManager;
pub use timer::ReconnectTimer;
