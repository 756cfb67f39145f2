/// Socket event tags (magic strings layer)
pub mod socket_events {
    pub const READY: &str = "ready";
    pub const MESSAGE_CREATED: &str = "message.created";
    pub const MESSAGE_READ: &str = "message.read";
    pub const MESSAGE_BADGE: &str = "message.badge";
}

/// Frame field carrying the event tag
pub const EVENT_TAG_FIELD: &str = "type";

/// Query parameter carrying the access token on the socket URL
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Default number of messages requested per history page
pub const DEFAULT_HISTORY_PAGE_SIZE: usize = 50;

/// Default socket connect timeout (milliseconds)
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10000;

/// Default reconnect intervals (milliseconds)
pub const RECONNECT_INTERVALS: [u64; 4] = [1000, 2000, 5000, 10000];
pub const DEFAULT_RECONNECT_FALLBACK: u64 = 10000;

/// Maximum characters kept in a last-message preview
pub const PREVIEW_MAX_CHARS: usize = 80;

/// WebSocket close codes
pub const WS_CLOSE_NORMAL: u16 = 1000;
