use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The service's native status identifier.
pub type StatusId = u64;

/// Account that authored a status.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    #[serde(default)]
    pub id: u64,
    pub screen_name: String,
    pub name: String,
}

/// A single post as returned by timelines, search, and the live stream.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub id: StatusId,
    pub text: String,
    /// Service timestamp, e.g. `Wed Aug 27 13:08:45 +0000 2008`.
    pub created_at: String,
    pub user: User,
}

/// One unit yielded by the live stream.
///
/// Only `Message` carries data; the rest are liveness markers that the
/// consumer reports and then keeps reading past.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// Non-blocking poll returned nothing.
    Empty,
    /// No data arrived within the soft timeout.
    Timeout,
    /// Not even keep-alives arrived within the heartbeat window.
    HeartbeatTimeout,
    /// The server closed the connection (or reading from it failed).
    Hangup,
    /// A decoded stream object. Statuses, deletes, friend lists, etc.
    Message(serde_json::Value),
}

pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Caller-supplied knobs for the live stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOptions {
    /// Soft timeout: report `Timeout` after this long without data.
    pub timeout: Option<Duration>,
    /// Report `HeartbeatTimeout` and reconnect after this long without any bytes.
    pub heartbeat_timeout: Duration,
    /// When false, poll and report `Empty` instead of waiting for data.
    pub block: bool,
    /// Optional `track` keyword filter.
    pub track: Option<String>,
    /// Pause before every reconnect after a hangup or heartbeat drop.
    pub reconnect_backoff: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            block: true,
            track: None,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
        }
    }
}
