use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::types::{Status, StatusId, StreamItem, StreamOptions, User};

/// Errors that can occur while talking to the remote service.
#[derive(Debug)]
pub enum ClientError {
    /// Client misconfigured (missing token, bad URL).
    Config(String),
    /// Network-level failure (timeout, DNS, connection refused).
    Network(String),
    /// Service returned an error response (not found, permission denied, ...).
    Api { status: u16, message: String },
    /// Failed to parse the service's response.
    Parse(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Config(msg) => write!(f, "config error: {msg}"),
            ClientError::Network(msg) => write!(f, "network error: {msg}"),
            ClientError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            ClientError::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

/// Maximum ids accepted by a single `lookup_users` call.
pub const LOOKUP_BATCH: usize = 100;

/// Everything the console needs from the remote social-feed service.
///
/// Created once at startup and shared read-only between the command loop
/// and the stream worker.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Returns the name of the service backend.
    fn name(&self) -> &str;

    /// The authenticated account.
    async fn verify_credentials(&self) -> Result<User, ClientError>;

    /// Newest-first home timeline.
    async fn home_timeline(&self, count: u32) -> Result<Vec<Status>, ClientError>;

    /// Newest-first timeline of `screen_name` (without the leading `@`).
    async fn user_timeline(&self, screen_name: &str, count: u32) -> Result<Vec<Status>, ClientError>;

    async fn update_status(
        &self,
        text: &str,
        in_reply_to: Option<StatusId>,
    ) -> Result<Status, ClientError>;

    async fn retweet(&self, id: StatusId) -> Result<(), ClientError>;

    async fn show_status(&self, id: StatusId) -> Result<Status, ClientError>;

    async fn destroy_status(&self, id: StatusId) -> Result<(), ClientError>;

    /// Newest-first search results.
    async fn search(&self, query: &str) -> Result<Vec<Status>, ClientError>;

    /// Ids of accounts the authenticated user follows.
    async fn friend_ids(&self) -> Result<Vec<u64>, ClientError>;

    /// Ids of accounts following the authenticated user.
    async fn follower_ids(&self) -> Result<Vec<u64>, ClientError>;

    /// Resolves at most [`LOOKUP_BATCH`] account ids to users.
    async fn lookup_users(&self, ids: &[u64]) -> Result<Vec<User>, ClientError>;

    /// Opens the live stream. The returned stream never ends on its own;
    /// disconnects are reported as items and recovered from internally.
    async fn open_stream(
        &self,
        options: &StreamOptions,
    ) -> Result<BoxStream<'static, StreamItem>, ClientError>;
}
