pub mod client;
pub mod twitter;
pub mod types;

pub use client::{ClientError, FeedClient, LOOKUP_BATCH};
pub use twitter::TwitterClient;
pub use types::{Status, StatusId, StreamItem, StreamOptions, User};
