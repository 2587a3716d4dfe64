//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::console::output::Console;
use crate::core::idmap::IdMap;
use crate::core::state::{Session, Settings};
use crate::feed::{
    ClientError, FeedClient, Status, StatusId, StreamItem, StreamOptions, User,
};

/// An in-memory client that answers from canned data and records every call.
#[derive(Default)]
pub struct ScriptedClient {
    pub timeline: Vec<Status>,
    pub search_results: Vec<Status>,
    pub shown: Option<Status>,
    pub users: Vec<User>,
    pub friend_ids: Vec<u64>,
    pub follower_ids: Vec<u64>,
    /// Items the live stream yields before going quiet forever.
    pub stream_items: Mutex<Vec<StreamItem>>,
    /// Every call returns `ClientError::Network`.
    pub fail: bool,
    /// Every call panics.
    pub panics: bool,
    pub call_log: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn with_stream(items: Vec<StreamItem>) -> Self {
        Self {
            stream_items: Mutex::new(items),
            ..Default::default()
        }
    }

    /// Calls made so far, in order (`open_stream` excluded).
    pub fn calls(&self) -> Vec<String> {
        self.call_log.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<(), ClientError> {
        if self.panics {
            panic!("scripted panic in {call}");
        }
        self.call_log.lock().unwrap().push(call);
        if self.fail {
            return Err(ClientError::Network("scripted failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl FeedClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn verify_credentials(&self) -> Result<User, ClientError> {
        self.record("verify_credentials".to_string())?;
        Ok(user(1, "tester"))
    }

    async fn home_timeline(&self, count: u32) -> Result<Vec<Status>, ClientError> {
        self.record(format!("home_timeline {count}"))?;
        Ok(self.timeline.clone())
    }

    async fn user_timeline(&self, screen_name: &str, count: u32) -> Result<Vec<Status>, ClientError> {
        self.record(format!("user_timeline {screen_name} {count}"))?;
        Ok(self.timeline.clone())
    }

    async fn update_status(
        &self,
        text: &str,
        in_reply_to: Option<StatusId>,
    ) -> Result<Status, ClientError> {
        self.record(format!("update_status {text} {in_reply_to:?}"))?;
        Ok(status(1, "tester", text))
    }

    async fn retweet(&self, id: StatusId) -> Result<(), ClientError> {
        self.record(format!("retweet {id}"))
    }

    async fn show_status(&self, id: StatusId) -> Result<Status, ClientError> {
        self.record(format!("show_status {id}"))?;
        self.shown.clone().ok_or(ClientError::Api {
            status: 404,
            message: "No status found with that ID.".to_string(),
        })
    }

    async fn destroy_status(&self, id: StatusId) -> Result<(), ClientError> {
        self.record(format!("destroy_status {id}"))
    }

    async fn search(&self, query: &str) -> Result<Vec<Status>, ClientError> {
        self.record(format!("search {query}"))?;
        Ok(self.search_results.clone())
    }

    async fn friend_ids(&self) -> Result<Vec<u64>, ClientError> {
        self.record("friend_ids".to_string())?;
        Ok(self.friend_ids.clone())
    }

    async fn follower_ids(&self) -> Result<Vec<u64>, ClientError> {
        self.record("follower_ids".to_string())?;
        Ok(self.follower_ids.clone())
    }

    async fn lookup_users(&self, ids: &[u64]) -> Result<Vec<User>, ClientError> {
        self.record(format!("lookup_users {}", ids.len()))?;
        Ok(self
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn open_stream(
        &self,
        _options: &StreamOptions,
    ) -> Result<BoxStream<'static, StreamItem>, ClientError> {
        if self.fail {
            return Err(ClientError::Network("scripted failure".to_string()));
        }
        let items = std::mem::take(&mut *self.stream_items.lock().unwrap());
        Ok(futures::stream::iter(items)
            .chain(futures::stream::pending())
            .boxed())
    }
}

/// Cloneable in-memory terminal.
#[derive(Clone, Default)]
pub struct CaptureSink(Arc<Mutex<Vec<u8>>>);

impl CaptureSink {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CaptureSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Removes ANSI escape sequences (`ESC [ ... letter`).
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if chars.next() == Some('[') {
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

pub fn user(id: u64, screen_name: &str) -> User {
    let mut name = screen_name.to_string();
    if let Some(first) = name.get_mut(..1) {
        first.make_ascii_uppercase();
    }
    User {
        id,
        screen_name: screen_name.to_string(),
        name,
    }
}

pub fn status(id: StatusId, screen_name: &str, text: &str) -> Status {
    Status {
        id,
        text: text.to_string(),
        created_at: "Fri Mar 01 12:00:00 +0000 2024".to_string(),
        user: user(id, screen_name),
    }
}

/// Creates a Session over `client` with an in-memory id map and a captured terminal.
pub fn test_session(client: ScriptedClient) -> (Session, CaptureSink, Arc<ScriptedClient>) {
    let client = Arc::new(client);
    let sink = CaptureSink::default();
    let session = Session::new(
        client.clone(),
        Arc::new(IdMap::in_memory()),
        Console::new(Box::new(sink.clone())),
        "tester",
        Settings::default(),
    );
    (session, sink, client)
}
