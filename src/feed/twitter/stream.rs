//! Live stream reader.
//!
//! The endpoint sends newline-delimited JSON objects interleaved with blank
//! keep-alive lines. `StreamReader` turns that byte stream into
//! [`StreamItem`]s and never finishes: hangups and heartbeat timeouts are
//! reported as items and the next pull reconnects after
//! `StreamOptions::reconnect_backoff`.
//!
//! ```text
//! bytes ──► buffer ──► line ──┬── blank ──────► (keep-alive, skip)
//!                             ├── JSON ───────► Message
//!                             └── garbage ────► (log, skip)
//! no bytes within wait ───────┬── idle ≥ heartbeat ──► HeartbeatTimeout (+ drop connection)
//!                             ├── non-blocking ──────► Empty
//!                             └── otherwise ─────────► Timeout
//! EOF / read error ───────────────────────────────────► Hangup (+ drop connection)
//! ```

use std::time::{Duration, Instant};

use futures::Stream;
use log::{debug, info, warn};

use crate::feed::{ClientError, StreamItem, StreamOptions};

/// How often a non-blocking stream polls for data.
pub const NON_BLOCKING_POLL: Duration = Duration::from_secs(1);

/// Shortest wait for a chunk before an idle marker may be reported.
pub const MIN_READ_WAIT: Duration = Duration::from_millis(100);

/// Longest partial line kept while waiting for its newline.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Opens (and reopens) the streaming HTTP connection.
pub(crate) struct StreamConnector {
    client: reqwest::Client,
    url: String,
    token: String,
    track: Option<String>,
}

impl StreamConnector {
    pub(crate) fn new(
        client: reqwest::Client,
        url: String,
        token: String,
        track: Option<String>,
    ) -> Self {
        Self {
            client,
            url,
            token,
            track,
        }
    }

    pub(crate) async fn connect(&self) -> Result<reqwest::Response, ClientError> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(track) = self.track.as_deref() {
            query.push(("track", track));
        }
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(&self.token)
            .query(&query)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        super::check_status("user stream", response).await
    }
}

pub struct StreamReader {
    connector: StreamConnector,
    response: Option<reqwest::Response>,
    options: StreamOptions,
    buffer: Vec<u8>,
    last_data: Instant,
}

impl StreamReader {
    pub(crate) fn new(
        connector: StreamConnector,
        response: Option<reqwest::Response>,
        options: StreamOptions,
    ) -> Self {
        Self {
            connector,
            response,
            options,
            buffer: Vec::new(),
            last_data: Instant::now(),
        }
    }

    /// Endless stream of items pulled from this reader.
    pub fn into_stream(self) -> impl Stream<Item = StreamItem> + Send + 'static {
        futures::stream::unfold(self, |mut reader| async move {
            let item = reader.next_item().await;
            Some((item, reader))
        })
    }

    /// Pulls the next item, reconnecting first if the previous connection was dropped.
    ///
    /// Idle markers other than `HeartbeatTimeout` are only reported after
    /// actually waiting on the connection.
    pub async fn next_item(&mut self) -> StreamItem {
        loop {
            if let Some(line) = self.take_line() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<serde_json::Value>(line) {
                    Ok(value) => return StreamItem::Message(value),
                    Err(e) => {
                        warn!("Skipping unparsable stream line ({} bytes): {}", line.len(), e);
                        continue;
                    }
                }
            }

            if self.response.is_none() {
                tokio::time::sleep(self.options.reconnect_backoff).await;
                match self.connector.connect().await {
                    Ok(response) => {
                        info!("Stream reconnected");
                        self.response = Some(response);
                        self.last_data = Instant::now();
                    }
                    Err(e) => {
                        warn!("Stream reconnect failed: {}", e);
                        return StreamItem::Hangup;
                    }
                }
            }

            let idle = self.last_data.elapsed();
            if idle >= self.options.heartbeat_timeout {
                return self.idle_marker();
            }
            let wait = next_wait(idle, &self.options);
            let Some(response) = self.response.as_mut() else {
                continue;
            };

            let read = tokio::time::timeout(wait, response.chunk()).await;
            match read {
                Ok(Ok(Some(bytes))) => {
                    debug!("Stream chunk: {} bytes", bytes.len());
                    self.last_data = Instant::now();
                    self.append(&bytes);
                }
                Ok(Ok(None)) => {
                    info!("Stream closed by server");
                    self.disconnect();
                    return StreamItem::Hangup;
                }
                Ok(Err(e)) => {
                    warn!("Stream read failed: {}", e);
                    self.disconnect();
                    return StreamItem::Hangup;
                }
                Err(_) => return self.idle_marker(),
            }
        }
    }

    /// Buffers `bytes`, discarding a partial line that outgrew `MAX_LINE_BYTES`.
    fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() > MAX_LINE_BYTES && !self.buffer.contains(&b'\n') {
            warn!(
                "Dropping {} bytes of stream data without a line break",
                self.buffer.len()
            );
            self.buffer.clear();
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    fn idle_marker(&mut self) -> StreamItem {
        let item = idle_item(self.last_data.elapsed(), &self.options);
        if item == StreamItem::HeartbeatTimeout {
            warn!(
                "No stream data for {:?}, dropping connection",
                self.options.heartbeat_timeout
            );
            self.disconnect();
        }
        item
    }

    fn disconnect(&mut self) {
        self.response = None;
        self.buffer.clear();
    }
}

/// How long to wait for the next chunk given how long the connection has been idle.
fn next_wait(idle: Duration, options: &StreamOptions) -> Duration {
    let base = if options.block {
        options.timeout.unwrap_or(options.heartbeat_timeout)
    } else {
        NON_BLOCKING_POLL
    };
    base.max(MIN_READ_WAIT)
        .min(options.heartbeat_timeout.saturating_sub(idle))
}

/// Marker to report when a wait for data elapsed.
fn idle_item(idle: Duration, options: &StreamOptions) -> StreamItem {
    if idle >= options.heartbeat_timeout {
        StreamItem::HeartbeatTimeout
    } else if !options.block {
        StreamItem::Empty
    } else {
        StreamItem::Timeout
    }
}
