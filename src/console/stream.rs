//! Background live-stream worker.
//!
//! Pulls items off the client's live stream and prints each one as it
//! arrives. Status messages are rendered like timeline entries; idle and
//! connection markers print as a single dim line. Runs until aborted.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use log::{debug, info, warn};
use tokio::task::JoinHandle;

use crate::console::output::Console;
use crate::console::palette;
use crate::console::render::Renderer;
use crate::feed::{FeedClient, Status, StreamItem, StreamOptions};

/// Wait before reopening a stream that failed to open or ended.
pub const REOPEN_BACKOFF: Duration = Duration::from_secs(5);

/// Marker line printed for a non-message item, if any.
pub fn marker(item: &StreamItem) -> Option<&'static str> {
    match item {
        StreamItem::Empty => Some("-- None --"),
        StreamItem::Timeout => Some("-- Timeout --"),
        StreamItem::HeartbeatTimeout => Some("-- Heartbeat Timeout --"),
        StreamItem::Hangup => Some("-- Hangup --"),
        StreamItem::Message(_) => None,
    }
}

/// Prints one stream item. Messages without a non-empty `text` (friends
/// lists, deletes, events) are skipped.
pub fn handle_item(item: StreamItem, renderer: &Renderer, console: &Console) {
    if let Some(line) = marker(&item) {
        console.emit(&palette::dim(line));
        return;
    }
    let StreamItem::Message(value) = item else {
        return;
    };

    let has_text = value
        .get("text")
        .and_then(|t| t.as_str())
        .is_some_and(|t| !t.is_empty());
    if !has_text {
        debug!("Ignoring stream message without text");
        return;
    }

    let status: Status = match serde_json::from_value(value) {
        Ok(status) => status,
        Err(e) => {
            warn!("Stream status did not decode: {}", e);
            return;
        }
    };
    match renderer.render(&status, None) {
        Ok(block) => console.emit(&block),
        Err(e) => warn!("Could not assign id to streamed status {}: {}", status.id, e),
    }
}

/// Loops forever: opens the stream, prints its items, reopens it when it
/// ends or fails to open.
pub async fn run(
    client: Arc<dyn FeedClient>,
    renderer: Renderer,
    console: Console,
    options: StreamOptions,
) {
    loop {
        let mut items = match client.open_stream(&options).await {
            Ok(items) => {
                info!("Live stream open on {}", client.name());
                items
            }
            Err(e) => {
                warn!("Live stream unavailable: {}", e);
                console.emit(&palette::dim("-- Stream unavailable, retrying --"));
                tokio::time::sleep(REOPEN_BACKOFF).await;
                continue;
            }
        };

        while let Some(item) = items.next().await {
            handle_item(item, &renderer, &console);
        }

        info!("Live stream ended, reopening");
        tokio::time::sleep(REOPEN_BACKOFF).await;
    }
}

/// Starts the worker on the runtime. Abort the handle to stop it.
pub fn spawn(
    client: Arc<dyn FeedClient>,
    renderer: Renderer,
    console: Console,
    options: StreamOptions,
) -> JoinHandle<()> {
    tokio::spawn(run(client, renderer, console, options))
}
