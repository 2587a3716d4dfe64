//! # Session State
//!
//! Everything a running session shares, created once at startup and passed
//! by reference to the command dispatcher and the stream worker.
//!
//! ```text
//! Session
//! ├── client: Arc<dyn FeedClient>   // authenticated service client
//! ├── ids: Arc<IdMap>               // local ↔ remote id table
//! ├── renderer: Renderer            // status → colored block
//! ├── console: Console              // shared terminal sink
//! ├── prompt: String                // decorated `[@handle]: `
//! ├── settings: Settings            // timeline/search sizes
//! └── last_argument: String         // argument of the line being handled
//! ```

use std::sync::Arc;

use crate::console::output::Console;
use crate::console::palette;
use crate::console::render::Renderer;
use crate::core::config::{DEFAULT_HOME_TWEET_COUNT, DEFAULT_SEARCH_MAX_RECORD, ResolvedConfig};
use crate::core::idmap::{IdMap, IdMapError};
use crate::feed::{FeedClient, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Default count for `home` and `view`.
    pub home_tweet_count: u32,
    /// Number of results `s` shows.
    pub search_max_record: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home_tweet_count: DEFAULT_HOME_TWEET_COUNT,
            search_max_record: DEFAULT_SEARCH_MAX_RECORD,
        }
    }
}

impl From<&ResolvedConfig> for Settings {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            home_tweet_count: config.home_tweet_count,
            search_max_record: config.search_max_record,
        }
    }
}

pub struct Session {
    pub client: Arc<dyn FeedClient>,
    pub ids: Arc<IdMap>,
    pub renderer: Renderer,
    pub console: Console,
    pub prompt: String,
    pub settings: Settings,
    /// Overwritten by every input line, read by the handler it dispatches.
    pub last_argument: String,
}

impl Session {
    pub fn new(
        client: Arc<dyn FeedClient>,
        ids: Arc<IdMap>,
        console: Console,
        handle: &str,
        settings: Settings,
    ) -> Self {
        Self {
            client,
            renderer: Renderer::new(Arc::clone(&ids)),
            ids,
            console,
            prompt: palette::decorated_prompt(handle),
            settings,
            last_argument: String::new(),
        }
    }

    /// Renders one status and writes it as a single block.
    pub fn show(&self, status: &Status, keyword: Option<&str>) -> Result<(), IdMapError> {
        let block = self.renderer.render(status, keyword)?;
        self.console.emit(&block);
        Ok(())
    }

    pub fn reprint_prompt(&self) {
        self.console.prompt(&self.prompt);
    }
}
