//! # Console Adapter
//!
//! The interactive front end. Owns the two concurrent activities of a
//! running session:
//!
//! ```text
//!   stdin ──lines──▶ Supervisor::listen ──▶ command::dispatch ──┐
//!                                                                ├──▶ Console (one lock per block)
//!   FeedClient::open_stream ──▶ stream::run (tokio task) ───────┘
//! ```
//!
//! `q` or end of input aborts the stream task and waits for it to finish
//! before `run()` returns.

pub mod output;
pub mod palette;
pub mod render;
pub mod stream;

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use crate::console::output::Console;
use crate::core::command::{self, Flow};
use crate::core::config::{ConfigError, ResolvedConfig};
use crate::core::idmap::{IdMap, IdMapError};
use crate::core::state::{Session, Settings};
use crate::feed::{ClientError, FeedClient, StreamOptions, TwitterClient};

// ============================================================================
// Startup errors
// ============================================================================

#[derive(Debug)]
pub enum StartupError {
    Config(ConfigError),
    IdMap(IdMapError),
    /// The service rejected the credentials or could not be reached.
    Auth(ClientError),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::Config(e) => write!(f, "{e}"),
            StartupError::IdMap(e) => write!(f, "cannot open id map: {e}"),
            StartupError::Auth(e) => write!(f, "cannot verify credentials: {e}"),
        }
    }
}

impl std::error::Error for StartupError {}

impl From<ConfigError> for StartupError {
    fn from(e: ConfigError) -> Self {
        StartupError::Config(e)
    }
}

impl From<IdMapError> for StartupError {
    fn from(e: IdMapError) -> Self {
        StartupError::IdMap(e)
    }
}

impl From<ClientError> for StartupError {
    fn from(e: ClientError) -> Self {
        StartupError::Auth(e)
    }
}

// ============================================================================
// Supervisor
// ============================================================================

pub struct Supervisor {
    session: Session,
    stream: Option<JoinHandle<()>>,
}

impl Supervisor {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            stream: None,
        }
    }

    /// Spawns the live-stream worker. A second call is a no-op.
    pub fn start_stream(&mut self, options: StreamOptions) {
        if self.stream.is_some() {
            return;
        }
        self.stream = Some(stream::spawn(
            Arc::clone(&self.session.client),
            self.session.renderer.clone(),
            self.session.console.clone(),
            options,
        ));
    }

    /// Reads lines until `q` or end of input, dispatching each one to
    /// completion before reading the next. Shuts the stream down on exit.
    pub async fn listen<R>(mut self, input: R)
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if command::dispatch(&line, &mut self.session).await == Flow::Quit {
                        info!("Quit requested");
                        break;
                    }
                }
                Ok(None) => {
                    info!("End of input");
                    break;
                }
                Err(e) => {
                    warn!("Input read failed: {}", e);
                    break;
                }
            }
        }
        self.shutdown().await;
    }

    /// Aborts the stream worker and waits until it has stopped.
    pub async fn shutdown(&mut self) {
        let Some(handle) = self.stream.take() else {
            return;
        };
        handle.abort();
        match handle.await {
            Ok(()) => debug!("Stream worker finished"),
            Err(e) if e.is_cancelled() => debug!("Stream worker cancelled"),
            Err(e) => warn!("Stream worker failed: {}", e),
        }
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Connects, prints the banner, starts the stream, and serves stdin until
/// the operator quits.
pub async fn run(config: ResolvedConfig) -> Result<(), StartupError> {
    let token = config.require_token()?.to_string();
    let client: Arc<dyn FeedClient> = Arc::new(TwitterClient::new(
        token,
        Some(config.api_base_url.clone()),
        Some(config.stream_base_url.clone()),
    ));

    let ids = match &config.id_map_path {
        Some(path) => IdMap::open(path)?,
        None => {
            warn!("No home directory, ids will not survive this session");
            IdMap::in_memory()
        }
    };

    let me = client.verify_credentials().await?;
    info!("Signed in as @{}", me.screen_name);

    let console = Console::stdout();
    console.emit(&palette::banner());

    let session = Session::new(
        client,
        Arc::new(ids),
        console,
        &me.screen_name,
        Settings::from(&config),
    );
    session.reprint_prompt();

    let mut supervisor = Supervisor::new(session);
    supervisor.start_stream(config.stream.clone());
    supervisor
        .listen(BufReader::new(tokio::io::stdin()))
        .await;
    Ok(())
}
