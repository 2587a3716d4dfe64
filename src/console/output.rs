//! Shared terminal sink.
//!
//! The command loop and the stream worker both print to the same terminal.
//! Each call here takes the lock once, writes a complete block, and
//! flushes, so a rendered status never interleaves with another.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use crossterm::QueueableCommand;
use crossterm::cursor::MoveTo;
use crossterm::terminal::{Clear, ClearType};
use log::warn;

#[derive(Clone)]
pub struct Console {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Console {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        self.sink.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Writes `block` followed by a newline as one unit.
    pub fn emit(&self, block: &str) {
        let mut sink = self.lock();
        let written = writeln!(sink, "{block}").and_then(|_| sink.flush());
        if let Err(e) = written {
            warn!("Terminal write failed: {}", e);
        }
    }

    /// Writes the prompt without a trailing newline.
    pub fn prompt(&self, prompt: &str) {
        let mut sink = self.lock();
        let written = write!(sink, "{prompt}").and_then(|_| sink.flush());
        if let Err(e) = written {
            warn!("Terminal write failed: {}", e);
        }
    }

    pub fn clear(&self) {
        let mut sink = self.lock();
        let written = sink
            .queue(Clear(ClearType::All))
            .and_then(|s| s.queue(MoveTo(0, 0)))
            .and_then(|s| s.flush());
        if let Err(e) = written {
            warn!("Terminal clear failed: {}", e);
        }
    }
}

/// Terminal width in columns, 80 when it can't be determined.
pub fn width() -> usize {
    crossterm::terminal::size()
        .map(|(cols, _)| cols as usize)
        .ok()
        .filter(|&cols| cols > 0)
        .unwrap_or(80)
}
