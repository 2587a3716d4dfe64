//! Terminal colors.
//!
//! Thin wrappers over crossterm's `Stylize` so the rest of the console deals
//! in plain `String`s. `cycle_color` hashes its input into a fixed palette,
//! so the same author always gets the same color, within a run and across runs.

use crossterm::style::{Color, Stylize};

/// Foreground colors handed out by [`cycle_color`].
const CYCLE: [Color; 12] = [
    Color::Red,
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Magenta,
    Color::Cyan,
    Color::DarkRed,
    Color::DarkGreen,
    Color::DarkYellow,
    Color::DarkBlue,
    Color::DarkMagenta,
    Color::DarkCyan,
];

const BANNER: &[&str] = &[
    r" ____       _       _                       ",
    r"|  _ \ __ _(_)_ __ | |__   _____      __    ",
    r"| |_) / _` | | '_ \| '_ \ / _ \ \ /\ / /    ",
    r"|  _ < (_| | | | | | |_) | (_) \ V  V /     ",
    r"|_| \_\__,_|_|_| |_|_.__/ \___/ \_/\_/ Stream",
];

/// FNV-1a, stable across runs and platforms unlike `DefaultHasher`.
fn palette_index(text: &str) -> usize {
    let hash = text.bytes().fold(0xcbf2_9ce4_8422_2325u64, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
    });
    (hash % CYCLE.len() as u64) as usize
}

/// Colors `text` with the palette entry its hash selects.
pub fn cycle_color(text: &str) -> String {
    text.with(CYCLE[palette_index(text)]).to_string()
}

pub fn grey(text: &str) -> String {
    text.grey().to_string()
}

/// Used for the `RT` marker.
pub fn dim(text: &str) -> String {
    text.dark_grey().to_string()
}

pub fn link(text: &str) -> String {
    text.cyan().to_string()
}

/// Background highlight for search keyword hits.
pub fn highlight(text: &str) -> String {
    text.on_yellow().to_string()
}

pub fn error(text: &str) -> String {
    text.red().to_string()
}

pub fn success(text: &str) -> String {
    text.green().to_string()
}

/// `[@handle]: ` shown before every command.
pub fn decorated_prompt(handle: &str) -> String {
    format!("{}{}{}", grey("["), grey(&format!("@{handle}")), grey("]: "))
}

/// Startup logo, one palette color per row.
pub fn banner() -> String {
    BANNER
        .iter()
        .enumerate()
        .map(|(row, line)| line.with(CYCLE[row % CYCLE.len()]).to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
