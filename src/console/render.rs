//! Status → colored terminal block.
//!
//! ```text
//!   Alice Liddell @alice :
//!   [2024/03/01 12:00:00] [id=7]
//!   RT @bob check http://x.co
//! ```
//!
//! Body tokens are styled by the first matching rule in [`TOKEN_RULES`].

use std::sync::Arc;

use chrono::DateTime;

use crate::console::palette;
use crate::core::idmap::{IdMap, IdMapError};
use crate::feed::Status;

/// Service timestamp format, e.g. `Wed Aug 27 13:08:45 +0000 2008`.
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";
const DISPLAY_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// How a single body token is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStyle {
    Plain,
    /// The `RT` marker.
    Dim,
    /// `@mention`, color-cycled.
    Handle,
    /// `http://...`
    Link,
    /// Search keyword hit, background highlight.
    Keyword,
}

pub struct TokenRule {
    pub style: TokenStyle,
    pub matches: fn(token: &str, keyword: Option<&str>) -> bool,
}

/// Evaluated in order; the first match wins.
pub const TOKEN_RULES: &[TokenRule] = &[
    TokenRule {
        style: TokenStyle::Dim,
        matches: |token, _| token == "RT",
    },
    TokenRule {
        style: TokenStyle::Handle,
        matches: |token, _| token.starts_with('@'),
    },
    TokenRule {
        style: TokenStyle::Link,
        matches: |token, _| token.starts_with("http://"),
    },
    TokenRule {
        style: TokenStyle::Keyword,
        matches: |token, keyword| keyword.is_some_and(|k| keyword_matches(token, k)),
    },
];

/// Lowercased alphanumeric content: `"#AKB48!"` → `"akb48"`.
fn fold(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Compares tokens and keywords ignoring case and punctuation.
pub fn keyword_matches(token: &str, keyword: &str) -> bool {
    let keyword = fold(keyword);
    !keyword.is_empty() && fold(token) == keyword
}

pub fn classify_token(token: &str, keyword: Option<&str>) -> TokenStyle {
    TOKEN_RULES
        .iter()
        .find(|rule| (rule.matches)(token, keyword))
        .map_or(TokenStyle::Plain, |rule| rule.style)
}

pub fn style_token(token: &str, style: TokenStyle) -> String {
    match style {
        TokenStyle::Plain => token.to_string(),
        TokenStyle::Dim => palette::dim(token),
        TokenStyle::Handle => palette::cycle_color(token),
        TokenStyle::Link => palette::link(token),
        TokenStyle::Keyword => palette::highlight(token),
    }
}

/// Whitespace-tokenized, styled body joined with single spaces.
pub fn format_body(text: &str, keyword: Option<&str>) -> String {
    text.split_whitespace()
        .map(|token| style_token(token, classify_token(token, keyword)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `%Y/%m/%d %H:%M:%S`, or the raw stamp if it doesn't parse.
pub fn format_timestamp(created_at: &str) -> String {
    DateTime::parse_from_str(created_at, CREATED_AT_FORMAT)
        .map(|t| t.format(DISPLAY_FORMAT).to_string())
        .unwrap_or_else(|_| created_at.to_string())
}

#[derive(Clone)]
pub struct Renderer {
    ids: Arc<IdMap>,
}

impl Renderer {
    pub fn new(ids: Arc<IdMap>) -> Self {
        Self { ids }
    }

    /// Formats `status` as a four-line block (header, meta, body, blank),
    /// assigning it a local id on first sight.
    pub fn render(&self, status: &Status, keyword: Option<&str>) -> Result<String, IdMapError> {
        let local_id = self.ids.ensure_local_id(status.id)?;

        let user = format!(
            "{}{}",
            palette::cycle_color(&status.user.name),
            palette::grey(&format!(" @{} ", status.user.screen_name))
        );
        let meta = palette::grey(&format!(
            "[{}] [id={}]",
            format_timestamp(&status.created_at),
            local_id
        ));
        let body = format_body(&status.text, keyword);

        Ok(format!("  {user}:\n  {meta}\n  {body}\n"))
    }
}
