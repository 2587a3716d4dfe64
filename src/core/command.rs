//! # Commands
//!
//! Every input line becomes a `Command` (its first word) plus an argument
//! string (the rest, whitespace-collapsed). `dispatch()` runs the handler to
//! completion before the next line is read, turns every failure into a
//! short red message, and reprints the prompt.
//!
//! ```text
//! "rep 12 nice!"  →  Command::Reply + "12 nice!"  →  execute()  →  Flow
//! ```
//!
//! Handlers never end the process. Only `q` returns `Flow::Quit`.

use std::fmt;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use log::{debug, error, info, warn};

use crate::console::output;
use crate::console::palette;
use crate::core::idmap::LocalId;
use crate::core::state::Session;
use crate::feed::{LOOKUP_BATCH, Status, StatusId};

pub const USAGE: &str = r#"
    Hi boss! I'm ready to serve you right now!
    ----------------------------------------------------
    "home" will show your timeline. "home 7" will print 7 tweet.
    "view @bob" will show your friend @bob's home.
    "t oops" will tweet "oops" immediately.
    "rt 12345" will retweet to tweet with id "12345".
    "rep 12345 oops" will reply "oops" to tweet with id "12345".
    "del 12345" will delete tweet with id "12345".
    "s #AKB48" will search for "AKB48" and return 5 newest tweet.
    "fr" will list out your following people.
    "fl" will list out your followers.
    "h" will print this help once again.
    "c" will clear the terminal.
    "q" will exit.
    ----------------------------------------------------
    Have fun and hang tight!
"#;

const VIEW_USAGE: &str = "A name should begin with a '@'";
const SEARCH_USAGE: &str = "A keyword should be a hashtag (like '#AKB48')";

const HOME_FAILED: &str = "Sorry I can't fetch your timeline.";
const VIEW_FAILED: &str = "Sorry I can't fetch that timeline.";
const TWEET_FAILED: &str = "Sorry I can't tweet for you.";
const RETWEET_FAILED: &str = "Sorry I can't retweet for you.";
const REPLY_FAILED: &str = "Sorry I can't understand.";
const DELETE_FAILED: &str = "Sorry I can't delete this tweet for you.";
const SEARCH_FAILED: &str = "Sorry I can't search for you.";
const LIST_FAILED: &str = "Sorry I can't list those people.";
const INTERNAL_FAILED: &str = "Sorry, something went wrong.";

const DELETE_DONE: &str = "Okay it's gone.";

/// What the command loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug)]
pub enum CommandError {
    /// Argument rejected before any remote call.
    Usage(&'static str),
    /// Remote call or id lookup failed. Only `message` is shown; `cause` is logged.
    Failed {
        message: &'static str,
        cause: String,
    },
}

impl CommandError {
    fn failed(message: &'static str, cause: impl fmt::Display) -> Self {
        CommandError::Failed {
            message,
            cause: cause.to_string(),
        }
    }

    /// Text shown to the operator.
    pub fn user_message(&self) -> &'static str {
        match self {
            CommandError::Usage(msg) => msg,
            CommandError::Failed { message, .. } => message,
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Usage(msg) => write!(f, "usage: {msg}"),
            CommandError::Failed { message, cause } => write!(f, "{message} ({cause})"),
        }
    }
}

impl std::error::Error for CommandError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Home,
    View,
    Tweet,
    Retweet,
    Reply,
    Delete,
    Search,
    Friends,
    Followers,
    Help,
    Clear,
    Quit,
    /// Unknown or empty word: just reprint the prompt.
    Unknown,
}

impl Command {
    pub fn parse(word: &str) -> Self {
        match word {
            "home" => Command::Home,
            "view" => Command::View,
            "t" => Command::Tweet,
            "rt" => Command::Retweet,
            "rep" => Command::Reply,
            "del" => Command::Delete,
            "s" => Command::Search,
            "fr" => Command::Friends,
            "fl" => Command::Followers,
            "h" => Command::Help,
            "c" => Command::Clear,
            "q" => Command::Quit,
            _ => Command::Unknown,
        }
    }

    pub fn word(self) -> &'static str {
        match self {
            Command::Home => "home",
            Command::View => "view",
            Command::Tweet => "t",
            Command::Retweet => "rt",
            Command::Reply => "rep",
            Command::Delete => "del",
            Command::Search => "s",
            Command::Friends => "fr",
            Command::Followers => "fl",
            Command::Help => "h",
            Command::Clear => "c",
            Command::Quit => "q",
            Command::Unknown => "",
        }
    }

    pub async fn execute(self, argument: &str, session: &Session) -> Result<Flow, CommandError> {
        match self {
            Command::Home => home(argument, session).await,
            Command::View => view(argument, session).await,
            Command::Tweet => tweet(argument, session).await,
            Command::Retweet => retweet(argument, session).await,
            Command::Reply => reply(argument, session).await,
            Command::Delete => delete(argument, session).await,
            Command::Search => search(argument, session).await,
            Command::Friends => {
                let ids = session
                    .client
                    .friend_ids()
                    .await
                    .map_err(|e| CommandError::failed(LIST_FAILED, e))?;
                list_people(&ids, session).await
            }
            Command::Followers => {
                let ids = session
                    .client
                    .follower_ids()
                    .await
                    .map_err(|e| CommandError::failed(LIST_FAILED, e))?;
                list_people(&ids, session).await
            }
            Command::Help => {
                session.console.emit(USAGE);
                Ok(Flow::Continue)
            }
            Command::Clear => {
                session.console.clear();
                Ok(Flow::Continue)
            }
            Command::Quit => Ok(Flow::Quit),
            Command::Unknown => Ok(Flow::Continue),
        }
    }
}

/// Splits a line into its command word and whitespace-collapsed argument.
pub fn split_line(line: &str) -> (&str, String) {
    let mut tokens = line.split_whitespace();
    let word = tokens.next().unwrap_or("");
    let argument = tokens.collect::<Vec<_>>().join(" ");
    (word, argument)
}

/// Runs one input line. Errors and handler panics are reported on the
/// terminal, never propagated.
pub async fn dispatch(line: &str, session: &mut Session) -> Flow {
    let (word, argument) = split_line(line);
    let command = Command::parse(word);
    session.last_argument = argument;
    debug!("Dispatching {:?} with {:?}", command, session.last_argument);

    let session = &*session;
    let result = AssertUnwindSafe(command.execute(&session.last_argument, session))
        .catch_unwind()
        .await;

    let flow = match result {
        Ok(Ok(flow)) => flow,
        Ok(Err(e)) => {
            warn!("'{}' failed: {}", command.word(), e);
            session.console.emit(&palette::error(e.user_message()));
            Flow::Continue
        }
        Err(_) => {
            error!("'{}' handler panicked", command.word());
            session.console.emit(&palette::error(INTERNAL_FAILED));
            Flow::Continue
        }
    };

    if flow == Flow::Continue {
        session.reprint_prompt();
    }
    flow
}

// ============================================================================
// Handlers
// ============================================================================

fn parse_count(token: Option<&str>, default: u32) -> u32 {
    token
        .and_then(|t| t.parse::<u32>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(default)
}

/// Maps an operator-typed local id to the status it stands for.
fn resolve(token: Option<&str>, session: &Session) -> Result<StatusId, String> {
    let token = token.ok_or("missing id")?;
    let local_id: LocalId = token
        .parse()
        .map_err(|_| format!("'{token}' is not an id"))?;
    session
        .ids
        .resolve_remote_id(local_id)
        .map_err(|e| e.to_string())
}

/// Timelines arrive newest-first; the terminal reads best oldest-first.
fn show_oldest_first(
    statuses: &[Status],
    session: &Session,
    failure: &'static str,
) -> Result<(), CommandError> {
    for status in statuses.iter().rev() {
        session
            .show(status, None)
            .map_err(|e| CommandError::failed(failure, e))?;
    }
    Ok(())
}

async fn home(argument: &str, session: &Session) -> Result<Flow, CommandError> {
    let count = parse_count(Some(argument), session.settings.home_tweet_count);
    let timeline = session
        .client
        .home_timeline(count)
        .await
        .map_err(|e| CommandError::failed(HOME_FAILED, e))?;
    show_oldest_first(&timeline, session, HOME_FAILED)?;
    Ok(Flow::Continue)
}

async fn view(argument: &str, session: &Session) -> Result<Flow, CommandError> {
    let mut tokens = argument.split_whitespace();
    let screen_name = match tokens.next().and_then(|t| t.strip_prefix('@')) {
        Some(name) if !name.is_empty() => name,
        _ => return Err(CommandError::Usage(VIEW_USAGE)),
    };
    let count = parse_count(tokens.next(), session.settings.home_tweet_count);

    let timeline = session
        .client
        .user_timeline(screen_name, count)
        .await
        .map_err(|e| CommandError::failed(VIEW_FAILED, e))?;
    show_oldest_first(&timeline, session, VIEW_FAILED)?;
    Ok(Flow::Continue)
}

async fn tweet(argument: &str, session: &Session) -> Result<Flow, CommandError> {
    if argument.is_empty() {
        return Err(CommandError::failed(TWEET_FAILED, "empty status"));
    }
    let posted = session
        .client
        .update_status(argument, None)
        .await
        .map_err(|e| CommandError::failed(TWEET_FAILED, e))?;
    info!("Posted status {}", posted.id);
    Ok(Flow::Continue)
}

async fn retweet(argument: &str, session: &Session) -> Result<Flow, CommandError> {
    let target = resolve(argument.split_whitespace().next(), session)
        .map_err(|cause| CommandError::failed(RETWEET_FAILED, cause))?;
    session
        .client
        .retweet(target)
        .await
        .map_err(|e| CommandError::failed(RETWEET_FAILED, e))?;
    info!("Retweeted {}", target);
    Ok(Flow::Continue)
}

async fn reply(argument: &str, session: &Session) -> Result<Flow, CommandError> {
    let mut tokens = argument.split_whitespace();
    let target = resolve(tokens.next(), session)
        .map_err(|cause| CommandError::failed(REPLY_FAILED, cause))?;
    let text = tokens.collect::<Vec<_>>().join(" ");

    let original = session
        .client
        .show_status(target)
        .await
        .map_err(|e| CommandError::failed(REPLY_FAILED, e))?;
    let status = format!("@{} {}", original.user.screen_name, text);

    let posted = session
        .client
        .update_status(status.trim_end(), Some(target))
        .await
        .map_err(|e| CommandError::failed(REPLY_FAILED, e))?;
    info!("Posted reply {} to {}", posted.id, target);
    Ok(Flow::Continue)
}

async fn delete(argument: &str, session: &Session) -> Result<Flow, CommandError> {
    let target = resolve(argument.split_whitespace().next(), session)
        .map_err(|cause| CommandError::failed(DELETE_FAILED, cause))?;
    session
        .client
        .destroy_status(target)
        .await
        .map_err(|e| CommandError::failed(DELETE_FAILED, e))?;
    info!("Deleted {}", target);
    session.console.emit(&palette::success(DELETE_DONE));
    Ok(Flow::Continue)
}

async fn search(argument: &str, session: &Session) -> Result<Flow, CommandError> {
    let keyword = argument.trim();
    if !keyword.starts_with('#') {
        return Err(CommandError::Usage(SEARCH_USAGE));
    }

    let results = session
        .client
        .search(keyword)
        .await
        .map_err(|e| CommandError::failed(SEARCH_FAILED, e))?;
    let shown: Vec<&Status> = results
        .iter()
        .take(session.settings.search_max_record)
        .collect();

    let rule = palette::grey(&"*".repeat(output::width()));
    let mut block = vec![
        rule.clone(),
        String::new(),
        format!("Newest {} tweet:", shown.len()),
        String::new(),
    ];
    for status in shown {
        let rendered = session
            .renderer
            .render(status, Some(keyword))
            .map_err(|e| CommandError::failed(SEARCH_FAILED, e))?;
        block.push(rendered);
    }
    block.push(rule);

    session.console.emit(&block.join("\n"));
    Ok(Flow::Continue)
}

async fn list_people(ids: &[u64], session: &Session) -> Result<Flow, CommandError> {
    let mut handles = Vec::with_capacity(ids.len());
    for batch in ids.chunks(LOOKUP_BATCH) {
        let users = session
            .client
            .lookup_users(batch)
            .await
            .map_err(|e| CommandError::failed(LIST_FAILED, e))?;
        handles.extend(
            users
                .iter()
                .map(|u| palette::cycle_color(&format!("@{}", u.screen_name))),
        );
    }
    session.console.emit(&format!("{}\n", handles.join(" ")));
    Ok(Flow::Continue)
}
