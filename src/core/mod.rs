//! # Core Application Logic
//!
//! Session state and the rules for turning operator input into service
//! calls. Printing goes through [`crate::console::output::Console`]; the
//! network goes through [`crate::feed::FeedClient`].
//!
//! ## Modules
//!
//! - [`config`]: Layered settings (defaults → file → env → CLI)
//! - [`idmap`]: Persistent local ↔ remote status id table
//! - [`state`]: The `Session` struct shared by every handler
//! - [`command`]: Command parsing, handlers, and `dispatch()`

pub mod command;
pub mod config;
pub mod idmap;
pub mod state;
