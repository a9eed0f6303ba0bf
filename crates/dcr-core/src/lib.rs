//! Remote-command ingestion engine for the dash-cam host.
//!
//! Framework-agnostic: the chat platform sits behind [`source::UpdateSource`],
//! host actions behind [`source::CommandSink`]. Adapter crates implement them.

pub mod command;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod events;
pub mod logging;
pub mod offset;
pub mod poller;
pub mod security;
pub mod source;
pub mod supervisor;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
