//! # Error Types
//!
//! Error handling for the Blaze protocol core.
//!
//! This module defines the crate-wide error enum used by the wire codecs,
//! the transport layer and the game registries. Errors that cross the
//! handler boundary have their own type in
//! [`crate::protocol::dispatcher::HandlerError`] because they are answered
//! on the wire rather than propagated.
//!
//! ## Error Categories
//! - **I/O Errors**: socket failures while reading or writing frames
//! - **Frame Errors**: invalid headers and oversized frames
//! - **Value Errors**: malformed TDF content and invalid labels
//! - **Game Errors**: full or missing games
//! - **Configuration Errors**: invalid or unreadable configuration
//!
//! ## Example Usage
//! ```rust
//! use blaze_protocol::core::label::Label;
//! use blaze_protocol::error::{BlazeError, Result};
//! use tracing::{error, info};
//!
//! fn parse(name: &str) -> Result<Label> {
//!     Label::parse(name)
//! }
//!
//! match parse("GID") {
//!     Ok(label) => info!(%label, "Parsed label"),
//!     Err(e) => error!(error = %e, "Bad label"),
//! }
//! assert!(matches!(parse("gid!"), Err(BlazeError::InvalidLabel(_))));
//! ```

use std::io;
use thiserror::Error;

use crate::core::tdf::TdfError;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Connection errors
    pub const ERR_CONNECTION_LIMIT: &str = "Connection limit reached";

    /// Handler errors
    pub const ERR_HANDLER_PANIC: &str = "Handler panicked";
    pub const ERR_WORKER_POOL_CLOSED: &str = "Handler worker pool closed";

    /// Logging errors
    pub const ERR_LOGGING_INIT: &str = "Failed to install tracing subscriber";
}

/// BlazeError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum BlazeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TDF error: {0}")]
    Tdf(#[from] TdfError),

    #[error("Invalid packet header")]
    InvalidHeader,

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Invalid label: {0:?}")]
    InvalidLabel(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Game {0} is full")]
    GameFull(u32),

    #[error("Game {0} not found")]
    GameNotFound(u32),

    #[error("Session {session} is already in game {game}")]
    AlreadyInGame { session: u32, game: u32 },

    #[error("Session {0} is not logged in")]
    Unauthenticated(u32),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

/// Type alias for Results using BlazeError
pub type Result<T> = std::result::Result<T, BlazeError>;
