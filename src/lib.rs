//! # blaze-protocol
//!
//! Server core for the Blaze game-networking protocol: the TDF value format,
//! packet framing, per-connection sessions, games and matchmaking.
//!
//! ## Layout
//! - [`core`]: varints, labels, TDF values, packets and the framing codec
//! - [`protocol`]: dispatcher and component handlers
//! - [`session`]: per-connection state and its outbound queue
//! - [`game`]: games, the game registry and matchmaking
//! - [`store`]: persistence boundary used by handlers
//! - [`transport`]: TCP server loop
//! - [`utils`]: logging, metrics and lock helpers
//!
//! ## Quick Start
//! ```no_run
//! use std::sync::Arc;
//!
//! use blaze_protocol::config::BlazeConfig;
//! use blaze_protocol::protocol::Dispatcher;
//! use blaze_protocol::state::ServerState;
//! use blaze_protocol::transport::tcp;
//! use blaze_protocol::utils::logging::init_logging;
//!
//! #[tokio::main]
//! async fn main() -> blaze_protocol::error::Result<()> {
//!     let config = BlazeConfig::from_env()?;
//!     init_logging(&config.logging)?;
//!     let state = Arc::new(ServerState::in_memory());
//!     tcp::start_server(&config.server, state, Arc::new(Dispatcher::with_default_routes())).await
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod game;
pub mod protocol;
pub mod session;
pub mod state;
pub mod store;
pub mod transport;
pub mod utils;

pub use crate::core::packet::{Packet, PacketHeader, PacketType};
pub use crate::core::tdf::{Tdf, TdfValue};
pub use crate::error::{BlazeError, Result};
pub use crate::state::ServerState;
