//! # Utility Modules
//!
//! Supporting utilities shared by the transport and orchestration layers.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup from [`crate::config::LoggingConfig`]
//! - **Metrics**: thread-safe observability counters
//! - **Sync**: lock helpers that recover poisoned guards

pub mod logging;
pub mod metrics;
pub mod sync;

pub use metrics::{Metrics, MetricsSnapshot};
