//! # Protocol Layer
//!
//! Request routing and the handlers behind each route.
//!
//! ## Components
//! - **Components**: component, command and error code numbers
//! - **Dispatcher**: `(component, command)` lookup table, built once at startup
//! - **Handlers**: one module per routed component
//!
//! ## Failure Policy
//! Nothing a handler does closes the connection. Unknown routes and failed
//! handlers are answered with an empty RESPONSE; unauthenticated access gets
//! an `INVALID_ACCOUNT` ERROR packet; domain errors get their own codes.

pub mod components;
pub mod dispatcher;
pub mod handlers;

pub use dispatcher::{Dispatcher, DispatcherBuilder, HandlerError, HandlerResult};
