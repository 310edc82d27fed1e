//! # Dispatcher
//!
//! Routes a request to its handler by `(component, command)` and turns the
//! handler's outcome into the packets written back to the client.
//!
//! The routing table is built once through [`DispatcherBuilder`] and never
//! changes afterwards, so lookups take no lock.
//!
//! | Outcome | Reply |
//! |---------|-------|
//! | no route | empty RESPONSE |
//! | `Ok(packets)` | those packets |
//! | `NotAuthenticated` | ERROR `INVALID_ACCOUNT` |
//! | `Blaze(code)` | ERROR `code` |
//! | `Store(Unavailable)` | ERROR `SERVER_UNAVAILABLE` |
//! | `Game(GameNotFound / GameFull)` | ERROR `GAME_NOT_FOUND` / `GAME_FULL` |
//! | any other error, or a panic | empty RESPONSE |
//!
//! No outcome closes the connection.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::core::label::Label;
use crate::core::packet::Packet;
use crate::core::tdf::TdfError;
use crate::error::BlazeError;
use crate::protocol::components::{component_name, BlazeErrorCode};
use crate::session::Session;
use crate::state::ServerState;
use crate::store::StoreError;

/// Handler boundary error.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("session is not authenticated")]
    NotAuthenticated,

    #[error("request refused with {0:?}")]
    Blaze(BlazeErrorCode),

    #[error("missing or mistyped field {0}")]
    MissingField(Label),

    #[error("malformed content: {0}")]
    Malformed(#[from] TdfError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Game(#[from] BlazeError),

    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    /// Error code sent on the wire for domain failures.
    pub fn error_code(&self) -> Option<BlazeErrorCode> {
        match self {
            HandlerError::Blaze(code) => Some(*code),
            HandlerError::Store(StoreError::Unavailable(_)) => Some(BlazeErrorCode::ServerUnavailable),
            HandlerError::Game(BlazeError::GameNotFound(_)) => Some(BlazeErrorCode::GameNotFound),
            HandlerError::Game(BlazeError::GameFull(_)) => Some(BlazeErrorCode::GameFull),
            _ => None,
        }
    }
}

pub type HandlerResult = Result<Vec<Packet>, HandlerError>;

type HandlerFn = dyn Fn(&ServerState, &Arc<Session>, &Packet) -> HandlerResult + Send + Sync + 'static;

#[derive(Default)]
pub struct DispatcherBuilder {
    handlers: HashMap<(u16, u16), Box<HandlerFn>>,
}

impl DispatcherBuilder {
    /// Register `handler` for a route. A later registration replaces an
    /// earlier one.
    pub fn route<F>(mut self, component: u16, command: u16, handler: F) -> Self
    where
        F: Fn(&ServerState, &Arc<Session>, &Packet) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers.insert((component, command), Box::new(handler));
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            handlers: self.handlers,
        }
    }
}

pub struct Dispatcher {
    handlers: HashMap<(u16, u16), Box<HandlerFn>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::with_default_routes()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.handlers.len())
            .finish()
    }
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Every handler this crate implements.
    pub fn with_default_routes() -> Self {
        crate::protocol::handlers::register(Self::builder()).build()
    }

    pub fn has_route(&self, component: u16, command: u16) -> bool {
        self.handlers.contains_key(&(component, command))
    }

    pub fn route_count(&self) -> usize {
        self.handlers.len()
    }

    /// Run the handler for `packet` and return the replies to write.
    pub fn dispatch(&self, state: &ServerState, session: &Arc<Session>, packet: &Packet) -> Vec<Packet> {
        let (component, command) = packet.header.route();
        let Some(handler) = self.handlers.get(&(component, command)) else {
            debug!(
                session_id = session.id(),
                component = component_name(component),
                component_id = component,
                command,
                "No handler registered; sending empty response"
            );
            state.metrics.unknown_command();
            return vec![Packet::response_empty(packet)];
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| handler(state, session, packet)));
        match outcome {
            Ok(Ok(replies)) => replies,
            Ok(Err(HandlerError::NotAuthenticated)) => {
                warn!(
                    session_id = session.id(),
                    component = component_name(component),
                    command,
                    "Unauthenticated request refused"
                );
                state.metrics.auth_rejected();
                vec![Packet::error_empty(packet, BlazeErrorCode::InvalidAccount.as_u16())]
            }
            Ok(Err(err)) => match err.error_code() {
                Some(code) => {
                    debug!(session_id = session.id(), ?code, error = %err, "Request refused");
                    state.metrics.domain_error();
                    vec![Packet::error_empty(packet, code.as_u16())]
                }
                None => {
                    if matches!(err, HandlerError::Malformed(_)) {
                        warn!(session_id = session.id(), error = %err, ?packet, "Malformed request content");
                    } else {
                        error!(session_id = session.id(), error = %err, ?packet, "Handler failed");
                    }
                    state.metrics.handler_failure();
                    vec![Packet::response_empty(packet)]
                }
            },
            Err(panic) => {
                error!(
                    session_id = session.id(),
                    panic = panic_message(panic.as_ref()),
                    ?packet,
                    "Handler panicked"
                );
                state.metrics.handler_failure();
                vec![Packet::response_empty(packet)]
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        crate::error::constants::ERR_HANDLER_PANIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::packet::PacketType;

    fn state_and_session() -> (ServerState, Arc<Session>) {
        let state = ServerState::in_memory();
        let (session, _rx) = state.sessions.create(None);
        (state, session)
    }

    #[test]
    fn unknown_route_gets_empty_response() {
        let (state, session) = state_and_session();
        let dispatcher = Dispatcher::builder().build();
        let request = Packet::request(0x9999, 1, 31, vec![]);
        let replies = dispatcher.dispatch(&state, &session, &request);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].header.ty, PacketType::Response);
        assert_eq!(replies[0].header.id, 31);
        assert!(replies[0].contents().is_empty());
        assert_eq!(state.metrics.snapshot().unknown_commands, 1);
    }

    #[test]
    fn not_authenticated_maps_to_invalid_account() {
        let (state, session) = state_and_session();
        let dispatcher = Dispatcher::builder()
            .route(1, 1, |_, _, _| Err(HandlerError::NotAuthenticated))
            .build();
        let replies = dispatcher.dispatch(&state, &session, &Packet::request(1, 1, 5, vec![]));
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].header.ty, PacketType::Error);
        assert_eq!(replies[0].header.error, BlazeErrorCode::InvalidAccount.as_u16());
        assert_eq!(replies[0].header.id, 5);
    }

    #[test]
    fn domain_and_store_errors_map_to_codes() {
        let (state, session) = state_and_session();
        let dispatcher = Dispatcher::builder()
            .route(1, 1, |_, _, _| Err(HandlerError::Blaze(BlazeErrorCode::WrongPassword)))
            .route(1, 2, |_, _, _| {
                Err(StoreError::Unavailable("down".into()).into())
            })
            .build();
        let wrong = dispatcher.dispatch(&state, &session, &Packet::request(1, 1, 1, vec![]));
        assert_eq!(wrong[0].header.error, 0xC);
        let down = dispatcher.dispatch(&state, &session, &Packet::request(1, 2, 2, vec![]));
        assert_eq!(down[0].header.ty, PacketType::Error);
        assert_eq!(down[0].header.error, 0x0);
    }

    #[test]
    fn panic_is_contained() {
        let (state, session) = state_and_session();
        let dispatcher = Dispatcher::builder()
            .route(1, 1, |_, _, _| panic!("boom"))
            .route(1, 2, |_, _, p| Ok(vec![Packet::response_empty(p)]))
            .build();
        let replies = dispatcher.dispatch(&state, &session, &Packet::request(1, 1, 8, vec![]));
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].header.ty, PacketType::Response);
        assert!(replies[0].contents().is_empty());

        let next = dispatcher.dispatch(&state, &session, &Packet::request(1, 2, 9, vec![]));
        assert_eq!(next[0].header.id, 9);
        assert_eq!(state.metrics.snapshot().handler_failures, 1);
    }

    #[test]
    fn default_routes_cover_catalog() {
        use crate::protocol::components::*;
        let dispatcher = Dispatcher::with_default_routes();
        assert!(dispatcher.has_route(authentication::COMPONENT, authentication::LOGIN));
        assert!(dispatcher.has_route(util::COMPONENT, util::PING));
        assert!(dispatcher.has_route(game_manager::COMPONENT, game_manager::START_MATCHMAKING));
        assert!(dispatcher.has_route(user_sessions::COMPONENT, user_sessions::UPDATE_NETWORK_INFO));
        assert!(!dispatcher.has_route(0x9999, 1));
    }
}
