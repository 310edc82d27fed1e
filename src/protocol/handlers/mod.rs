//! Request handlers, one module per component.
//!
//! Handlers are plain functions matching the dispatcher's handler signature.
//! They return the replies for the request and push any notifications onto
//! sessions directly. A push to the handler's own session reaches the client
//! before the returned replies.

pub mod authentication;
pub mod game_manager;
pub mod user_sessions;
pub mod util;

use crate::core::label::Label;
use crate::core::tdf::FieldLookup;
use crate::protocol::dispatcher::{DispatcherBuilder, HandlerError};
use crate::session::Session;
use crate::store::Player;

/// Register every component's routes.
pub fn register(builder: DispatcherBuilder) -> DispatcherBuilder {
    let builder = authentication::register(builder);
    let builder = util::register(builder);
    let builder = user_sessions::register(builder);
    game_manager::register(builder)
}

/// The logged in player, or `NotAuthenticated`.
pub(crate) fn require_player(session: &Session) -> Result<Player, HandlerError> {
    session.player().ok_or(HandlerError::NotAuthenticated)
}

pub(crate) fn required_varint<F>(fields: &F, label: Label) -> Result<i64, HandlerError>
where
    F: FieldLookup + ?Sized,
{
    fields
        .varint_field(label)
        .ok_or(HandlerError::MissingField(label))
}

pub(crate) fn required_str<F>(fields: &F, label: Label) -> Result<&str, HandlerError>
where
    F: FieldLookup + ?Sized,
{
    fields.str_field(label).ok_or(HandlerError::MissingField(label))
}

/// Narrow a varint to `u32`, treating out of range values as missing.
pub(crate) fn required_u32<F>(fields: &F, label: Label) -> Result<u32, HandlerError>
where
    F: FieldLookup + ?Sized,
{
    u32::try_from(required_varint(fields, label)?).map_err(|_| HandlerError::MissingField(label))
}

pub(crate) fn required_u16<F>(fields: &F, label: Label) -> Result<u16, HandlerError>
where
    F: FieldLookup + ?Sized,
{
    u16::try_from(required_varint(fields, label)?).map_err(|_| HandlerError::MissingField(label))
}
