//! # filament-core
//!
//! Shared vocabulary of the Filament relay.
//!
//! - **Identity**: [`Filament`] (`domain`/`name`) and the [`Topic`] routing key derived from it
//! - **Wire format**: [`MessageBlock`] envelopes, inbound [`Frame`] decoding, reserved frames
//! - **Close codes**: [`CloseCode`] values the relay uses to terminate connections
//! - **IDs**: [`ConnectionId`] and [`ReconnectId`] newtypes
//! - **Errors**: [`RelayError`] with its close-code mapping

#![deny(unsafe_code)]

pub mod close;
pub mod envelope;
pub mod errors;
pub mod filament;
pub mod ids;

pub use close::CloseCode;
pub use envelope::{Frame, MessageBlock, PING, PONG, RECONNECT_PREFIX, reconnect_frame};
pub use errors::{RelayError, Result};
pub use filament::{Filament, Topic, topic_of, validate};
pub use ids::{ConnectionId, ReconnectId};
