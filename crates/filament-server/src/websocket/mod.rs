//! WebSocket connection state, session lifecycle, message routing, and the
//! per-connection read/write loops.

pub mod connection;
pub mod router;
pub mod session;
pub mod socket;
