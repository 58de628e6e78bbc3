//! # filament-server
//!
//! Axum HTTP + `WebSocket` relay for filament conversations.
//!
//! - `GET /{domain}/{filament}`: `WebSocket` upgrade bound to one filament
//! - `GET /status`: liveness check, `OPTIONS *`: preflight, everything else 404
//! - [`registry::TopicRegistry`]: subscribe/publish substrate, injected into the server
//! - [`websocket::session::Session`]: per-connection lifecycle state machine
//! - [`websocket::router::MessageRouter`]: per-frame validation and fan-out
//! - [`activity::ActivityLog`]: process-wide message counter and audit log
//! - Graceful shutdown via [`shutdown::ShutdownCoordinator`]

#![deny(unsafe_code)]

pub mod activity;
pub mod config;
pub mod cors;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod websocket;

#[cfg(test)]
mod testing;
