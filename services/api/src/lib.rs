//! Mentor API Library Crate
//!
//! This library contains the web-service shell around the mentor tutoring
//! core: configuration, shared state, routing and the WebSocket session
//! logic. The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod router;
pub mod state;
pub mod ws;
