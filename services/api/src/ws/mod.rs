//! WebSocket Session Management
//!
//! This module contains the real-time surface of a tutoring session:
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `session`: Manages the WebSocket connection lifecycle and the per-connection
//!   orchestrator event loop.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
