//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources handed to every WebSocket session.

use crate::config::Config;
use mentor_core::generation::GenerationService;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers. Each WebSocket connection builds its own orchestrator on top of
/// the shared generation service.
#[derive(Clone)]
pub struct AppState {
    pub generation: Arc<dyn GenerationService>,
    pub config: Arc<Config>,
}
