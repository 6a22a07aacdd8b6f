//! Axum Router Configuration
//!
//! The HTTP surface is a single WebSocket endpoint; everything that happens
//! in a tutoring session flows over that connection.

use crate::{state::AppState, ws::ws_handler};
use axum::{Router, routing::get};
use std::sync::Arc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(app_state)
}
