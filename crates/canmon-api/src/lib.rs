//! canmon-api - HTTP monitor for the CAN diagnostic bridge
//!
//! Serves the filtered response history and the "send now" control action.
//!
//! # Usage
//!
//! ```ignore
//! use canmon_api::{create_router, AppState};
//!
//! let state = AppState::new(store, Some(sequencer), FilterPolicy::Gated);
//! let router = create_router(state);
//! axum::serve(listener, router).await?;
//! ```

pub mod error;
pub mod handlers;
pub mod render;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Create the monitor router with the given application state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(|| async { "OK" }))
        // Control panel (HTML)
        .route("/", get(handlers::history::index))
        // History (JSON)
        .route("/api/messages", get(handlers::history::list_messages))
        // Control action
        .route("/send", post(handlers::control::send_sequence))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
