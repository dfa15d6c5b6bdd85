//! History handlers
//!
//! Each request takes exactly one snapshot of the store and renders it in
//! the order returned.

use axum::extract::State;
use axum::response::Html;
use axum::Json;

use crate::error::ApiError;
use crate::render::{render_page, HistoryResponse};
use crate::state::AppState;

/// GET /
/// Control panel with the current history
pub async fn index(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let entries = state.store().snapshot();
    let page = render_page(&entries, state.policy())?;
    Ok(Html(page))
}

/// GET /api/messages
/// Current history as JSON, oldest first
pub async fn list_messages(State(state): State<AppState>) -> Json<HistoryResponse> {
    let entries = state.store().snapshot();
    Json(HistoryResponse::new(
        &entries,
        state.store().capacity(),
        state.policy(),
    ))
}
