//! Control action: send the diagnostic sequence

use axum::extract::State;

use crate::error::ApiError;
use crate::state::AppState;

/// POST /send
/// Transmit the diagnostic sequence once
///
/// The pass runs on its own task so a client that goes away mid-request
/// does not cut the exchange short. The receive loop keeps polling meanwhile.
pub async fn send_sequence(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    let sequencer = state.sequencer().cloned().ok_or_else(|| {
        ApiError::Conflict(
            "Diagnostic sequence is free-running in this deployment".to_string(),
        )
    })?;

    let report = tokio::spawn(async move { sequencer.send_sequence().await })
        .await
        .map_err(|e| ApiError::Internal(format!("Diagnostic sequence task failed: {}", e)))??;
    tracing::debug!(
        frames = report.frames_sent,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Diagnostic sequence sent on request"
    );

    Ok("OK")
}
