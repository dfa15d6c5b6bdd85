//! API error types and conversions

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use canmon_core::SequenceError;
use serde::Serialize;

use crate::render::RenderError;

/// API error type that converts to HTTP responses
#[derive(Debug)]
pub enum ApiError {
    /// 409 Conflict
    Conflict(String),
    /// 502 Bad Gateway - a frame of the diagnostic sequence was not sent
    SequenceAborted { message: String, step: usize },
    /// 504 Gateway Timeout - the bus did not accept a frame in time
    SequenceTimeout { message: String, step: usize },
    /// 500 Internal Server Error
    Internal(String),
}

/// Standard error response format
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<usize>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, step) = match self {
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::SequenceAborted { message, step } => {
                (StatusCode::BAD_GATEWAY, "sequence_aborted", message, Some(step))
            }
            ApiError::SequenceTimeout { message, step } => (
                StatusCode::GATEWAY_TIMEOUT,
                "sequence_timeout",
                message,
                Some(step),
            ),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg, None)
            }
        };

        // Log errors at appropriate levels
        if status.is_server_error() {
            tracing::error!(error = error_type, %message, "API error");
        } else if status.is_client_error() {
            tracing::debug!(error = error_type, %message, "API client error");
        }

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            step,
        });

        (status, body).into_response()
    }
}

impl From<SequenceError> for ApiError {
    fn from(err: SequenceError) -> Self {
        let step = err.step();
        let message = err.to_string();
        if err.bus_error().is_timeout() {
            ApiError::SequenceTimeout { message, step }
        } else {
            ApiError::SequenceAborted { message, step }
        }
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use canmon_core::BusError;

    use super::*;

    #[test]
    fn test_sequence_failure_maps_to_bad_gateway() {
        let err: ApiError = SequenceError::Transmit {
            step: 3,
            total: 7,
            source: BusError::SendFailed("bus-off".into()),
        }
        .into();
        assert!(matches!(err, ApiError::SequenceAborted { step: 3, .. }));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_sequence_timeout_maps_to_gateway_timeout() {
        let err: ApiError = SequenceError::Transmit {
            step: 1,
            total: 7,
            source: BusError::Timeout(1000),
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_render_format_failure_maps_to_internal_error() {
        let err: ApiError = RenderError::from(std::fmt::Error).into();
        assert!(matches!(err, ApiError::Internal(ref msg) if msg.contains("format")));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
