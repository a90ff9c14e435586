use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Request-level failures surfaced to API callers.
///
/// Upstream trouble (mailbox fetches, model output) is recovered inside the
/// scan pipeline and never reaches this type; what's left is caller errors
/// and genuine server faults.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("mailbox access is not granted for this session")]
    MissingMailboxScope,

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthenticated | Self::MissingMailboxScope => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(e) => {
                tracing::error!(error = %e, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::Unauthenticated.to_string(),
            "authentication required"
        );
        assert_eq!(
            AppError::Validation("amount must not be negative".into()).to_string(),
            "amount must not be negative"
        );
        assert_eq!(AppError::NotFound("subscription").to_string(), "subscription not found");
        // Internal errors never leak their cause to the caller.
        let err = AppError::Internal(anyhow::anyhow!("connection refused"));
        assert_eq!(err.to_string(), "internal error");
    }
}
