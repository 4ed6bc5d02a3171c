use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::pipeline::error::PipelineError;
use crate::pipeline::types::GenerationAttempt;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// A strict pipeline ran out of attempts. The history goes back in `details`.
    #[error("{message}")]
    ValidationExhausted {
        message: String,
        attempts: Vec<GenerationAttempt>,
    },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Status code plus the `{"error": {...}}` body. Shared by JSON responses and
    /// the `error` event of streaming endpoints.
    pub fn to_body(&self) -> (StatusCode, Value) {
        let (status, code, message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::ValidationExhausted { message, .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_EXHAUSTED",
                message.clone(),
            ),
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Cancelled(msg) => (StatusCode::REQUEST_TIMEOUT, "CANCELLED", msg.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let AppError::ValidationExhausted { attempts, .. } = self {
            error["details"] = json!({ "attempts": attempts });
        }

        (status, json!({ "error": error }))
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidInput(msg) => AppError::Validation(msg),
            PipelineError::Backend { .. } => AppError::Llm(err.to_string()),
            PipelineError::Cancelled { .. } => AppError::Cancelled(err.to_string()),
            PipelineError::ValidationExhausted { task, attempts } => AppError::ValidationExhausted {
                message: format!("{task}: no valid output after {} attempts", attempts.len()),
                attempts,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.to_body();
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;
    use crate::pipeline::types::Verdict;

    #[test]
    fn test_exhaustion_maps_to_422_with_history() {
        let err = AppError::from(PipelineError::ValidationExhausted {
            task: "skill_sort",
            attempts: vec![GenerationAttempt {
                iteration: 0,
                raw_text: "[]".to_string(),
                parsed: None,
                verdict: Verdict::Unparseable,
            }],
        });
        let (status, body) = err.to_body();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "VALIDATION_EXHAUSTED");
        assert_eq!(body["error"]["details"]["attempts"][0]["verdict"]["kind"], "unparseable");
    }

    #[test]
    fn test_backend_failure_hides_upstream_message() {
        let err = AppError::from(PipelineError::Backend {
            role: "refiner",
            source: LlmError::RateLimited { retries: 3 },
        });
        let (status, body) = err.to_body();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "LLM_ERROR");
        assert!(body["error"].get("details").is_none());
    }

    #[test]
    fn test_invalid_input_and_cancel_codes() {
        let (status, _) = AppError::from(PipelineError::InvalidInput("dup".into())).to_body();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = AppError::from(PipelineError::Cancelled {
            task: "refine",
            iteration: 1,
        })
        .to_body();
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body["error"]["code"], "CANCELLED");
    }
}
