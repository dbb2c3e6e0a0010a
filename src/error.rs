use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("upstream failure: {0}")]
    Upstream(String),
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Wrap a generation-backend failure; the detail goes to the log only.
    pub fn upstream(err: anyhow::Error) -> Self {
        tracing::warn!(error = ?err, "llm backend request failed");
        AppError::Upstream("문항 생성 또는 채점 요청이 실패했습니다".to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BadRequest".to_string(), msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NotFound".to_string(), msg),
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string(), msg)
            }
            AppError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Unavailable".to_string(),
                msg,
            ),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "Upstream".to_string(), msg),
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal".to_string(),
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorBody {
            error: ErrorDetail { code, message },
        });

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
