use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::models::ConflictInfo;

pub type AppResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("time slot conflicts with an existing appointment")]
    SchedulingConflict(ConflictInfo),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    data: Option<()>,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    conflict: Option<ConflictInfo>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, conflict) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string(), None)
            }
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string(), None),
            ApiError::NotFound(what) => {
                (StatusCode::NOT_FOUND, format!("{} not found", what), None)
            }
            ApiError::SchedulingConflict(info) => (
                StatusCode::CONFLICT,
                "Time slot conflicts with an existing appointment".to_string(),
                Some(info),
            ),
            ApiError::Database(e) => {
                tracing::error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                    None,
                )
            }
        };
        let body = ErrorBody {
            ok: false,
            data: None,
            error: message,
            conflict,
        };
        (status, Json(body)).into_response()
    }
}
