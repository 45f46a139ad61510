use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    /// Covers both "no such chat" and "not a participant".
    #[error("chat not found or access denied")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        use AppError::*;
        match self {
            Unauthorized(_) => StatusCode::UNAUTHORIZED,
            NotFound => StatusCode::NOT_FOUND,
            Validation(_) => StatusCode::BAD_REQUEST,
            Persistence(_) | Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text shown to the caller. Server-side failures never leak detail.
    pub fn public_message(&self) -> String {
        use AppError::*;
        match self {
            Unauthorized(reason) => format!("unauthorized: {reason}"),
            NotFound | Validation(_) => self.to_string(),
            Persistence(_) | Internal(_) => "server error".to_owned(),
        }
    }

    /// Logs server-side failures; client mistakes only at debug.
    pub fn log(&self, context: &str) {
        match self {
            AppError::Persistence(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "{context} failed");
            }
            _ => tracing::debug!(error = %self, "{context} rejected"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log("request");
        (
            self.status(),
            Json(json!({ "success": false, "message": self.public_message() })),
        )
            .into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("malformed payload: {err}"))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        Self::Internal(anyhow::Error::from(err))
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self::Validation(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self::Validation(err.to_owned())
    }
}
