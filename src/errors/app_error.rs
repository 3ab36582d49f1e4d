//! HTTP-facing error type.
//!
//! Every error renders as `{"type": "error", "code": ..., "error": ...}` with a
//! status code matching its kind.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::core::realtime::{LIMIT_REACHED_CODE, LIMIT_REACHED_MESSAGE, RealtimeError};

#[derive(Debug, Error)]
pub enum AppError {
    /// The client's audio quota is exhausted
    #[error("{}", LIMIT_REACHED_MESSAGE)]
    LimitExceeded,

    /// Upstream connection or handshake failed while creating a session
    #[error("Failed to create session: {0}")]
    SessionCreation(#[source] RealtimeError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::LimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::SessionCreation(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::LimitExceeded => LIMIT_REACHED_CODE,
            AppError::SessionCreation(_) => "CONNECT_FAILED",
        }
    }

    /// Message shown to clients. Upstream failure details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::LimitExceeded => LIMIT_REACHED_MESSAGE.to_string(),
            AppError::SessionCreation(_) => "Failed to create session".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::SessionCreation(_) => tracing::error!("{}", self),
            AppError::LimitExceeded => tracing::debug!("{}", self),
        }

        let body = json!({
            "type": "error",
            "code": self.code(),
            "error": self.public_message(),
        });
        (self.status(), Json(body)).into_response()
    }
}
