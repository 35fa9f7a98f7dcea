use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use forge_core::ForgeErr;
use forge_protocol::api::ErrorResponse;
use thiserror::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Every non-2xx answer of the HTTP surface.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Internal { message: String, error: String },
}

impl ApiError {
    pub fn internal(message: &str, err: impl std::fmt::Display) -> Self {
        Self::Internal {
            message: message.to_string(),
            error: err.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ForgeErr> for ApiError {
    fn from(err: ForgeErr) -> Self {
        match err {
            ForgeErr::EmptyPrompt | ForgeErr::InvalidBuildId(_) | ForgeErr::EmptyTree => {
                Self::BadRequest(err.to_string())
            }
            other => Self::internal("Internal server error", other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            Self::Internal { error, .. } => {
                tracing::error!(error, "request failed");
                Some(error.clone())
            }
            _ => None,
        };
        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
            error,
        };
        (status, Json(body)).into_response()
    }
}
