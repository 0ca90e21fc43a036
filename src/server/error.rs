use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::dispatch::DispatchError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced over the HTTP API. Every variant renders as
/// `{"error": "<message>"}` with a human-readable message; internal detail
/// stays in the server log.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// User-fixable request problems (bad URL, unknown kind)
    #[error("{0}")]
    BadRequest(String),

    /// The extraction collaborator failed
    #[error("{0}")]
    Extraction(String),

    /// Anything we will not explain to the client
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Extraction(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            // Validation messages are already user-facing
            DispatchError::Validation(e) => ApiError::BadRequest(e.to_string()),
            // Extraction messages are the classified, safe form; the raw
            // collaborator output was logged where it failed
            DispatchError::Extraction(e) => ApiError::Extraction(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractError;
    use crate::normalize::ValidationError;

    #[test]
    fn test_validation_maps_to_400() {
        let err: ApiError = DispatchError::Validation(ValidationError::UnsupportedLinkShape).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_extraction_maps_to_500() {
        let err: ApiError = DispatchError::Extraction(ExtractError::SourceUnreachable).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        // The message is the classified form, not raw yt-dlp output
        assert_eq!(err.to_string(), "the extractor could not reach the source site");
    }
}
