use std::borrow::Cow;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use faceoff_engine::FaceoffError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let code = self.code();
        if status.is_server_error() {
            error!(code, status = %status, error = %self, "api_error");
        } else {
            debug!(code, status = %status, error = %self, "api_error");
        }

        let body = Json(ErrorResponse {
            code,
            message: self.public_message().into_owned(),
        });
        (status, body).into_response()
    }
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn public_message(&self) -> Cow<'static, str> {
        match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::Conflict(msg) => {
                Cow::Owned(msg.clone())
            }
            ApiError::ServiceUnavailable(_) => Cow::Borrowed("service unavailable"),
            ApiError::Internal(_) => Cow::Borrowed("internal server error"),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FaceoffError> for ApiError {
    fn from(value: FaceoffError) -> Self {
        match value {
            FaceoffError::NotFound(_)
            | FaceoffError::PhotoNotFound(_)
            | FaceoffError::NoOpponent(_) => ApiError::NotFound(value.to_string()),
            FaceoffError::AlreadyJudged | FaceoffError::InsufficientPool => {
                ApiError::Conflict(value.to_string())
            }
            FaceoffError::InvalidBracket(_)
            | FaceoffError::DuplicatePhoto(_)
            | FaceoffError::InvalidInput(_) => ApiError::BadRequest(value.to_string()),
            FaceoffError::TransientStore { .. } => ApiError::ServiceUnavailable(value.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn store_failures_do_not_leak() {
        let err = ApiError::from(FaceoffError::Store(anyhow::anyhow!("disk I/O error at /var/lib/faceoff.db")));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["code"], "internal_error");
        assert_eq!(json["message"], "internal server error");
    }

    #[test]
    fn taxonomy_maps_to_status() {
        let cases = [
            (FaceoffError::NotFound("match"), StatusCode::NOT_FOUND),
            (FaceoffError::NoOpponent(Uuid::nil()), StatusCode::NOT_FOUND),
            (FaceoffError::AlreadyJudged, StatusCode::CONFLICT),
            (FaceoffError::InsufficientPool, StatusCode::CONFLICT),
            (FaceoffError::InvalidBracket("short".into()), StatusCode::BAD_REQUEST),
            (FaceoffError::DuplicatePhoto(Uuid::nil()), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }
}
