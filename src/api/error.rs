use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::engine::EngineError;

use super::models::Envelope;

/// Everything a handler can fail with, rendered as the error envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("missing or invalid identity: {0}")]
    Unauthenticated(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Engine(e) => match e {
                EngineError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                EngineError::Guard(_) => (StatusCode::BAD_REQUEST, "GUARD_VIOLATION"),
                EngineError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
                EngineError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                EngineError::Conflict(_) => (StatusCode::CONFLICT, "SLOT_CONFLICT"),
                EngineError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            ApiError::Engine(EngineError::Store(detail)) => {
                tracing::error!("store error: {detail}");
                "temporarily unable to record the change, please retry".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(Envelope::<()>::failure(code, message))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn engine_errors_map_to_status_codes() {
        let cases = [
            (EngineError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (EngineError::Guard("x".into()), StatusCode::BAD_REQUEST),
            (EngineError::Forbidden("x"), StatusCode::FORBIDDEN),
            (EngineError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (EngineError::Conflict(Ulid::new()), StatusCode::CONFLICT),
            (EngineError::Store("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn missing_identity_is_401() {
        let resp = ApiError::Unauthenticated("x-user-id".into()).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
