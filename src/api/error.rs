use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use log::{error, warn};
use serde_json::json;

use crate::services::capture::CaptureError;

/// Every failure a handler can surface. The body is always `{"error": msg}`.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed input.
    Validation(String),
    NotFound(String),
    /// A write failed and was rolled back.
    Persistence(String),
    /// Submitted code could not be executed.
    Execution(String),
    /// The assistant answered with an error text.
    Assistant(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Persistence(_) | ApiError::Execution(_) | ApiError::Assistant(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation(m)
            | ApiError::NotFound(m)
            | ApiError::Persistence(m)
            | ApiError::Execution(m)
            | ApiError::Assistant(m)
            | ApiError::Internal(m) => m,
        }
    }
}

impl core::fmt::Display for ApiError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ApiError {}

impl From<diesel::result::Error> for ApiError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => ApiError::NotFound("Recurso no encontrado".to_string()),
            other => ApiError::Persistence(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for ApiError {
    fn from(value: diesel::r2d2::PoolError) -> Self {
        ApiError::Internal(format!("database unavailable: {}", value))
    }
}

impl From<CaptureError> for ApiError {
    fn from(value: CaptureError) -> Self {
        match value {
            CaptureError::Execution(_) => ApiError::Execution(value.to_string()),
            CaptureError::Persistence(_) => ApiError::Persistence(value.to_string()),
            CaptureError::Pool(_) => ApiError::Internal(value.to_string()),
        }
    }
}

/// Replaces the generic not-found text with an entity-specific one.
pub fn not_found_as(e: diesel::result::Error, message: &str) -> ApiError {
    match e {
        diesel::result::Error::NotFound => ApiError::NotFound(message.to_string()),
        other => other.into(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal(m) | ApiError::Persistence(m) => error!("request failed ({}): {}", status, m),
            ApiError::Execution(m) | ApiError::Assistant(m) => warn!("request failed ({}): {}", status, m),
            _ => {}
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sandbox::ExecutionError;

    #[test]
    fn taxonomy_maps_to_status_classes() {
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Persistence("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn diesel_not_found_is_not_a_persistence_failure() {
        assert!(matches!(ApiError::from(diesel::result::Error::NotFound), ApiError::NotFound(_)));
        assert!(matches!(
            ApiError::from(diesel::result::Error::RollbackTransaction),
            ApiError::Persistence(_)
        ));
    }

    #[test]
    fn capture_errors_keep_their_text() {
        let err = ApiError::from(CaptureError::Execution(ExecutionError::Runtime("boom".into())));
        assert_eq!(err.message(), "Error en el código al ejecutarlo: boom");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
