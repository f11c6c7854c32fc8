use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned to HTTP clients.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Unified error type for the gateway integration services.
///
/// Every public service operation returns `Result<_, ServiceError>` so
/// callers can distinguish "nothing to do" from an actual failure. The
/// upstream plugin swallowed exceptions and returned null; here that policy
/// is replaced with typed results.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("missing transaction id in gateway payload")]
    MissingTransactionId,

    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] DbErr),

    #[error("transaction query failed: {0}")]
    QueryFailure(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::MissingTransactionId | ServiceError::ValidationError(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidOperation(_) => StatusCode::CONFLICT,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::PersistenceFailure(_) | ServiceError::QueryFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message exposed to clients. Database failures are not leaked verbatim.
    pub fn response_message(&self) -> String {
        match self {
            ServiceError::PersistenceFailure(_) => "a storage error occurred".to_string(),
            ServiceError::QueryFailure(_) => "a lookup error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_transaction_id_maps_to_bad_request() {
        let err = ServiceError::MissingTransactionId;
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn persistence_failure_is_not_leaked() {
        let err = ServiceError::PersistenceFailure(DbErr::Custom("secret dsn".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.response_message().contains("secret"));
    }

    #[test]
    fn invalid_operation_maps_to_conflict() {
        let err = ServiceError::InvalidOperation("capture before authorization".into());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.response_message().contains("capture"));
    }
}
