use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Conflict",
    "kind": "ambiguous_selection",
    "message": "Ambiguous selection: 2 records match 'Ana|Water|2024-06-01T10:00:00+00:00'",
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Machine-readable failure class
    pub kind: String,
    /// Human-readable error description
    pub message: String,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Connection unavailable: {0}")]
    ConnectionUnavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(#[from] sea_orm::error::DbErr),

    #[error("Ambiguous selection: {matches} records match '{key}'")]
    AmbiguousSelection { key: String, matches: usize },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<crate::invoice::InvoiceError> for ServiceError {
    fn from(err: crate::invoice::InvoiceError) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Shorthand for rejecting input before any store access.
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::ValidationError(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ConnectionUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::QueryFailed(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::AmbiguousSelection { .. } => StatusCode::CONFLICT,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Stable identifier of the failure class, rendered as `kind` in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionUnavailable(_) => "connection_unavailable",
            Self::QueryFailed(_) => "query_failed",
            Self::AmbiguousSelection { .. } => "ambiguous_selection",
            Self::ValidationError(_) => "validation_failed",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::InternalError(_) => "internal_error",
        }
    }

    /// Returns the error message suitable for HTTP responses.
    ///
    /// Store failures keep the underlying driver message: operators resubmit
    /// by hand and need to see what the database rejected.
    pub fn response_message(&self) -> String {
        match self {
            Self::ConnectionUnavailable(_) => {
                "Database unavailable; the operation was not applied".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match status {
            s if s.is_server_error() => tracing::error!(kind = self.kind(), error = %self, "request failed"),
            _ => tracing::debug!(kind = self.kind(), error = %self, "request rejected"),
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            kind: self.kind().to_string(),
            message: self.response_message(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use sea_orm::DbErr;

    #[tokio::test]
    async fn service_error_response_includes_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::NotFound("missing".into()).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
        assert_eq!(payload.kind, "not_found");
    }

    #[test]
    fn taxonomy_status_code_mapping() {
        assert_eq!(
            ServiceError::ConnectionUnavailable("down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ServiceError::QueryFailed(DbErr::Custom("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::AmbiguousSelection {
                key: "a|b".into(),
                matches: 2
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::validation("quantity must be positive").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Unauthorized("no token".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn query_failures_keep_the_driver_message() {
        let err = ServiceError::QueryFailed(DbErr::Custom("UNIQUE constraint failed".into()));
        assert!(err.response_message().contains("UNIQUE constraint failed"));
        assert_eq!(err.kind(), "query_failed");
    }

    #[test]
    fn connection_failures_hide_connection_details() {
        let err = ServiceError::ConnectionUnavailable("postgres://user:secret@db".into());
        assert!(!err.response_message().contains("secret"));
    }

    #[test]
    fn validator_errors_become_validation_failures() {
        let mut errors = validator::ValidationErrors::new();
        errors.add("quantity", validator::ValidationError::new("range"));
        let err: ServiceError = errors.into();
        assert_eq!(err.kind(), "validation_failed");
    }
}
