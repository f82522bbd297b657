use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use crate::errors::ServiceError;
use crate::locator::RecordKey;
use crate::ApiResponse;

/// Standard created response
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Standard success response
pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data))
}

/// Composite key addressing a row by its natural fields, joined with `|`.
#[derive(Debug, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct KeyParams {
    /// e.g. `Ana|Water|2024-06-01T10:00:00.000000Z`
    pub key: String,
}

impl KeyParams {
    pub fn record_key(&self) -> Result<RecordKey, ServiceError> {
        RecordKey::parse(&self.key)
    }
}
