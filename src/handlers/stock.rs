use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::common::{created, ok, KeyParams};
use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::stock::{MovementLine, RecordMovement, UpdateMovement};
use crate::{ApiResponse, ApiResult, AppState};

#[utoipa::path(
    get,
    path = "/api/v1/stock-movements",
    responses(
        (status = 200, description = "Stock movement ledger", body = ApiResponse<Vec<MovementLine>>)
    ),
    security(("bearer_auth" = [])),
    tag = "stock"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Vec<MovementLine>> {
    Ok(ok(state.services.stock.list().await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/stock-movements",
    request_body = RecordMovement,
    responses(
        (status = 201, description = "Movement recorded and stock adjusted", body = ApiResponse<MovementLine>),
        (status = 400, description = "Invalid movement or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stock"
)]
pub async fn record_movement(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<RecordMovement>,
) -> Result<(StatusCode, Json<ApiResponse<MovementLine>>), ServiceError> {
    Ok(created(state.services.stock.record(payload).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/stock-movements/{id}",
    params(("id" = Uuid, Path, description = "Movement id")),
    request_body = UpdateMovement,
    responses(
        (status = 200, description = "Movement updated", body = ApiResponse<MovementLine>),
        (status = 400, description = "Invalid movement or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown movement", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stock"
)]
pub async fn update_movement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthUser,
    Json(payload): Json<UpdateMovement>,
) -> ApiResult<MovementLine> {
    Ok(ok(state.services.stock.update(id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/stock-movements/{id}",
    params(("id" = Uuid, Path, description = "Movement id")),
    responses(
        (status = 204, description = "Movement deleted and stock restored"),
        (status = 404, description = "Unknown movement", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stock"
)]
pub async fn delete_movement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthUser,
) -> Result<StatusCode, ServiceError> {
    state.services.stock.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/api/v1/stock-movements/by-key",
    params(KeyParams),
    request_body = UpdateMovement,
    responses(
        (status = 200, description = "Movement updated", body = ApiResponse<MovementLine>),
        (status = 404, description = "No movement matches the key", body = crate::errors::ErrorResponse),
        (status = 409, description = "Several movements match the key; nothing was changed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stock"
)]
pub async fn update_movement_by_key(
    State(state): State<AppState>,
    Query(params): Query<KeyParams>,
    _user: AuthUser,
    Json(payload): Json<UpdateMovement>,
) -> ApiResult<MovementLine> {
    let key = params.record_key()?;
    Ok(ok(state.services.stock.update_by_key(&key, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/stock-movements/by-key",
    params(KeyParams),
    responses(
        (status = 204, description = "Movement deleted and stock restored"),
        (status = 404, description = "No movement matches the key", body = crate::errors::ErrorResponse),
        (status = 409, description = "Several movements match the key; nothing was changed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stock"
)]
pub async fn delete_movement_by_key(
    State(state): State<AppState>,
    Query(params): Query<KeyParams>,
    _user: AuthUser,
) -> Result<StatusCode, ServiceError> {
    let key = params.record_key()?;
    state.services.stock.delete_by_key(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}
