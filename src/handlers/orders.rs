use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::common::{created, ok, KeyParams};
use crate::auth::AuthUser;
use crate::entities::order_view;
use crate::errors::ServiceError;
use crate::services::orders::{CreateOrder, OrderFilter, UpdateOrder};
use crate::{ApiResponse, ApiResult, AppState};

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderFilter),
    responses(
        (status = 200, description = "Order lines from order_product_view, newest first", body = ApiResponse<Vec<order_view::Model>>)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
    _user: AuthUser,
) -> ApiResult<Vec<order_view::Model>> {
    Ok(ok(state.services.orders.list(filter).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrder,
    responses(
        (status = 201, description = "Open order created", body = ApiResponse<order_view::Model>),
        (status = 400, description = "Invalid order data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown client or product", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<CreateOrder>,
) -> Result<(StatusCode, Json<ApiResponse<order_view::Model>>), ServiceError> {
    Ok(created(state.services.orders.create(payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order line", body = ApiResponse<order_view::Model>),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthUser,
) -> ApiResult<order_view::Model> {
    Ok(ok(state.services.orders.get(id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrder,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<order_view::Model>),
        (status = 400, description = "Order already closed or invalid data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthUser,
    Json(payload): Json<UpdateOrder>,
) -> ApiResult<order_view::Model> {
    Ok(ok(state.services.orders.update(id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 400, description = "Order already closed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthUser,
) -> Result<StatusCode, ServiceError> {
    state.services.orders.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/by-key",
    params(KeyParams),
    responses(
        (status = 200, description = "The single order matching the key", body = ApiResponse<order_view::Model>),
        (status = 404, description = "No order matches the key", body = crate::errors::ErrorResponse),
        (status = 409, description = "Several orders match the key", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn locate_order(
    State(state): State<AppState>,
    Query(params): Query<KeyParams>,
    _user: AuthUser,
) -> ApiResult<order_view::Model> {
    let key = params.record_key()?;
    Ok(ok(state.services.orders.locate(&key).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/by-key",
    params(KeyParams),
    request_body = UpdateOrder,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<order_view::Model>),
        (status = 404, description = "No order matches the key", body = crate::errors::ErrorResponse),
        (status = 409, description = "Several orders match the key; nothing was changed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn update_order_by_key(
    State(state): State<AppState>,
    Query(params): Query<KeyParams>,
    _user: AuthUser,
    Json(payload): Json<UpdateOrder>,
) -> ApiResult<order_view::Model> {
    let key = params.record_key()?;
    Ok(ok(state.services.orders.update_by_key(&key, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/by-key",
    params(KeyParams),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 404, description = "No order matches the key", body = crate::errors::ErrorResponse),
        (status = 409, description = "Several orders match the key; nothing was changed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn delete_order_by_key(
    State(state): State<AppState>,
    Query(params): Query<KeyParams>,
    _user: AuthUser,
) -> Result<StatusCode, ServiceError> {
    let key = params.record_key()?;
    state.services.orders.delete_by_key(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}
