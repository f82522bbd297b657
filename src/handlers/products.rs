use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::common::{created, ok};
use crate::auth::AuthUser;
use crate::entities::product;
use crate::errors::ServiceError;
use crate::services::products::{CreateProduct, UpdateProduct};
use crate::{ApiResponse, ApiResult, AppState};

#[utoipa::path(
    get,
    path = "/api/v1/products",
    responses(
        (status = 200, description = "Products", body = ApiResponse<Vec<product::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Vec<product::Model>> {
    Ok(ok(state.services.products.list().await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProduct,
    responses(
        (status = 201, description = "Product created; total_value is quantity × unit_value", body = ApiResponse<product::Model>),
        (status = 400, description = "Invalid product data", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<CreateProduct>,
) -> Result<(StatusCode, Json<ApiResponse<product::Model>>), ServiceError> {
    Ok(created(state.services.products.create(payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<product::Model>),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthUser,
) -> ApiResult<product::Model> {
    Ok(ok(state.services.products.get(id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/by-name/{name}",
    params(("name" = String, Path, description = "Exact product name")),
    responses(
        (status = 200, description = "Products with that name", body = ApiResponse<Vec<product::Model>>)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn find_products_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
    _user: AuthUser,
) -> ApiResult<Vec<product::Model>> {
    Ok(ok(state.services.products.find_by_name(&name).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = UpdateProduct,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<product::Model>),
        (status = 400, description = "Invalid product data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthUser,
    Json(payload): Json<UpdateProduct>,
) -> ApiResult<product::Model> {
    Ok(ok(state.services.products.update(id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 400, description = "Product still referenced", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthUser,
) -> Result<StatusCode, ServiceError> {
    state.services.products.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
