use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use super::common::{created, ok};
use crate::auth::AuthUser;
use crate::entities::client;
use crate::errors::ServiceError;
use crate::services::clients::{RegisterClient, UpdateClient};
use crate::{ApiResponse, ApiResult, AppState};

#[utoipa::path(
    get,
    path = "/api/v1/clients",
    responses(
        (status = 200, description = "Registered clients", body = ApiResponse<Vec<client::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "clients"
)]
pub async fn list_clients(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Vec<client::Model>> {
    Ok(ok(state.services.clients.list().await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/clients",
    request_body = RegisterClient,
    responses(
        (status = 201, description = "Client registered", body = ApiResponse<client::Model>),
        (status = 400, description = "Invalid client data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "clients"
)]
pub async fn register_client(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<RegisterClient>,
) -> Result<(StatusCode, Json<ApiResponse<client::Model>>), ServiceError> {
    let created_client = state.services.clients.register(payload).await?;
    Ok(created(created_client))
}

#[utoipa::path(
    get,
    path = "/api/v1/clients/{id}",
    params(("id" = Uuid, Path, description = "Client id")),
    responses(
        (status = 200, description = "Client", body = ApiResponse<client::Model>),
        (status = 404, description = "Unknown client", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "clients"
)]
pub async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthUser,
) -> ApiResult<client::Model> {
    Ok(ok(state.services.clients.get(id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/clients/by-name/{name}",
    params(("name" = String, Path, description = "Exact full name")),
    responses(
        (status = 200, description = "Clients with that name", body = ApiResponse<Vec<client::Model>>)
    ),
    security(("bearer_auth" = [])),
    tag = "clients"
)]
pub async fn find_clients_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
    _user: AuthUser,
) -> ApiResult<Vec<client::Model>> {
    Ok(ok(state.services.clients.find_by_name(&name).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/clients/{id}",
    params(("id" = Uuid, Path, description = "Client id")),
    request_body = UpdateClient,
    responses(
        (status = 200, description = "Client updated", body = ApiResponse<client::Model>),
        (status = 400, description = "Invalid client data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown client", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "clients"
)]
pub async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthUser,
    Json(payload): Json<UpdateClient>,
) -> ApiResult<client::Model> {
    Ok(ok(state.services.clients.update(id, payload).await?))
}

/// Deletes the client and every order that belongs to it.
#[utoipa::path(
    delete,
    path = "/api/v1/clients/{id}",
    params(("id" = Uuid, Path, description = "Client id")),
    responses(
        (status = 204, description = "Client and its orders deleted"),
        (status = 404, description = "Unknown client", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "clients"
)]
pub async fn delete_client(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: AuthUser,
) -> Result<StatusCode, ServiceError> {
    let orders_removed = state.services.clients.delete(id).await?;
    info!(client_id = %id, orders_removed, username = %user.username, "Client removed");
    Ok(StatusCode::NO_CONTENT)
}
