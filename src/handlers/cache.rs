use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use super::common::ok;
use crate::auth::AuthUser;
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CacheRefreshed {
    pub snapshots_dropped: usize,
}

/// Drops every cached list so the next reads hit the store.
#[utoipa::path(
    post,
    path = "/api/v1/cache/refresh",
    responses(
        (status = 200, description = "Cache cleared", body = ApiResponse<CacheRefreshed>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "cache"
)]
pub async fn refresh_cache(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<CacheRefreshed> {
    let snapshots_dropped = state.cache.refresh().await;
    info!(username = %user.username, snapshots_dropped, "Cache refreshed");
    Ok(ok(CacheRefreshed { snapshots_dropped }))
}
