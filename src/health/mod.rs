/*!
 * # Health checks
 *
 * - `/health` reports the process as up without touching the store
 * - `/health/ready` pings the store and answers 503 while it is unreachable
 * - `/health/live` reports uptime
 * - `/health/version` reports the build version
 */

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::db::Gateway;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ReadinessReport {
    pub ready: bool,
    pub database: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone)]
pub struct HealthState {
    pub gateway: Arc<Gateway>,
    pub start_time: SystemTime,
}

impl HealthState {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            start_time: SystemTime::now(),
        }
    }

    pub fn uptime(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or(Duration::from_secs(0))
            .as_secs()
    }
}

/// Returns build and version information
pub async fn version_info() -> impl IntoResponse {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": env!("CARGO_PKG_NAME"),
    }))
}

/// Process liveness; never touches the store.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up")),
    tag = "health"
)]
pub async fn health_check() -> impl IntoResponse {
    debug!("Health check endpoint called");
    (
        StatusCode::OK,
        Json(json!({
            "status": HealthStatus::Up,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
}

/// Store reachability.
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Store reachable", body = ReadinessReport),
        (status = 503, description = "Store unreachable", body = ReadinessReport)
    ),
    tag = "health"
)]
pub async fn readiness_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let (status_code, report) = match state.gateway.ping().await {
        Ok(()) => (
            StatusCode::OK,
            ReadinessReport {
                ready: true,
                database: HealthStatus::Up,
                message: None,
                timestamp: Utc::now(),
            },
        ),
        Err(e) => {
            error!("Database readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ReadinessReport {
                    ready: false,
                    database: HealthStatus::Down,
                    message: Some(e.response_message()),
                    timestamp: Utc::now(),
                },
            )
        }
    };

    (status_code, Json(report))
}

pub async fn liveness_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "alive": true,
            "uptime_seconds": state.uptime(),
            "timestamp": Utc::now(),
        })),
    )
}

pub fn health_routes(gateway: Arc<Gateway>) -> Router {
    let state = Arc::new(HealthState::new(gateway));

    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
        .route("/version", get(version_info))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConfig;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn readiness_reports_unreachable_store() {
        let gateway = Arc::new(Gateway::new(DbConfig {
            url: "sqlite:///definitely/missing/dir/club.db?mode=ro".to_string(),
            connect_timeout: Duration::from_secs(1),
            acquire_timeout: Duration::from_secs(1),
            ..Default::default()
        }));
        let app = health_routes(gateway);

        let live = app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(live.status(), StatusCode::OK);

        let ready = app
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
