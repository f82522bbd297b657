//! Beach Club API
//!
//! Back office for a beach-sports club: clients, products, stock movements,
//! orders and the invoices that settle them.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod invoice;
pub mod lifecycle;
pub mod locator;
pub mod middleware_helpers;
pub mod migrator;
pub mod money;
pub mod openapi;
pub mod services;
pub mod tracing;

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{auth_middleware, AuthConfig, AuthService};
use crate::cache::DataCache;
use crate::config::AppConfig;
use crate::db::{DbConfig, Gateway};
use crate::services::AppServices;

/// Shared state handed to every `/api/v1` handler.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub gateway: Arc<Gateway>,
    pub cache: DataCache,
    pub services: AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Builds the state without touching the store; the gateway connects on
    /// first use.
    pub fn new(config: AppConfig) -> Self {
        let gateway = Arc::new(Gateway::new(DbConfig::from(&config)));
        Self::with_gateway(config, gateway)
    }

    pub fn with_gateway(config: AppConfig, gateway: Arc<Gateway>) -> Self {
        let cache = DataCache::new(config.cache_ttl());
        let services = AppServices::new(gateway.clone(), cache.clone(), &config.client_email_domain);
        let auth = Arc::new(AuthService::new(AuthConfig::from_app_config(&config)));
        Self {
            config,
            gateway,
            cache,
            services,
            auth,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn envelope_serializes_without_empty_errors() {
        let response = ApiResponse::success(vec![1, 2]).with_message("two items");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], serde_json::json!([1, 2]));
        assert_eq!(json["message"], "two items");
        assert!(json.get("errors").is_none());
        assert!(json["meta"].get("request_id").is_none());
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Every `/api/v1` route; all of them require an operator bearer token.
pub fn api_v1_routes(auth: Arc<AuthService>) -> Router<AppState> {
    let clients = Router::new()
        .route(
            "/clients",
            get(handlers::clients::list_clients).post(handlers::clients::register_client),
        )
        .route(
            "/clients/by-name/:name",
            get(handlers::clients::find_clients_by_name),
        )
        .route(
            "/clients/:id",
            get(handlers::clients::get_client)
                .put(handlers::clients::update_client)
                .delete(handlers::clients::delete_client),
        )
        .route(
            "/clients/:id/invoice",
            get(handlers::invoices::preview_invoice),
        )
        .route(
            "/clients/:id/invoice/close",
            post(handlers::invoices::close_invoice),
        );

    let products = Router::new()
        .route(
            "/products",
            get(handlers::products::list_products).post(handlers::products::create_product),
        )
        .route(
            "/products/by-name/:name",
            get(handlers::products::find_products_by_name),
        )
        .route(
            "/products/:id",
            get(handlers::products::get_product)
                .put(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        );

    let stock = Router::new()
        .route(
            "/stock-movements",
            get(handlers::stock::list_movements).post(handlers::stock::record_movement),
        )
        .route(
            "/stock-movements/by-key",
            put(handlers::stock::update_movement_by_key)
                .delete(handlers::stock::delete_movement_by_key),
        )
        .route(
            "/stock-movements/:id",
            put(handlers::stock::update_movement).delete(handlers::stock::delete_movement),
        );

    let orders = Router::new()
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::create_order),
        )
        .route(
            "/orders/by-key",
            get(handlers::orders::locate_order)
                .put(handlers::orders::update_order_by_key)
                .delete(handlers::orders::delete_order_by_key),
        )
        .route(
            "/orders/:id",
            get(handlers::orders::get_order)
                .put(handlers::orders::update_order)
                .delete(handlers::orders::delete_order),
        );

    Router::new()
        .merge(clients)
        .merge(products)
        .merge(stock)
        .merge(orders)
        .route("/cache/refresh", post(handlers::cache::refresh_cache))
        .route_layer(from_fn_with_state(auth, auth_middleware))
}

/// The whole HTTP surface: login, health probes, API docs and `/api/v1`.
pub fn app_router(state: AppState) -> Router {
    let login = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .with_state(state.auth.clone());

    Router::new()
        .nest("/api/v1", api_v1_routes(state.auth.clone()))
        .with_state(state.clone())
        .merge(login)
        .nest("/health", health::health_routes(state.gateway.clone()))
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
}
