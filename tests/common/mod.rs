#![allow(dead_code)]

use std::str::FromStr;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use beach_club_api::{app_router, auth::hash_password, config::AppConfig, AppState};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub const OPERATOR: &str = "caixa";
pub const OPERATOR_PASSWORD: &str = "areia-quente-2024";
const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Helper harness for spinning up the application backed by a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    token: String,
    _db_dir: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir for test database");
        let db_path = db_dir.path().join("beach_club_test.db");
        let cfg = test_config(format!("sqlite://{}?mode=rwc", db_path.display()));

        let state = AppState::new(cfg);
        state
            .gateway
            .connection()
            .await
            .expect("test database should connect and migrate");

        let token = state
            .auth
            .issue_token(OPERATOR)
            .expect("issue operator token")
            .access_token;

        Self {
            router: app_router(state.clone()),
            state,
            token,
            _db_dir: db_dir,
        }
    }

    /// Application whose store can never be reached.
    pub fn unreachable() -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir");
        let missing = db_dir.path().join("missing").join("nowhere.db");
        // no `mode=rwc`: SQLite refuses to create the file
        let cfg = test_config(format!("sqlite://{}", missing.display()));

        let state = AppState::new(cfg);
        let token = state
            .auth
            .issue_token(OPERATOR)
            .expect("issue operator token")
            .access_token;

        Self {
            router: app_router(state.clone()),
            state,
            token,
            _db_dir: db_dir,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for authenticated JSON requests.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    /// Authenticated request that must succeed; returns the envelope's `data`.
    pub async fn data(&self, method: Method, uri: &str, body: Option<Value>) -> Value {
        let response = self.request_authenticated(method.clone(), uri, body).await;
        let status = response.status();
        let json = response_json(response).await;
        assert!(status.is_success(), "{method} {uri} failed with {status}: {json}");
        json["data"].clone()
    }

    pub async fn register_client(&self, full_name: &str) -> Value {
        self.data(
            Method::POST,
            "/api/v1/clients",
            Some(json!({ "full_name": full_name })),
        )
        .await
    }

    pub async fn create_product(&self, name: &str, quantity: i32, unit_value: &str) -> Value {
        self.data(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "supplier": "Distribuidora Litoral",
                "product_name": name,
                "quantity": quantity,
                "unit_value": unit_value,
            })),
        )
        .await
    }

    pub async fn create_order(&self, client_id: &str, product_id: &str, quantity: i32) -> Value {
        self.data(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "client_id": client_id,
                "product_id": product_id,
                "quantity": quantity,
            })),
        )
        .await
    }
}

fn test_config(database_url: String) -> AppConfig {
    let mut cfg = AppConfig::new(database_url, TEST_JWT_SECRET.to_string(), "test".to_string());
    cfg.auto_migrate = true;
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg.db_connect_timeout_secs = 2;
    cfg.db_acquire_timeout_secs = 5;
    cfg.operator_username = OPERATOR.to_string();
    cfg.operator_password_hash = Some(hash_password(OPERATOR_PASSWORD).expect("hash test password"));
    cfg
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Reads a decimal that the API serialized as a string or a number.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("expected a decimal, got {other}"),
    }
}

pub fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("id field").to_string()
}

/// Percent-encodes a composite key for use in a query string.
pub fn encode_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => c.to_string(),
            other => {
                let mut buf = [0u8; 4];
                other
                    .encode_utf8(&mut buf)
                    .bytes()
                    .map(|b| format!("%{b:02X}"))
                    .collect()
            }
        })
        .collect()
}
