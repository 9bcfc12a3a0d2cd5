//! Common test utilities for integration tests
//!
//! Builds the full router over an in-memory store so the suites run without
//! a database server, and wraps the request/response plumbing.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use roster_api::app::{build_router, AppState};
use roster_shared::db::memory::MemoryUserStore;
use roster_shared::{DbClient, User, UserStore};
use serde_json::Value;
use std::sync::Arc;
use tower::Service as _;

/// Test context containing the router and its persistence client
pub struct TestContext {
    pub db: Arc<DbClient>,
    pub store: Arc<MemoryUserStore>,
    pub app: axum::Router,
}

impl TestContext {
    /// Router backed by a connected, empty in-memory store
    pub fn new() -> Self {
        let ctx = Self::disconnected();
        connect(&ctx);
        ctx
    }

    /// Router whose database has not connected yet
    pub fn disconnected() -> Self {
        let db = Arc::new(DbClient::new());
        let app = build_router(AppState::new(db.clone()));
        TestContext {
            db,
            store: Arc::new(MemoryUserStore::new()),
            app,
        }
    }

    /// Sends a request and returns the status and parsed JSON body
    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.call(request).await
    }

    /// Sends a prepared request
    pub async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().call(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                panic!("{} response is not JSON: {}", status, String::from_utf8_lossy(&bytes))
            })
        };

        (status, json)
    }

    /// Creates a user through the API, asserting 201
    pub async fn create_user(&self, body: Value) -> User {
        let (status, json) = self.send("POST", "/api/users", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "unexpected body: {json}");
        serde_json::from_value(json).unwrap()
    }

    /// Lists users through the API, asserting 200
    pub async fn list_users(&self) -> Vec<User> {
        let (status, json) = self.send("GET", "/api/users", None).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_value(json).unwrap()
    }
}

/// Attaches the context's store, as the startup retry loop would
pub fn connect(ctx: &TestContext) {
    let store: Arc<dyn UserStore> = ctx.store.clone();
    assert!(ctx.db.attach(store));
}
