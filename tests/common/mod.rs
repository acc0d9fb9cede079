#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    Router,
};
use serde_json::Value;
use storefloor_api::{
    build_router,
    config::AppConfig,
    events::{self, EventSender},
    services::DuplicatePolicy,
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Helper harness for driving the full router in process.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a test application with default settings.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_duplicate_policy(policy: DuplicatePolicy) -> Self {
        Self::with_config(|cfg| cfg.duplicate_policy = policy).await
    }

    /// Construct a test application after adjusting the default config.
    pub async fn with_config<F>(adjust: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut cfg = AppConfig::new("127.0.0.1".to_string(), 18_080, "test".to_string());
        cfg.public_base_url = "https://floor.test".to_string();
        adjust(&mut cfg);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));
        let state = AppState::new(cfg, EventSender::new(event_tx));

        Self {
            router: build_router(state.clone()),
            state,
            _event_task: event_task,
        }
    }

    /// Send a request against the router with an optional JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

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

    /// Send a plain-text body, as a CSV upload does.
    pub async fn request_text(
        &self,
        method: Method,
        uri: &str,
        body: &str,
    ) -> axum::response::Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "text/csv")
            .body(Body::from(body.to_string()))
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice(&bytes).expect("body is not json")
}

pub async fn response_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    String::from_utf8(bytes.to_vec()).expect("body is not utf-8")
}
