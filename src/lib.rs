//! Storefloor API Library
//!
//! Store operations backend: inventory receiving with batch BOL stamping,
//! duplicate detection, CSV report export/import, photo short links and MOS
//! markout tracking.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod models;
pub mod reports;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use handlers::inventory::InventoryHandlerState;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(config: config::AppConfig, event_sender: events::EventSender) -> Self {
        let services = handlers::AppServices::new(&config, event_sender.clone());
        Self {
            config,
            event_sender,
            services,
        }
    }
}

impl InventoryHandlerState for AppState {
    fn receiving_service(&self) -> &services::ReceivingService {
        &self.services.receiving
    }
}

// Common response wrappers
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize)]
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

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success(data)
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Versioned JSON and CSV endpoints
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(api_status))
        .nest(
            "/inventory",
            handlers::inventory::inventory_router::<AppState>(),
        )
        .nest("/mos", handlers::mos::mos_router())
}

/// Full application router with request ids, HTTP tracing and body limits
pub fn build_router(state: AppState) -> Router {
    let max_body_size = state.config.max_body_size;

    Router::new()
        .route("/health", get(health_check))
        .route("/p/:short_id", get(handlers::photos::resolve_short_link))
        .route("/photos/*path", get(handlers::photos::get_photo))
        .nest("/api/v1", api_v1_routes())
        .layer(DefaultBodyLimit::max(max_body_size))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let version = env!("CARGO_PKG_VERSION");
    let status_data = json!({
        "status": "ok",
        "version": version,
        "service": "storefloor-api",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.environment,
        "duplicate_policy": state.config.duplicate_policy,
        "photo_required": state.config.photo_required,
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let inventory_records = state.services.receiving.list().await.len();
    let mos_records = state.services.mos.list().await.len();

    let health_data = json!({
        "status": "healthy",
        "checks": {
            "inventory_records": inventory_records,
            "mos_records": mos_records,
            "batch": state.services.receiving.current_batch().await,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
