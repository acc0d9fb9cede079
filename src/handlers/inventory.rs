use crate::errors::ServiceError;
use crate::handlers::common::{created_response, csv_response, ClearedResponse};
use crate::models::InventoryRecord;
use crate::services::receiving::{ImportSummary, ReceivingService};
use crate::services::submission::{ReceivingForm, SubmissionOutcome, SubmitMode};
use crate::{ApiResponse, ApiResult};
use axum::{
    extract::{Json, Path, Query, State},
    response::Response,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Trait for inventory handler state that provides access to the receiving service
pub trait InventoryHandlerState: Clone + Send + Sync + 'static {
    fn receiving_service(&self) -> &ReceivingService;
}

#[derive(Debug, Deserialize)]
pub struct SetBatchRequest {
    pub bol_number: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub bol_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    /// Line written above the table, e.g. a photo folder URL
    pub banner: Option<String>,
}

/// Create the inventory router
pub fn inventory_router<S>() -> Router<S>
where
    S: InventoryHandlerState,
{
    Router::new()
        .route(
            "/",
            get(list_inventory::<S>)
                .post(create_inventory::<S>)
                .delete(clear_inventory::<S>),
        )
        .route("/batch", get(get_batch::<S>).put(set_batch::<S>))
        .route("/export", get(export_inventory::<S>))
        .route("/import", post(import_inventory::<S>))
        .route("/:id", get(get_inventory::<S>).put(update_inventory::<S>))
        .route("/:id/increment", post(increment_inventory::<S>))
        .route("/:id/decrement", post(decrement_inventory::<S>))
}

/// List received records, newest first
pub async fn list_inventory<S>(State(state): State<S>) -> ApiResult<Vec<InventoryRecord>>
where
    S: InventoryHandlerState,
{
    let records = state.receiving_service().list().await;
    Ok(Json(ApiResponse::success(records)))
}

pub async fn get_inventory<S>(
    State(state): State<S>,
    Path(id): Path<Uuid>,
) -> ApiResult<InventoryRecord>
where
    S: InventoryHandlerState,
{
    let record = state.receiving_service().get(id).await?;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn get_batch<S>(State(state): State<S>) -> ApiResult<BatchResponse>
where
    S: InventoryHandlerState,
{
    let bol_number = state.receiving_service().current_batch().await;
    Ok(Json(ApiResponse::success(BatchResponse { bol_number })))
}

/// Start a receiving batch; every later submission is stamped with its BOL
pub async fn set_batch<S>(
    State(state): State<S>,
    Json(payload): Json<SetBatchRequest>,
) -> ApiResult<BatchResponse>
where
    S: InventoryHandlerState,
{
    let bol_number = state
        .receiving_service()
        .start_batch(&payload.bol_number)
        .await?;
    Ok(Json(ApiResponse::success(BatchResponse {
        bol_number: Some(bol_number),
    })))
}

/// Submit the receiving form as a new record
pub async fn create_inventory<S>(
    State(state): State<S>,
    Json(form): Json<ReceivingForm>,
) -> Result<Response, ServiceError>
where
    S: InventoryHandlerState,
{
    let outcome = state
        .receiving_service()
        .submit(form, SubmitMode::Create)
        .await?;
    Ok(created_response(outcome))
}

/// Submit the receiving form over an existing record
pub async fn update_inventory<S>(
    State(state): State<S>,
    Path(id): Path<Uuid>,
    Json(form): Json<ReceivingForm>,
) -> ApiResult<SubmissionOutcome>
where
    S: InventoryHandlerState,
{
    let outcome = state
        .receiving_service()
        .submit(form, SubmitMode::Edit(id))
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn increment_inventory<S>(
    State(state): State<S>,
    Path(id): Path<Uuid>,
) -> ApiResult<InventoryRecord>
where
    S: InventoryHandlerState,
{
    let record = state.receiving_service().increment_quantity(id).await?;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn decrement_inventory<S>(
    State(state): State<S>,
    Path(id): Path<Uuid>,
) -> ApiResult<InventoryRecord>
where
    S: InventoryHandlerState,
{
    let record = state.receiving_service().decrement_quantity(id).await?;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn clear_inventory<S>(State(state): State<S>) -> ApiResult<ClearedResponse>
where
    S: InventoryHandlerState,
{
    let removed = state.receiving_service().clear().await;
    Ok(Json(ApiResponse::success(ClearedResponse { removed })))
}

/// Download the collection as `inventory-report-M-D-YYYY.csv`
pub async fn export_inventory<S>(
    State(state): State<S>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ServiceError>
where
    S: InventoryHandlerState,
{
    let export = state
        .receiving_service()
        .export_today(query.banner.as_deref())
        .await;
    csv_response(export)
}

/// Replace the collection with the rows of an uploaded report
pub async fn import_inventory<S>(State(state): State<S>, body: String) -> ApiResult<ImportSummary>
where
    S: InventoryHandlerState,
{
    let summary = state.receiving_service().import(&body).await?;
    Ok(Json(ApiResponse::success(summary)))
}
