use crate::errors::ServiceError;
use crate::handlers::common::{created_response, csv_response, validate_input, ClearedResponse};
use crate::models::{MosRecord, NewMosRecord};
use crate::{ApiResponse, ApiResult, AppState};
use axum::{
    extract::{Json, Path, State},
    response::Response,
    routing::{get, post, put},
    Router,
};
use uuid::Uuid;

pub fn mos_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_mos).post(create_mos).delete(clear_mos))
        .route("/export", get(export_mos))
        .route("/:id", put(update_mos))
        .route("/:id/increment", post(increment_mos))
        .route("/:id/decrement", post(decrement_mos))
}

pub async fn list_mos(State(state): State<AppState>) -> ApiResult<Vec<MosRecord>> {
    Ok(Json(ApiResponse::success(state.services.mos.list().await)))
}

pub async fn create_mos(
    State(state): State<AppState>,
    Json(payload): Json<NewMosRecord>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let record = state.services.mos.create(payload).await?;
    Ok(created_response(record))
}

pub async fn update_mos(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewMosRecord>,
) -> ApiResult<MosRecord> {
    validate_input(&payload)?;
    let record = state.services.mos.update(id, payload).await?;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn increment_mos(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<MosRecord> {
    let record = state.services.mos.increment_quantity(id).await?;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn decrement_mos(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<MosRecord> {
    let record = state.services.mos.decrement_quantity(id).await?;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn clear_mos(State(state): State<AppState>) -> ApiResult<ClearedResponse> {
    let removed = state.services.mos.clear().await;
    Ok(Json(ApiResponse::success(ClearedResponse { removed })))
}

pub async fn export_mos(State(state): State<AppState>) -> Result<Response, ServiceError> {
    csv_response(state.services.mos.export_today().await)
}
