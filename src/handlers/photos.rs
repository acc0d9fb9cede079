use crate::errors::ServiceError;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

/// `GET /p/:short_id` sends the browser on to the stored photo
pub async fn resolve_short_link(
    State(state): State<AppState>,
    Path(short_id): Path<String>,
) -> Result<Redirect, ServiceError> {
    let target = state.services.photos.resolve(&short_id).await?;
    debug!(short_id = %short_id, target = %target, "short link resolved");
    Ok(Redirect::temporary(&target))
}

/// Serves photo bytes held by the in-process object store
pub async fn get_photo(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ServiceError> {
    let object = state
        .services
        .photos
        .object(&format!("photos/{}", path))
        .await?;
    let content_type = HeaderValue::from_str(&object.content_type)
        .map_err(|e| ServiceError::InternalError(format!("invalid content type: {}", e)))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        object.bytes,
    )
        .into_response())
}
