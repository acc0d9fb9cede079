use crate::errors::ServiceError;
use crate::services::receiving::CsvExport;
use crate::ApiResponse;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input.validate().map_err(ServiceError::from)
}

/// Downloadable CSV with a `Content-Disposition` file name
pub fn csv_response(export: CsvExport) -> Result<Response, ServiceError> {
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        export.filename
    ))
    .map_err(|e| ServiceError::InternalError(format!("invalid export file name: {}", e)))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(export.content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.body,
    )
        .into_response())
}

/// Count of records removed by a bulk clear
#[derive(Debug, Serialize, Deserialize)]
pub struct ClearedResponse {
    pub removed: usize,
}
