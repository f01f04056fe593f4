use crate::error::AppError;
use crate::openapi::openapi_json;
use axum::{
    http::{StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};

/// Returns the service's OpenAPI document.
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "OpenAPI",
    responses(
        (status = 200, description = "OpenAPI document", body = String, content_type = "application/json"),
    )
)]
pub async fn get_openapi_json() -> Result<impl IntoResponse, AppError> {
    let spec = openapi_json().map_err(|err| AppError::InternalError(err.into()))?;
    Ok((StatusCode::OK, [(CONTENT_TYPE, "application/json")], spec))
}
