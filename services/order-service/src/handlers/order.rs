use crate::error::AppError;
use crate::models::ErrorResponse;
use crate::state::AppState;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header::LOCATION},
    response::IntoResponse,
};
use order_types::order::{NewOrder, OrderRecord};

/// `POST /orders`
///
/// Persists the order, announces it on the queue, and answers `201` with a
/// `Location` pointing at the new resource.
#[utoipa::path(
    post,
    path = "/orders",
    tag = "Orders",
    request_body = NewOrder,
    responses(
        (
            status = 201,
            description = "Order stored and published",
            body = OrderRecord,
            headers(("Location" = String, description = "Resource locator /orders/{id}"))
        ),
        (status = 400, description = "Invalid order", body = ErrorResponse),
        (status = 502, description = "Order stored but the queue rejected or missed the announcement", body = ErrorResponse),
        (status = 503, description = "Order store unavailable, nothing was stored", body = ErrorResponse),
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<NewOrder>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;

    let record = state.ingestion.create_order(request).await?;
    let location = format!("/orders/{}", record.id);

    Ok((StatusCode::CREATED, [(LOCATION, location)], Json(record)))
}
