use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::orders::OrderDetails, error::AppResult, services::order_service, state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/order-details/{order_id}", get(order_details))
}

#[utoipa::path(
    get,
    path = "/api/order-details/{order_id}",
    params(
        ("order_id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order with item snapshots", body = OrderDetails),
        (status = 404, description = "Order not found"),
    ),
    tag = "Orders"
)]
pub async fn order_details(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderDetails>> {
    let details = order_service::order_details(&state.pool, order_id).await?;
    Ok(Json(details))
}
