use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, CartCount, CartList, RemovedFromCart},
    error::AppResult,
    middleware::auth::AuthUser,
    models::CartItem,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", get(cart_list))
        .route("/cart/add", post(add_to_cart))
        .route("/cart/count", get(cart_count))
        .route("/cart/remove/{id}", delete(remove_from_cart))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart lines with resolved products", body = CartList)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_list(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<CartList>> {
    let items = cart_service::list_items(&state.pool, &user).await?;
    Ok(Json(CartList { items }))
}

#[utoipa::path(
    post,
    path = "/api/cart/add",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Line added or quantity merged", body = CartItem),
        (status = 404, description = "Product not found"),
        (status = 422, description = "Invalid quantity"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<CartItem>> {
    let item = cart_service::add_to_cart(&state.pool, &user, payload).await?;
    Ok(Json(item))
}

#[utoipa::path(
    get,
    path = "/api/cart/count",
    responses(
        (status = 200, description = "Total quantity across the cart", body = CartCount)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_count(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<CartCount>> {
    let count = cart_service::item_count(&state.pool, &user).await?;
    Ok(Json(CartCount { count }))
}

#[utoipa::path(
    delete,
    path = "/api/cart/remove/{id}",
    params(
        ("id" = Uuid, Path, description = "Cart item ID")
    ),
    responses(
        (status = 200, description = "Line removed", body = RemovedFromCart),
        (status = 404, description = "Cart item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RemovedFromCart>> {
    cart_service::remove_item(&state.pool, &user, id).await?;
    Ok(Json(RemovedFromCart {
        success: "Item removed from cart".to_string(),
    }))
}
