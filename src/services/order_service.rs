use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::orders::OrderDetails,
    error::{AppError, AppResult},
    models::{Order, OrderItem},
    services::checkout_service::SHIPPING_RATE,
};

pub async fn order_details(pool: &DbPool, order_id: Uuid) -> AppResult<OrderDetails> {
    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await?;
    let order = order.ok_or(AppError::NotFound)?;

    let items: Vec<OrderItem> =
        sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at ASC")
            .bind(order.id)
            .fetch_all(pool)
            .await?;

    Ok(OrderDetails {
        order,
        items,
        shipping: SHIPPING_RATE,
    })
}
