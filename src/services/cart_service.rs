use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::cart::{AddToCartRequest, CartItemDto},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, CartItem, Product},
};

#[derive(FromRow)]
struct CartItemWithProductRow {
    item_id: Uuid,
    quantity: i32,
    item_price: i64,
    product_id: Uuid,
    name: String,
    description: Option<String>,
    product_price: i64,
    product_created_at: DateTime<Utc>,
}

/// Returns the user's cart, creating an empty one on first use.
pub async fn get_or_create_cart(pool: &DbPool, user_id: Uuid) -> AppResult<Cart> {
    let existing: Option<Cart> = sqlx::query_as("SELECT * FROM carts WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    if let Some(cart) = existing {
        return Ok(cart);
    }

    let cart: Cart = sqlx::query_as("INSERT INTO carts (id, user_id) VALUES ($1, $2) RETURNING *")
        .bind(Uuid::new_v4())
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    tracing::info!(cart_id = %cart.id, user_id = %user_id, "cart_created");
    Ok(cart)
}

/// Adds a product to the cart. An existing line for the same product has its
/// quantity incremented; the unit price stays the one captured at first
/// insertion.
pub async fn add_to_cart(
    pool: &DbPool,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<CartItem> {
    if payload.quantity <= 0 {
        return Err(AppError::Validation(
            "quantity must be a positive integer".to_string(),
        ));
    }

    let product: Option<(i64,)> = sqlx::query_as("SELECT price FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(pool)
        .await?;
    let (price,) = product.ok_or(AppError::NotFound)?;

    let cart = get_or_create_cart(pool, user.user_id).await?;

    let exist: Option<CartItem> =
        sqlx::query_as("SELECT * FROM cart_items WHERE cart_id = $1 AND product_id = $2")
            .bind(cart.id)
            .bind(payload.product_id)
            .fetch_optional(pool)
            .await?;

    let cart_item = if let Some(item) = exist {
        sqlx::query_as::<_, CartItem>(
            "UPDATE cart_items SET quantity = quantity + $2 WHERE id = $1 RETURNING *",
        )
        .bind(item.id)
        .bind(payload.quantity)
        .fetch_one(pool)
        .await?
    } else {
        sqlx::query_as(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity, price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(cart.id)
        .bind(payload.product_id)
        .bind(payload.quantity)
        .bind(price)
        .fetch_one(pool)
        .await?
    };

    Ok(cart_item)
}

/// Lists the cart lines with their products resolved, in insertion order.
/// Empty when the user has no cart yet.
pub async fn list_items(pool: &DbPool, user: &AuthUser) -> AppResult<Vec<CartItemDto>> {
    let rows = sqlx::query_as::<_, CartItemWithProductRow>(
        r#"
        SELECT ci.id AS item_id, ci.quantity, ci.price AS item_price,
               p.id AS product_id, p.name, p.description,
               p.price AS product_price, p.created_at AS product_created_at
        FROM cart_items ci
        JOIN carts c ON c.id = ci.cart_id
        JOIN products p ON p.id = ci.product_id
        WHERE c.user_id = $1
        ORDER BY ci.created_at ASC
        "#,
    )
    .bind(user.user_id)
    .fetch_all(pool)
    .await?;

    let items = rows
        .into_iter()
        .map(|row| CartItemDto {
            id: row.item_id,
            quantity: row.quantity,
            price: row.item_price,
            product: Product {
                id: row.product_id,
                name: row.name,
                description: row.description,
                price: row.product_price,
                created_at: row.product_created_at,
            },
        })
        .collect();

    Ok(items)
}

/// Sum of quantities across the cart; 0 when no cart exists.
pub async fn item_count(pool: &DbPool, user: &AuthUser) -> AppResult<i64> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(ci.quantity), 0)
        FROM cart_items ci
        JOIN carts c ON c.id = ci.cart_id
        WHERE c.user_id = $1
        "#,
    )
    .bind(user.user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Deletes a single cart line. The delete joins through the cart so a line
/// belonging to another user is indistinguishable from a missing one.
pub async fn remove_item(pool: &DbPool, user: &AuthUser, cart_item_id: Uuid) -> AppResult<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM cart_items ci
        USING carts c
        WHERE ci.id = $1 AND ci.cart_id = c.id AND c.user_id = $2
        "#,
    )
    .bind(cart_item_id)
    .bind(user.user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Drops the cart row itself; lines go with it via cascade. The next
/// `get_or_create_cart` starts from scratch.
pub async fn clear_cart(pool: &DbPool, user_id: Uuid) -> AppResult<()> {
    sqlx::query("DELETE FROM carts WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    tracing::info!(user_id = %user_id, "cart_cleared");
    Ok(())
}
