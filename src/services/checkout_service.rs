use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::checkout::{CheckoutSummary, PaymentStartedResponse},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderStatus, PaymentMethod},
    payment::{PaymentGateway, PaymentOutcome, PaymentStart},
    services::cart_service,
};

/// Flat display-only shipping rate, in minor units. Never persisted into the
/// order total.
pub const SHIPPING_RATE: i64 = 50;

#[derive(Debug, FromRow)]
struct CartLine {
    product_id: Uuid,
    quantity: i32,
    price: i64,
}

/// Cart contents plus totals for the checkout page. 404 when the user has
/// never had a cart.
pub async fn checkout_summary(pool: &DbPool, user: &AuthUser) -> AppResult<CheckoutSummary> {
    let cart: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM carts WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_optional(pool)
        .await?;
    if cart.is_none() {
        return Err(AppError::NotFound);
    }

    let cart_items = cart_service::list_items(pool, user).await?;
    let total = cart_items
        .iter()
        .map(|item| item.quantity as i64 * item.price)
        .sum();

    Ok(CheckoutSummary {
        cart_items,
        total,
        shipping: SHIPPING_RATE,
    })
}

/// Starts a gateway-backed checkout: snapshots the cart, asks the backend to
/// charge the total, and persists the order. A synchronous success commits
/// the order `completed` and clears the cart; a redirect flow commits it
/// `pending` (with the provider's reference) before the customer leaves, so
/// an abandoned payment still leaves an audit trail.
pub async fn start_gateway_checkout(
    pool: &DbPool,
    user: &AuthUser,
    gateway: &dyn PaymentGateway,
    method: PaymentMethod,
    token: Option<&str>,
    return_url: &str,
    cancel_url: &str,
) -> AppResult<PaymentStartedResponse> {
    let lines = load_cart_lines(pool, user.user_id).await?;
    let total = cart_total(&lines);

    tracing::info!(
        user_id = %user.user_id,
        total,
        provider = gateway.provider_name(),
        "checkout_started"
    );

    match gateway
        .begin_payment(total, token, return_url, cancel_url)
        .await?
    {
        PaymentStart::Completed { external_ref } => {
            let order = store_order(
                pool,
                user.user_id,
                &lines,
                total,
                method,
                OrderStatus::Completed,
                Some(&external_ref),
            )
            .await?;
            cart_service::clear_cart(pool, user.user_id).await?;
            Ok(PaymentStartedResponse::Completed { order_id: order.id })
        }
        PaymentStart::RedirectRequired {
            external_ref,
            redirect_url,
        } => {
            store_order(
                pool,
                user.user_id,
                &lines,
                total,
                method,
                OrderStatus::Pending,
                Some(&external_ref),
            )
            .await?;
            Ok(PaymentStartedResponse::Redirect { redirect_url })
        }
    }
}

/// Resolves a redirect flow when the customer returns from the provider.
/// Locates the user's pending order by the provider reference and flips it
/// to `completed` (clearing the cart) or `failed` (cart untouched). The
/// returned order carries the final status; the caller decides how to
/// answer. A reference with no pending order — unknown, foreign, or already
/// finalized — is a 404.
pub async fn finalize_gateway_checkout(
    pool: &DbPool,
    user: &AuthUser,
    gateway: &dyn PaymentGateway,
    external_ref: &str,
) -> AppResult<Order> {
    let outcome = gateway.finalize_payment(external_ref).await?;

    let mut txn = pool.begin().await?;

    let pending: Option<Order> = sqlx::query_as(
        r#"
        SELECT * FROM orders
        WHERE external_ref = $1 AND user_id = $2 AND status = $3
        FOR UPDATE
        "#,
    )
    .bind(external_ref)
    .bind(user.user_id)
    .bind(OrderStatus::Pending)
    .fetch_optional(&mut *txn)
    .await?;
    let pending = pending.ok_or(AppError::NotFound)?;

    let status = match outcome {
        PaymentOutcome::Completed => OrderStatus::Completed,
        PaymentOutcome::Failed => OrderStatus::Failed,
    };

    let order: Order = sqlx::query_as("UPDATE orders SET status = $2 WHERE id = $1 RETURNING *")
        .bind(pending.id)
        .bind(status)
        .fetch_one(&mut *txn)
        .await?;

    txn.commit().await?;

    match outcome {
        PaymentOutcome::Completed => {
            tracing::info!(order_id = %order.id, "order_completed");
            cart_service::clear_cart(pool, user.user_id).await?;
        }
        PaymentOutcome::Failed => {
            tracing::warn!(
                order_id = %order.id,
                provider = gateway.provider_name(),
                "order_payment_failed"
            );
        }
    }

    Ok(order)
}

/// Cash on delivery: no gateway involved. The order is persisted `pending`
/// (terminally — fulfillment is out of scope) and the cart cleared.
pub async fn cash_on_delivery(pool: &DbPool, user: &AuthUser) -> AppResult<Order> {
    let lines = load_cart_lines(pool, user.user_id).await?;
    let total = cart_total(&lines);

    tracing::info!(user_id = %user.user_id, total, "checkout_started");

    let order = store_order(
        pool,
        user.user_id,
        &lines,
        total,
        PaymentMethod::CashOnDelivery,
        OrderStatus::Pending,
        None,
    )
    .await?;
    cart_service::clear_cart(pool, user.user_id).await?;
    Ok(order)
}

async fn load_cart_lines(pool: &DbPool, user_id: Uuid) -> AppResult<Vec<CartLine>> {
    let lines = sqlx::query_as::<_, CartLine>(
        r#"
        SELECT ci.product_id, ci.quantity, ci.price
        FROM cart_items ci
        JOIN carts c ON c.id = ci.cart_id
        WHERE c.user_id = $1
        ORDER BY ci.created_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }
    Ok(lines)
}

fn cart_total(lines: &[CartLine]) -> i64 {
    lines
        .iter()
        .map(|line| line.quantity as i64 * line.price)
        .sum()
}

/// Persists the order and its item snapshots in one transaction. Every
/// referenced product is re-checked inside the transaction; a vanished
/// product rolls the whole order back. The cart is never touched here —
/// clearing happens only after this commit, at the call sites.
async fn store_order(
    pool: &DbPool,
    user_id: Uuid,
    lines: &[CartLine],
    total: i64,
    method: PaymentMethod,
    status: OrderStatus,
    external_ref: Option<&str>,
) -> AppResult<Order> {
    let mut txn = pool.begin().await?;

    let order: Order = sqlx::query_as(
        r#"
        INSERT INTO orders (id, user_id, total_amount, payment_method, status, external_ref)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(total)
    .bind(method)
    .bind(status)
    .bind(external_ref)
    .fetch_one(&mut *txn)
    .await?;

    for line in lines {
        let product: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
            .bind(line.product_id)
            .fetch_optional(&mut *txn)
            .await?;
        if product.is_none() {
            // Dropping the transaction rolls back the order row as well.
            return Err(AppError::NotFound);
        }

        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, quantity, price)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.price)
        .execute(&mut *txn)
        .await?;
    }

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        user_id = %user_id,
        total,
        method = ?method,
        status = ?status,
        "order_created"
    );

    Ok(order)
}
