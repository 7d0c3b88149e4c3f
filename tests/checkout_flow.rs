use axum_checkout_api::{
    config::{PayPalConfig, StripeConfig},
    db::{DbPool, create_pool},
    dto::cart::AddToCartRequest,
    dto::checkout::PaymentStartedResponse,
    error::AppError,
    middleware::auth::AuthUser,
    models::{Order, OrderStatus, PaymentMethod},
    payment::{PayPalGateway, StripeGateway},
    services::{cart_service, checkout_service},
};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// Integration tests run against a real Postgres instance. They skip
// themselves when no database is configured in the environment.
async fn test_pool() -> anyhow::Result<Option<DbPool>> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run checkout flow tests."
                );
                return Ok(None);
            }
        };

    let pool = create_pool(&database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(Some(pool))
}

async fn create_user(pool: &DbPool) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, name, email, password_hash) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind("Test User")
        .bind(format!("user-{id}@example.com"))
        .bind("not-a-real-hash")
        .execute(pool)
        .await?;
    Ok(AuthUser { user_id: id })
}

async fn create_product(pool: &DbPool, price: i64) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO products (id, name, description, price) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(format!("Product {id}"))
        .bind("test product")
        .bind(price)
        .execute(pool)
        .await?;
    Ok(id)
}

async fn add(pool: &DbPool, user: &AuthUser, product_id: Uuid, quantity: i32) -> anyhow::Result<()> {
    cart_service::add_to_cart(
        pool,
        user,
        AddToCartRequest {
            product_id,
            quantity,
        },
    )
    .await?;
    Ok(())
}

async fn user_orders(pool: &DbPool, user: &AuthUser) -> anyhow::Result<Vec<Order>> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_all(pool)
        .await?;
    Ok(orders)
}

fn stripe_gateway(base: String) -> StripeGateway {
    StripeGateway::new(
        StripeConfig {
            secret_key: "sk_test".into(),
            api_base: base,
        },
        "usd",
    )
    .unwrap()
}

fn paypal_gateway(base: String) -> PayPalGateway {
    PayPalGateway::new(
        PayPalConfig {
            client_id: "client".into(),
            client_secret: "secret".into(),
            api_base: base,
        },
        "usd",
    )
    .unwrap()
}

async fn mount_paypal_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "A21AA",
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn adding_the_same_product_twice_merges_the_line() -> anyhow::Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let user = create_user(&pool).await?;
    let product = create_product(&pool, 100).await?;

    add(&pool, &user, product, 1).await?;
    add(&pool, &user, product, 2).await?;

    let items = cart_service::list_items(&pool, &user).await?;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 3);

    let count = cart_service::item_count(&pool, &user).await?;
    let sum: i64 = items.iter().map(|i| i.quantity as i64).sum();
    assert_eq!(count, sum);
    Ok(())
}

#[tokio::test]
async fn line_price_is_frozen_at_first_insertion() -> anyhow::Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let user = create_user(&pool).await?;
    let product = create_product(&pool, 100).await?;

    add(&pool, &user, product, 2).await?;

    // Catalog price changes must not leak into the cart or the checkout total.
    sqlx::query("UPDATE products SET price = 9999 WHERE id = $1")
        .bind(product)
        .execute(&pool)
        .await?;
    add(&pool, &user, product, 1).await?;

    let items = cart_service::list_items(&pool, &user).await?;
    assert_eq!(items[0].quantity, 3);
    assert_eq!(items[0].price, 100);

    let summary = checkout_service::checkout_summary(&pool, &user).await?;
    assert_eq!(summary.total, 300);
    assert_eq!(summary.shipping, 50);
    Ok(())
}

#[tokio::test]
async fn removing_a_foreign_cart_item_is_not_found() -> anyhow::Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let owner = create_user(&pool).await?;
    let intruder = create_user(&pool).await?;
    let product = create_product(&pool, 100).await?;

    add(&pool, &owner, product, 1).await?;
    let items = cart_service::list_items(&pool, &owner).await?;
    let item_id = items[0].id;

    let err = cart_service::remove_item(&pool, &intruder, item_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    // The owner's line is untouched.
    assert_eq!(cart_service::item_count(&pool, &owner).await?, 1);

    cart_service::remove_item(&pool, &owner, item_id).await?;
    assert_eq!(cart_service::item_count(&pool, &owner).await?, 0);
    Ok(())
}

#[tokio::test]
async fn checkout_summary_without_a_cart_is_not_found() -> anyhow::Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let user = create_user(&pool).await?;

    let err = checkout_service::checkout_summary(&pool, &user)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}

#[tokio::test]
async fn cash_on_delivery_creates_a_pending_order_and_clears_the_cart() -> anyhow::Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let user = create_user(&pool).await?;
    let product_a = create_product(&pool, 100).await?;
    let product_b = create_product(&pool, 250).await?;

    add(&pool, &user, product_a, 2).await?;
    add(&pool, &user, product_b, 1).await?;

    let order = checkout_service::cash_on_delivery(&pool, &user).await?;
    assert_eq!(order.total_amount, 450);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_method, PaymentMethod::CashOnDelivery);
    assert!(order.external_ref.is_none());

    let mut items: Vec<(Uuid, i32, i64)> = sqlx::query_as(
        "SELECT product_id, quantity, price FROM order_items WHERE order_id = $1",
    )
    .bind(order.id)
    .fetch_all(&pool)
    .await?;
    items.sort_by_key(|(_, _, price)| *price);
    assert_eq!(items, vec![(product_a, 2, 100), (product_b, 1, 250)]);

    assert_eq!(cart_service::item_count(&pool, &user).await?, 0);
    Ok(())
}

#[tokio::test]
async fn empty_cart_checkout_creates_no_order() -> anyhow::Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let user = create_user(&pool).await?;

    let err = checkout_service::cash_on_delivery(&pool, &user)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::EmptyCart));
    assert!(user_orders(&pool, &user).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn synchronous_card_success_completes_the_order() -> anyhow::Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "pi_sync_ok",
            "status": "succeeded"
        })))
        .mount(&server)
        .await;

    let user = create_user(&pool).await?;
    let product = create_product(&pool, 225).await?;
    add(&pool, &user, product, 2).await?;

    let gateway = stripe_gateway(server.uri());
    let response = checkout_service::start_gateway_checkout(
        &pool,
        &user,
        &gateway,
        PaymentMethod::Stripe,
        Some("pm_card_visa"),
        "http://app/api/payment-return",
        "http://front/cancel",
    )
    .await?;

    let order_id = match response {
        PaymentStartedResponse::Completed { order_id } => order_id,
        other => panic!("expected Completed, got {other:?}"),
    };

    let orders = user_orders(&pool, &user).await?;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, order_id);
    assert_eq!(orders[0].status, OrderStatus::Completed);
    assert_eq!(orders[0].total_amount, 450);
    assert_eq!(orders[0].external_ref.as_deref(), Some("pi_sync_ok"));

    assert_eq!(cart_service::item_count(&pool, &user).await?, 0);
    Ok(())
}

#[tokio::test]
async fn below_minimum_charge_is_rejected_without_an_order() -> anyhow::Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    // Total of 30 minor units is under the provider's floor of 50.
    let user = create_user(&pool).await?;
    let product = create_product(&pool, 15).await?;
    add(&pool, &user, product, 2).await?;

    let gateway = stripe_gateway("http://127.0.0.1:1".into());
    let err = checkout_service::start_gateway_checkout(
        &pool,
        &user,
        &gateway,
        PaymentMethod::Stripe,
        Some("pm_card_visa"),
        "http://app/api/payment-return",
        "http://front/cancel",
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        AppError::Gateway(_) | AppError::GatewayTimeout
    ));
    assert!(user_orders(&pool, &user).await?.is_empty());
    assert_eq!(cart_service::item_count(&pool, &user).await?, 2);
    Ok(())
}

#[tokio::test]
async fn wallet_capture_completion_finalizes_the_pending_order() -> anyhow::Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let server = MockServer::start().await;
    mount_paypal_token(&server).await;

    let external_ref = format!("PAYPAL-{}", Uuid::new_v4());
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": external_ref,
            "status": "CREATED",
            "links": [
                { "rel": "self", "href": "https://paypal.test/self" },
                { "rel": "approve", "href": "https://paypal.test/approve" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v2/checkout/orders/{external_ref}/capture")))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": external_ref,
            "status": "COMPLETED"
        })))
        .mount(&server)
        .await;

    let user = create_user(&pool).await?;
    let product = create_product(&pool, 450).await?;
    add(&pool, &user, product, 1).await?;

    let gateway = paypal_gateway(server.uri());
    let response = checkout_service::start_gateway_checkout(
        &pool,
        &user,
        &gateway,
        PaymentMethod::Paypal,
        None,
        "http://app/api/paypalsuccess",
        "http://front/cancel",
    )
    .await?;

    match response {
        PaymentStartedResponse::Redirect { redirect_url } => {
            assert_eq!(redirect_url, "https://paypal.test/approve");
        }
        other => panic!("expected Redirect, got {other:?}"),
    }

    // The order is persisted pending before the customer leaves, and the
    // cart survives until the capture confirms.
    let orders = user_orders(&pool, &user).await?;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Pending);
    assert_eq!(orders[0].external_ref.as_deref(), Some(external_ref.as_str()));
    assert_eq!(cart_service::item_count(&pool, &user).await?, 1);

    let order =
        checkout_service::finalize_gateway_checkout(&pool, &user, &gateway, &external_ref).await?;
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.total_amount, 450);
    assert_eq!(cart_service::item_count(&pool, &user).await?, 0);

    // A repeated callback finds no pending order for the reference.
    let err = checkout_service::finalize_gateway_checkout(&pool, &user, &gateway, &external_ref)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}

#[tokio::test]
async fn wallet_capture_failure_keeps_the_cart() -> anyhow::Result<()> {
    let Some(pool) = test_pool().await? else {
        return Ok(());
    };
    let server = MockServer::start().await;
    mount_paypal_token(&server).await;

    let external_ref = format!("PAYPAL-{}", Uuid::new_v4());
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": external_ref,
            "status": "CREATED",
            "links": [
                { "rel": "approve", "href": "https://paypal.test/approve" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v2/checkout/orders/{external_ref}/capture")))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": external_ref,
            "status": "DECLINED"
        })))
        .mount(&server)
        .await;

    let user = create_user(&pool).await?;
    let product = create_product(&pool, 450).await?;
    add(&pool, &user, product, 1).await?;

    let gateway = paypal_gateway(server.uri());
    checkout_service::start_gateway_checkout(
        &pool,
        &user,
        &gateway,
        PaymentMethod::Paypal,
        None,
        "http://app/api/paypalsuccess",
        "http://front/cancel",
    )
    .await?;

    let order =
        checkout_service::finalize_gateway_checkout(&pool, &user, &gateway, &external_ref).await?;
    assert_eq!(order.status, OrderStatus::Failed);

    // Failed capture: the cart is untouched so the customer can retry.
    assert_eq!(cart_service::item_count(&pool, &user).await?, 1);
    Ok(())
}
