use axum::{
    Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};

use crate::{
    dto::checkout::{
        CheckoutSummary, OrderCreatedResponse, PaymentReturnQuery, PaymentStartedResponse,
        ProcessPaymentRequest, WalletReturnQuery,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{OrderStatus, PaymentMethod},
    services::checkout_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/checkout", get(checkout))
        .route("/process-payment", post(process_payment))
        .route("/payment-return", get(payment_return))
        .route("/checkout/cash-on-delivery", post(cash_on_delivery))
        .route("/create-payment", post(create_payment))
        .route("/paypalsuccess", get(paypal_success))
}

fn cancel_url(state: &AppState) -> String {
    format!("{}/cancel", state.config.frontend_url)
}

#[utoipa::path(
    get,
    path = "/api/checkout",
    responses(
        (status = 200, description = "Cart summary with totals and shipping", body = CheckoutSummary),
        (status = 404, description = "No cart for this user"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<CheckoutSummary>> {
    let summary = checkout_service::checkout_summary(&state.pool, &user).await?;
    Ok(Json(summary))
}

#[utoipa::path(
    post,
    path = "/api/process-payment",
    request_body = ProcessPaymentRequest,
    responses(
        (status = 200, description = "Order settled or redirect required", body = PaymentStartedResponse),
        (status = 400, description = "Empty cart or payment failed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn process_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ProcessPaymentRequest>,
) -> AppResult<Json<PaymentStartedResponse>> {
    let return_url = format!("{}/api/payment-return", state.config.app_url);
    let resp = checkout_service::start_gateway_checkout(
        &state.pool,
        &user,
        state.stripe.as_ref(),
        PaymentMethod::Stripe,
        Some(&payload.payment_method_id),
        &return_url,
        &cancel_url(&state),
    )
    .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payment-return",
    params(
        ("payment_intent" = Option<String>, Query, description = "Intent id from the provider redirect")
    ),
    responses(
        (status = 200, description = "Payment confirmed", body = OrderCreatedResponse),
        (status = 303, description = "Redirect to the cancel page on failure"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn payment_return(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PaymentReturnQuery>,
) -> AppResult<Response> {
    let cancel = cancel_url(&state);
    let Some(intent_id) = query.payment_intent else {
        return Ok(Redirect::to(&cancel).into_response());
    };

    let order = checkout_service::finalize_gateway_checkout(
        &state.pool,
        &user,
        state.stripe.as_ref(),
        &intent_id,
    )
    .await?;

    if order.status == OrderStatus::Completed {
        Ok(Json(OrderCreatedResponse { order_id: order.id }).into_response())
    } else {
        Ok(Redirect::to(&cancel).into_response())
    }
}

#[utoipa::path(
    post,
    path = "/api/checkout/cash-on-delivery",
    responses(
        (status = 200, description = "Pending order created", body = OrderCreatedResponse),
        (status = 400, description = "Empty cart"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn cash_on_delivery(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<OrderCreatedResponse>> {
    let order = checkout_service::cash_on_delivery(&state.pool, &user).await?;
    Ok(Json(OrderCreatedResponse { order_id: order.id }))
}

#[utoipa::path(
    post,
    path = "/api/create-payment",
    responses(
        (status = 200, description = "Approval redirect for the wallet provider", body = PaymentStartedResponse),
        (status = 400, description = "Empty cart or payment failed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<PaymentStartedResponse>> {
    let return_url = format!("{}/api/paypalsuccess", state.config.app_url);
    let resp = checkout_service::start_gateway_checkout(
        &state.pool,
        &user,
        state.paypal.as_ref(),
        PaymentMethod::Paypal,
        None,
        &return_url,
        &cancel_url(&state),
    )
    .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/paypalsuccess",
    params(
        ("token" = Option<String>, Query, description = "Provider order id from the approval redirect")
    ),
    responses(
        (status = 303, description = "Redirect to the success page, or to the cancel page on failure"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn paypal_success(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<WalletReturnQuery>,
) -> AppResult<Redirect> {
    let cancel = cancel_url(&state);
    let Some(token) = query.token else {
        return Ok(Redirect::to(&cancel));
    };

    let order = checkout_service::finalize_gateway_checkout(
        &state.pool,
        &user,
        state.paypal.as_ref(),
        &token,
    )
    .await?;

    if order.status == OrderStatus::Completed {
        let success = format!("{}/success/{}", state.config.frontend_url, order.id);
        Ok(Redirect::to(&success))
    } else {
        Ok(Redirect::to(&cancel))
    }
}
