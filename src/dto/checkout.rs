use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::cart::CartItemDto;

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutSummary {
    #[serde(rename = "cartItems")]
    pub cart_items: Vec<CartItemDto>,
    /// Σ quantity × snapshot price, in minor units.
    pub total: i64,
    /// Display-only flat shipping rate; not part of the order total.
    pub shipping: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProcessPaymentRequest {
    /// Provider-issued payment method token for the direct charge.
    pub payment_method_id: String,
}

/// Either the order settled synchronously or the customer must be redirected
/// to the provider to approve it.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum PaymentStartedResponse {
    Completed {
        #[serde(rename = "orderId")]
        order_id: Uuid,
    },
    Redirect { redirect_url: String },
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderCreatedResponse {
    #[serde(rename = "orderId")]
    pub order_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentReturnQuery {
    /// Intent id echoed back by the provider redirect.
    pub payment_intent: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WalletReturnQuery {
    /// Provider order id echoed back by the approval redirect.
    pub token: Option<String>,
}
