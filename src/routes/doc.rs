use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{AuthResponse, CurrentUserResponse, LoginRequest, RegisterRequest},
        cart::{AddToCartRequest, CartCount, CartItemDto, CartList, RemovedFromCart},
        checkout::{
            CheckoutSummary, OrderCreatedResponse, PaymentStartedResponse, ProcessPaymentRequest,
        },
        orders::OrderDetails,
    },
    models::{CartItem, Order, OrderItem, OrderStatus, PaymentMethod, Product, User},
    routes::{auth, cart, checkout, health, health::HealthData, orders},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::current_user,
        cart::cart_list,
        cart::add_to_cart,
        cart::cart_count,
        cart::remove_from_cart,
        checkout::checkout,
        checkout::process_payment,
        checkout::payment_return,
        checkout::cash_on_delivery,
        checkout::create_payment,
        checkout::paypal_success,
        orders::order_details
    ),
    components(
        schemas(
            HealthData,
            User,
            Product,
            CartItem,
            Order,
            OrderItem,
            OrderStatus,
            PaymentMethod,
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            CurrentUserResponse,
            AddToCartRequest,
            CartItemDto,
            CartList,
            CartCount,
            RemovedFromCart,
            CheckoutSummary,
            ProcessPaymentRequest,
            PaymentStartedResponse,
            OrderCreatedResponse,
            OrderDetails
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration and token issuing"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Checkout", description = "Checkout and payment endpoints"),
        (name = "Orders", description = "Order lookup"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
