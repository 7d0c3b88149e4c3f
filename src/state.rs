use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::payment::{PayPalGateway, StripeGateway};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub stripe: Arc<StripeGateway>,
    pub paypal: Arc<PayPalGateway>,
    pub config: Arc<AppConfig>,
}
