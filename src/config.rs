use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Public base URL of this API, used to build provider return URLs.
    pub app_url: String,
    /// Base URL of the storefront the payment pages redirect back to.
    pub frontend_url: String,
    pub currency: String,
    pub stripe: StripeConfig,
    pub paypal: PayPalConfig,
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let app_url =
            env::var("APP_URL").unwrap_or_else(|_| format!("http://{host}:{port}"));
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let currency = env::var("CURRENCY").unwrap_or_else(|_| "usd".to_string());

        Ok(Self {
            database_url,
            host,
            port,
            app_url,
            frontend_url,
            currency,
            stripe: StripeConfig::from_env()?,
            paypal: PayPalConfig::from_env()?,
        })
    }
}

impl StripeConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            secret_key: env::var("STRIPE_SECRET_KEY")?,
            api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
        })
    }
}

impl PayPalConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            client_id: env::var("PAYPAL_CLIENT_ID")?,
            client_secret: env::var("PAYPAL_CLIENT_SECRET")?,
            api_base: env::var("PAYPAL_API_BASE")
                .unwrap_or_else(|_| "https://api-m.sandbox.paypal.com".to_string()),
        })
    }
}
