use async_trait::async_trait;
use thiserror::Error;

pub mod paypal;
pub mod stripe;

pub use paypal::PayPalGateway;
pub use stripe::StripeGateway;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("amount {amount} is below the minimum charge of {minimum} minor units")]
    BelowMinimum { amount: i64, minimum: i64 },

    #[error("missing payment method token")]
    MissingToken,

    #[error("provider error [{provider}]: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    #[error("provider request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected provider response: {0}")]
    Malformed(String),
}

impl PaymentError {
    /// Classify a transport failure from the provider HTTP client.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PaymentError::Timeout
        } else {
            PaymentError::Network(err.to_string())
        }
    }
}

pub type PaymentResult<T> = Result<T, PaymentError>;

/// What a backend reports after the initial charge attempt.
#[derive(Debug, Clone)]
pub enum PaymentStart {
    /// Funds are confirmed; the order can be finalized immediately.
    Completed { external_ref: String },
    /// The customer must approve the payment on the provider's page first.
    RedirectRequired {
        external_ref: String,
        redirect_url: String,
    },
}

/// Final state of a previously started charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Completed,
    Failed,
}

/// Capability interface over the two provider backends. The workflow always
/// deals in integer minor units; unit conversion is the backend's concern.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Start a charge of `amount` minor units. `token` is the client-supplied
    /// payment method token where the backend needs one.
    async fn begin_payment(
        &self,
        amount: i64,
        token: Option<&str>,
        return_url: &str,
        cancel_url: &str,
    ) -> PaymentResult<PaymentStart>;

    /// Resolve the final state of the charge identified by `external_ref`
    /// when the customer returns from the provider.
    async fn finalize_payment(&self, external_ref: &str) -> PaymentResult<PaymentOutcome>;

    fn provider_name(&self) -> &'static str;
}

/// Render minor units as a decimal major-unit string with two places,
/// e.g. 450 -> "4.50".
pub fn format_major_units(minor: i64) -> String {
    format!("{}.{:02}", minor / 100, minor % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minor_units_as_major() {
        assert_eq!(format_major_units(450), "4.50");
        assert_eq!(format_major_units(50), "0.50");
        assert_eq!(format_major_units(100_000), "1000.00");
        assert_eq!(format_major_units(5), "0.05");
    }
}
