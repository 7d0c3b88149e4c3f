use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::StripeConfig;
use crate::payment::{PaymentError, PaymentGateway, PaymentOutcome, PaymentResult, PaymentStart};

/// Smallest charge Stripe accepts, in minor units.
const MIN_CHARGE_MINOR_UNITS: i64 = 50;

/// Direct-charge backend. Creates a payment intent and confirms it in one
/// call; when the card issuer demands 3DS the customer is sent to the
/// intent's redirect URL and the charge is resolved on return.
pub struct StripeGateway {
    config: StripeConfig,
    currency: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    status: String,
    next_action: Option<NextAction>,
}

#[derive(Debug, Deserialize)]
struct NextAction {
    redirect_to_url: Option<RedirectToUrl>,
}

#[derive(Debug, Deserialize)]
struct RedirectToUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl StripeGateway {
    pub fn new(config: StripeConfig, currency: impl Into<String>) -> PaymentResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PaymentError::Network(e.to_string()))?;
        Ok(Self {
            config,
            currency: currency.into(),
            http,
        })
    }

    async fn parse_intent(&self, response: reqwest::Response) -> PaymentResult<IntentResponse> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(PaymentError::from_transport)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}: {body}"));
            return Err(PaymentError::Provider {
                provider: "stripe",
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| PaymentError::Malformed(e.to_string()))
    }
}

#[async_trait::async_trait]
impl PaymentGateway for StripeGateway {
    async fn begin_payment(
        &self,
        amount: i64,
        token: Option<&str>,
        return_url: &str,
        _cancel_url: &str,
    ) -> PaymentResult<PaymentStart> {
        if amount < MIN_CHARGE_MINOR_UNITS {
            return Err(PaymentError::BelowMinimum {
                amount,
                minimum: MIN_CHARGE_MINOR_UNITS,
            });
        }
        let token = token.ok_or(PaymentError::MissingToken)?;

        let params = [
            ("amount", amount.to_string()),
            ("currency", self.currency.clone()),
            ("payment_method", token.to_string()),
            ("confirmation_method", "manual".to_string()),
            ("confirm", "true".to_string()),
            ("return_url", return_url.to_string()),
        ];

        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.config.api_base))
            .bearer_auth(&self.config.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(PaymentError::from_transport)?;

        let intent = self.parse_intent(response).await?;
        tracing::debug!(intent_id = %intent.id, status = %intent.status, "payment intent created");

        match intent.status.as_str() {
            "succeeded" => Ok(PaymentStart::Completed {
                external_ref: intent.id,
            }),
            "requires_action" => {
                let redirect_url = intent
                    .next_action
                    .and_then(|a| a.redirect_to_url)
                    .map(|r| r.url)
                    .ok_or_else(|| {
                        PaymentError::Malformed("requires_action without redirect URL".into())
                    })?;
                Ok(PaymentStart::RedirectRequired {
                    external_ref: intent.id,
                    redirect_url,
                })
            }
            other => Err(PaymentError::Provider {
                provider: "stripe",
                message: format!("unexpected intent status {other}"),
            }),
        }
    }

    async fn finalize_payment(&self, external_ref: &str) -> PaymentResult<PaymentOutcome> {
        let response = self
            .http
            .get(format!(
                "{}/v1/payment_intents/{external_ref}",
                self.config.api_base
            ))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(PaymentError::from_transport)?;

        let intent = self.parse_intent(response).await?;
        if intent.status == "succeeded" {
            Ok(PaymentOutcome::Completed)
        } else {
            tracing::debug!(intent_id = %intent.id, status = %intent.status, "intent not succeeded");
            Ok(PaymentOutcome::Failed)
        }
    }

    fn provider_name(&self) -> &'static str {
        "stripe"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(base: String) -> StripeGateway {
        StripeGateway::new(
            StripeConfig {
                secret_key: "sk_test_123".into(),
                api_base: base,
            },
            "usd",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn rejects_amount_below_minimum_without_calling_provider() {
        let gw = gateway("http://127.0.0.1:1".into());
        let err = gw
            .begin_payment(30, Some("pm_card"), "http://app/return", "http://app/cancel")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::BelowMinimum { amount: 30, .. }));
    }

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let gw = gateway("http://127.0.0.1:1".into());
        let err = gw
            .begin_payment(500, None, "http://app/return", "http://app/cancel")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::MissingToken));
    }

    #[tokio::test]
    async fn synchronous_success_maps_to_completed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(body_string_contains("amount=450"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pi_123",
                "status": "succeeded"
            })))
            .mount(&server)
            .await;

        let gw = gateway(server.uri());
        let start = gw
            .begin_payment(450, Some("pm_card"), "http://app/return", "http://app/cancel")
            .await
            .unwrap();
        match start {
            PaymentStart::Completed { external_ref } => assert_eq!(external_ref, "pi_123"),
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn requires_action_carries_the_redirect_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pi_456",
                "status": "requires_action",
                "next_action": {
                    "redirect_to_url": { "url": "https://hooks.stripe.test/3ds" }
                }
            })))
            .mount(&server)
            .await;

        let gw = gateway(server.uri());
        let start = gw
            .begin_payment(450, Some("pm_card"), "http://app/return", "http://app/cancel")
            .await
            .unwrap();
        match start {
            PaymentStart::RedirectRequired {
                external_ref,
                redirect_url,
            } => {
                assert_eq!(external_ref, "pi_456");
                assert_eq!(redirect_url, "https://hooks.stripe.test/3ds");
            }
            other => panic!("expected RedirectRequired, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn provider_rejection_surfaces_the_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
                "error": { "message": "Your card was declined." }
            })))
            .mount(&server)
            .await;

        let gw = gateway(server.uri());
        let err = gw
            .begin_payment(450, Some("pm_card"), "http://app/return", "http://app/cancel")
            .await
            .unwrap_err();
        match err {
            PaymentError::Provider { provider, message } => {
                assert_eq!(provider, "stripe");
                assert_eq!(message, "Your card was declined.");
            }
            other => panic!("expected Provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn finalize_maps_intent_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/payment_intents/pi_ok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pi_ok",
                "status": "succeeded"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/payment_intents/pi_bad"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pi_bad",
                "status": "requires_payment_method"
            })))
            .mount(&server)
            .await;

        let gw = gateway(server.uri());
        assert_eq!(
            gw.finalize_payment("pi_ok").await.unwrap(),
            PaymentOutcome::Completed
        );
        assert_eq!(
            gw.finalize_payment("pi_bad").await.unwrap(),
            PaymentOutcome::Failed
        );
    }
}
