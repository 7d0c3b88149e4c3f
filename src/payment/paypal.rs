use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::PayPalConfig;
use crate::payment::{
    PaymentError, PaymentGateway, PaymentOutcome, PaymentResult, PaymentStart, format_major_units,
};

/// Redirect-wallet backend. `begin_payment` creates a provider order and
/// hands back the approval URL; the charge settles in `finalize_payment`
/// once the customer returns and the order is captured.
pub struct PayPalGateway {
    config: PayPalConfig,
    currency_code: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: Option<String>,
    links: Option<Vec<Link>>,
}

#[derive(Debug, Deserialize)]
struct Link {
    rel: String,
    href: String,
}

#[derive(Debug, Deserialize)]
struct CaptureResponse {
    status: Option<String>,
}

impl PayPalGateway {
    pub fn new(config: PayPalConfig, currency: &str) -> PaymentResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PaymentError::Network(e.to_string()))?;
        Ok(Self {
            config,
            currency_code: currency.to_uppercase(),
            http,
        })
    }

    async fn access_token(&self) -> PaymentResult<String> {
        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.config.api_base))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(PaymentError::from_transport)?;

        if !response.status().is_success() {
            return Err(PaymentError::Provider {
                provider: "paypal",
                message: format!("token request failed with HTTP {}", response.status()),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Malformed(e.to_string()))?;
        Ok(token.access_token)
    }
}

#[async_trait::async_trait]
impl PaymentGateway for PayPalGateway {
    async fn begin_payment(
        &self,
        amount: i64,
        _token: Option<&str>,
        return_url: &str,
        cancel_url: &str,
    ) -> PaymentResult<PaymentStart> {
        let access_token = self.access_token().await?;

        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "amount": {
                    "currency_code": self.currency_code,
                    "value": format_major_units(amount),
                }
            }],
            "application_context": {
                "return_url": return_url,
                "cancel_url": cancel_url,
            }
        });

        let response = self
            .http
            .post(format!("{}/v2/checkout/orders", self.config.api_base))
            .bearer_auth(&access_token)
            .json(&body)
            .send()
            .await
            .map_err(PaymentError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PaymentError::Provider {
                provider: "paypal",
                message: format!("order creation failed with HTTP {status}: {detail}"),
            });
        }

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Malformed(e.to_string()))?;

        let external_ref = order.id.ok_or_else(|| {
            PaymentError::Malformed("provider order response has no id".into())
        })?;
        let redirect_url = order
            .links
            .unwrap_or_default()
            .into_iter()
            .find(|l| l.rel == "approve")
            .map(|l| l.href)
            .ok_or_else(|| PaymentError::Malformed("provider order has no approve link".into()))?;

        tracing::debug!(order_id = %external_ref, "provider order created");
        Ok(PaymentStart::RedirectRequired {
            external_ref,
            redirect_url,
        })
    }

    async fn finalize_payment(&self, external_ref: &str) -> PaymentResult<PaymentOutcome> {
        let access_token = self.access_token().await?;

        let response = self
            .http
            .post(format!(
                "{}/v2/checkout/orders/{external_ref}/capture",
                self.config.api_base
            ))
            .bearer_auth(&access_token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(PaymentError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            tracing::debug!(order_id = %external_ref, %status, detail, "capture rejected");
            return Ok(PaymentOutcome::Failed);
        }

        let capture: CaptureResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Malformed(e.to_string()))?;

        if capture.status.as_deref() == Some("COMPLETED") {
            Ok(PaymentOutcome::Completed)
        } else {
            tracing::debug!(order_id = %external_ref, status = ?capture.status, "capture not completed");
            Ok(PaymentOutcome::Failed)
        }
    }

    fn provider_name(&self) -> &'static str {
        "paypal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(base: String) -> PayPalGateway {
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

    async fn mount_token(server: &MockServer) {
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
    async fn order_creation_returns_the_approval_redirect() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders"))
            .and(body_string_contains("\"value\":\"4.50\""))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "8XY12345",
                "status": "CREATED",
                "links": [
                    { "rel": "self", "href": "https://paypal.test/self" },
                    { "rel": "approve", "href": "https://paypal.test/approve" }
                ]
            })))
            .mount(&server)
            .await;

        let gw = gateway(server.uri());
        let start = gw
            .begin_payment(450, None, "http://app/return", "http://app/cancel")
            .await
            .unwrap();
        match start {
            PaymentStart::RedirectRequired {
                external_ref,
                redirect_url,
            } => {
                assert_eq!(external_ref, "8XY12345");
                assert_eq!(redirect_url, "https://paypal.test/approve");
            }
            other => panic!("expected RedirectRequired, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn order_without_id_is_an_error() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({ "status": "CREATED" })),
            )
            .mount(&server)
            .await;

        let gw = gateway(server.uri());
        let err = gw
            .begin_payment(450, None, "http://app/return", "http://app/cancel")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Malformed(_)));
    }

    #[tokio::test]
    async fn capture_status_maps_to_outcome() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/ok_ref/capture"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "ok_ref",
                "status": "COMPLETED"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/declined_ref/capture"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "declined_ref",
                "status": "DECLINED"
            })))
            .mount(&server)
            .await;

        let gw = gateway(server.uri());
        assert_eq!(
            gw.finalize_payment("ok_ref").await.unwrap(),
            PaymentOutcome::Completed
        );
        assert_eq!(
            gw.finalize_payment("declined_ref").await.unwrap(),
            PaymentOutcome::Failed
        );
    }
}
