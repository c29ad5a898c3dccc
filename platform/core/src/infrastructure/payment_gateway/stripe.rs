// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Stripe Payment Gateway Adapter
//
// Anti-Corruption Layer for the Stripe REST API. Requests are form-encoded
// and authenticated with the secret key as a bearer token; responses are
// translated into the gateway domain types.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::domain::payment_gateway::{GatewayError, GatewayRefund, IntentStatus, PaymentGateway, PaymentIntent};

pub struct StripeGateway {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Deserialize)]
struct StripePaymentIntent {
    id: String,
    client_secret: Option<String>,
    status: IntentStatus,
}

#[derive(Deserialize)]
struct StripeRefund {
    id: String,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.endpoint, path)
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
        subject: &str,
    ) -> Result<T, GatewayError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message.or(b.error.code))
                .unwrap_or(body);

            return Err(if status == 401 || status == 403 {
                GatewayError::Authentication(message)
            } else if status == 429 {
                GatewayError::RateLimit
            } else if status == 404 {
                GatewayError::IntentNotFound(subject.to_string())
            } else if status.is_client_error() {
                GatewayError::Rejected(message)
            } else {
                GatewayError::Provider(format!("HTTP {}: {}", status, message))
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Provider(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<PaymentIntent, GatewayError> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), amount_cents.to_string()),
            ("currency".to_string(), currency.to_string()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        for (key, value) in metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        let intent: StripePaymentIntent = self
            .send(self.client.post(self.url("payment_intents")).form(&form), "new intent")
            .await?;

        Ok(PaymentIntent {
            id: intent.id,
            client_secret: intent.client_secret,
            status: intent.status,
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        let intent: StripePaymentIntent = self
            .send(
                self.client.get(self.url(&format!("payment_intents/{}", intent_id))),
                intent_id,
            )
            .await?;

        Ok(PaymentIntent {
            id: intent.id,
            client_secret: intent.client_secret,
            status: intent.status,
        })
    }

    async fn refund(&self, intent_id: &str, idempotency_key: &str) -> Result<GatewayRefund, GatewayError> {
        let form = [("payment_intent", intent_id)];
        let request = self
            .client
            .post(self.url("refunds"))
            .header("Idempotency-Key", format!("refund-{}", idempotency_key))
            .form(&form);
        let refund: StripeRefund = self.send(request, intent_id).await?;

        Ok(GatewayRefund { id: refund.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_create_intent_posts_form() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/payment_intents")
            .match_header("authorization", "Bearer sk_test_abc")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("amount".into(), "4900".into()),
                Matcher::UrlEncoded("currency".into(), "usd".into()),
                Matcher::UrlEncoded("metadata[course_id]".into(), "c1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"pi_123","client_secret":"pi_123_secret","status":"requires_payment_method"}"#)
            .create_async()
            .await;

        let gateway = StripeGateway::new(server.url(), "sk_test_abc".into());
        let metadata = BTreeMap::from([("course_id".to_string(), "c1".to_string())]);
        let intent = gateway.create_intent(4900, "usd", &metadata).await.unwrap();

        mock.assert_async().await;
        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.client_secret.as_deref(), Some("pi_123_secret"));
        assert_eq!(intent.status, IntentStatus::RequiresPaymentMethod);
    }

    #[tokio::test]
    async fn test_retrieve_intent_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/payment_intents/pi_9")
            .with_status(200)
            .with_body(r#"{"id":"pi_9","client_secret":null,"status":"succeeded"}"#)
            .create_async()
            .await;

        let gateway = StripeGateway::new(server.url(), "sk".into());
        let intent = gateway.retrieve_intent("pi_9").await.unwrap();
        assert_eq!(intent.status, IntentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_unknown_status_is_tolerated() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/payment_intents/pi_new")
            .with_status(200)
            .with_body(r#"{"id":"pi_new","status":"some_future_state"}"#)
            .create_async()
            .await;

        let gateway = StripeGateway::new(server.url(), "sk".into());
        let intent = gateway.retrieve_intent("pi_new").await.unwrap();
        assert_eq!(intent.status, IntentStatus::Unknown);
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/refunds")
            .with_status(400)
            .with_body(r#"{"error":{"code":"charge_already_refunded","message":"Charge has already been refunded."}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v1/payment_intents/pi_missing")
            .with_status(404)
            .with_body(r#"{"error":{"code":"resource_missing"}}"#)
            .create_async()
            .await;

        let gateway = StripeGateway::new(format!("{}/", server.url()), "sk".into());
        match gateway.refund("pi_1", "pay_1").await {
            Err(GatewayError::Rejected(msg)) => assert_eq!(msg, "Charge has already been refunded."),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            gateway.retrieve_intent("pi_missing").await,
            Err(GatewayError::IntentNotFound(id)) if id == "pi_missing"
        ));
    }

    #[tokio::test]
    async fn test_refund_sends_idempotency_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/refunds")
            .match_header("idempotency-key", "refund-7f1c")
            .match_body(Matcher::UrlEncoded("payment_intent".into(), "pi_paid".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"re_123","status":"succeeded"}"#)
            .create_async()
            .await;

        let gateway = StripeGateway::new(server.url(), "sk".into());
        let refund = gateway.refund("pi_paid", "7f1c").await.unwrap();
        assert_eq!(refund.id, "re_123");
        mock.assert_async().await;
    }
}
