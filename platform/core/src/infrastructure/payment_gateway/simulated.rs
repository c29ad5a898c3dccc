// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Simulated Payment Gateway
//
// In-process stand-in for the card processor, used in development and tests.
// Intents live in a map; their status can be driven from outside to mimic the
// customer completing (or abandoning) checkout.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::domain::payment_gateway::{GatewayError, GatewayRefund, IntentStatus, PaymentGateway, PaymentIntent};

#[derive(Debug, Clone)]
struct SimulatedIntent {
    amount_cents: i64,
    currency: String,
    metadata: BTreeMap<String, String>,
    status: IntentStatus,
    /// (idempotency key, refund id) of the refund issued for this intent
    refund: Option<(String, String)>,
}

pub struct SimulatedGateway {
    intents: Mutex<HashMap<String, SimulatedIntent>>,
    initial_status: IntentStatus,
    refunds_fail: AtomicBool,
}

impl SimulatedGateway {
    /// Intents start out waiting for a payment method
    pub fn new() -> Self {
        Self::with_initial_status(IntentStatus::RequiresPaymentMethod)
    }

    /// Intents are settled as soon as they are created
    pub fn auto_succeeding() -> Self {
        Self::with_initial_status(IntentStatus::Succeeded)
    }

    fn with_initial_status(initial_status: IntentStatus) -> Self {
        Self {
            intents: Mutex::new(HashMap::new()),
            initial_status,
            refunds_fail: AtomicBool::new(false),
        }
    }

    /// Drive an intent to a new processor-side status
    pub fn set_status(&self, intent_id: &str, status: IntentStatus) -> Result<(), GatewayError> {
        let mut intents = self.intents.lock();
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| GatewayError::IntentNotFound(intent_id.to_string()))?;
        intent.status = status;
        Ok(())
    }

    /// Make subsequent refund calls fail with a provider error
    pub fn fail_refunds(&self, fail: bool) {
        self.refunds_fail.store(fail, Ordering::SeqCst);
    }

    pub fn metadata(&self, intent_id: &str) -> Option<BTreeMap<String, String>> {
        self.intents.lock().get(intent_id).map(|i| i.metadata.clone())
    }

    pub fn charged_amount(&self, intent_id: &str) -> Option<(i64, String)> {
        self.intents
            .lock()
            .get(intent_id)
            .map(|i| (i.amount_cents, i.currency.clone()))
    }

    /// Number of intents that have been refunded
    pub fn refunds_issued(&self) -> usize {
        self.intents.lock().values().filter(|i| i.refund.is_some()).count()
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<PaymentIntent, GatewayError> {
        if amount_cents <= 0 {
            return Err(GatewayError::Rejected("amount must be positive".to_string()));
        }

        let id = format!("pi_sim_{}", Uuid::new_v4().simple());
        let client_secret = format!("{}_secret_{}", id, Uuid::new_v4().simple());
        self.intents.lock().insert(
            id.clone(),
            SimulatedIntent {
                amount_cents,
                currency: currency.to_string(),
                metadata: metadata.clone(),
                status: self.initial_status,
                refund: None,
            },
        );

        Ok(PaymentIntent {
            id,
            client_secret: Some(client_secret),
            status: self.initial_status,
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        let intents = self.intents.lock();
        let intent = intents
            .get(intent_id)
            .ok_or_else(|| GatewayError::IntentNotFound(intent_id.to_string()))?;
        Ok(PaymentIntent {
            id: intent_id.to_string(),
            client_secret: None,
            status: intent.status,
        })
    }

    async fn refund(&self, intent_id: &str, idempotency_key: &str) -> Result<GatewayRefund, GatewayError> {
        if self.refunds_fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Provider("simulated refund outage".to_string()));
        }

        let mut intents = self.intents.lock();
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| GatewayError::IntentNotFound(intent_id.to_string()))?;
        if let Some((key, refund_id)) = &intent.refund {
            if key == idempotency_key {
                return Ok(GatewayRefund { id: refund_id.clone() });
            }
            return Err(GatewayError::Rejected(format!("intent {} is already refunded", intent_id)));
        }
        if intent.status != IntentStatus::Succeeded {
            return Err(GatewayError::Rejected(format!("intent {} has not succeeded", intent_id)));
        }

        let refund_id = format!("re_sim_{}", Uuid::new_v4().simple());
        intent.refund = Some((idempotency_key.to_string(), refund_id.clone()));
        Ok(GatewayRefund { id: refund_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_intent_lifecycle() {
        let gateway = SimulatedGateway::new();
        let intent = gateway.create_intent(1500, "usd", &BTreeMap::new()).await.unwrap();
        assert_eq!(intent.status, IntentStatus::RequiresPaymentMethod);
        assert!(intent.client_secret.is_some());

        // Not refundable before it settles
        assert!(gateway.refund(&intent.id, "k1").await.is_err());

        gateway.set_status(&intent.id, IntentStatus::Succeeded).unwrap();
        assert_eq!(gateway.retrieve_intent(&intent.id).await.unwrap().status, IntentStatus::Succeeded);

        let first = gateway.refund(&intent.id, "k1").await.unwrap();
        // Replaying the key returns the same refund
        assert_eq!(gateway.refund(&intent.id, "k1").await.unwrap().id, first.id);
        assert!(matches!(gateway.refund(&intent.id, "k2").await, Err(GatewayError::Rejected(_))));
        assert_eq!(gateway.refunds_issued(), 1);
    }

    #[tokio::test]
    async fn test_refund_outage() {
        let gateway = SimulatedGateway::auto_succeeding();
        let intent = gateway.create_intent(100, "eur", &BTreeMap::new()).await.unwrap();
        gateway.fail_refunds(true);
        assert!(matches!(gateway.refund(&intent.id, "k1").await, Err(GatewayError::Provider(_))));
        assert!(matches!(
            gateway.retrieve_intent("pi_unknown").await,
            Err(GatewayError::IntentNotFound(_))
        ));
    }
}
