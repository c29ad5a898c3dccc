// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Payment Gateway Domain Interface (Anti-Corruption Layer)
//!
//! The card processor is an opaque collaborator. The payment workflow needs
//! exactly three calls from it: create an intent, read an intent's status, and
//! refund a settled intent.
//!
//! Implementations live in `crate::infrastructure::payment_gateway`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register a charge of `amount_cents` with the processor.
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Fetch the current processor-side state of an intent.
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError>;

    /// Refund a settled intent in full. Repeating a call with the same
    /// `idempotency_key` returns the original refund instead of issuing a
    /// second one.
    async fn refund(&self, intent_id: &str, idempotency_key: &str) -> Result<GatewayRefund, GatewayError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: IntentStatus,
}

/// Processor-side intent lifecycle, named after the Stripe states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Payment intent not found: {0}")]
    IntentNotFound(String),

    #[error("Gateway rejected request: {0}")]
    Rejected(String),

    #[error("Gateway error: {0}")]
    Provider(String),
}
