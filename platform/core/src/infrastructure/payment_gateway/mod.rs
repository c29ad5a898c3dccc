// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Payment gateway adapters and the factory that picks one from configuration.

pub mod simulated;
pub mod stripe;

pub use simulated::SimulatedGateway;
pub use stripe::StripeGateway;

use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::payment_gateway::PaymentGateway;
use crate::domain::platform_config::{GatewayKind, PaymentsConfig};

pub fn from_config(config: &PaymentsConfig) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    match config.gateway {
        GatewayKind::Stripe => {
            let api_key = config
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| anyhow::anyhow!("stripe gateway selected but no api_key configured"))?;
            info!(endpoint = %config.endpoint, "Using Stripe payment gateway");
            Ok(Arc::new(StripeGateway::new(config.endpoint.clone(), api_key)))
        }
        GatewayKind::Simulated => {
            warn!("Using simulated payment gateway; intents settle immediately and no money moves");
            Ok(Arc::new(SimulatedGateway::auto_succeeding()))
        }
    }
}
