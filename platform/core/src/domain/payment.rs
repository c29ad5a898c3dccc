// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Payment Aggregate
//!
//! Local record of a gateway charge for a course. The status is a closed state
//! machine; every mutation goes through [`Payment::transition`] so no other
//! transition can be expressed.
//!
//! ```text
//! pending ──► completed ──► refunded
//!    │            └───────► refund_requested
//!    └──► failed
//! ```
//!
//! Refunds are only accepted from `completed` and only within the refund
//! window, measured from completion. While the gateway call for a refund is in
//! flight the payment stays `completed` with its refund details set; that
//! claim is what keeps a second refund request out.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::course::{CourseId, Price};
use crate::domain::user::UserId;

/// Default number of days after completion during which a refund may be requested.
pub const DEFAULT_REFUND_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(pub Uuid);

impl PaymentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
    RefundRequested,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::RefundRequested => "refund_requested",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "refunded" => Some(Self::Refunded),
            "refund_requested" => Some(Self::RefundRequested),
            _ => None,
        }
    }

    /// The complete transition table.
    pub fn can_transition_to(&self, to: PaymentStatus) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Completed)
                | (Self::Pending, Self::Failed)
                | (Self::Completed, Self::Refunded)
                | (Self::Completed, Self::RefundRequested)
        )
    }

    pub fn is_refundable(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundDetails {
    pub reason: String,
    pub requested_at: DateTime<Utc>,
    pub gateway_refund_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub amount_cents: i64,
    pub currency: String,
    pub gateway_intent_id: String,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    pub refund: Option<RefundDetails>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaymentError {
    #[error("Invalid payment state transition from {from} to {to}")]
    InvalidStateTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Payment is not eligible for refund")]
    NotEligibleForRefund,

    #[error("Refund period has expired")]
    RefundPeriodExpired,

    #[error("Refund reason cannot be empty")]
    MissingRefundReason,
}

impl Payment {
    /// Create a pending payment for an intent already registered with the gateway.
    pub fn new_pending(
        id: PaymentId,
        user_id: UserId,
        course_id: CourseId,
        price: &Price,
        gateway_intent_id: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            course_id,
            amount_cents: price.amount_cents,
            currency: price.currency.clone(),
            gateway_intent_id,
            status: PaymentStatus::Pending,
            failure_reason: None,
            refund: None,
            created_at: now,
            completed_at: None,
            updated_at: now,
        }
    }

    fn transition(&mut self, to: PaymentStatus) -> Result<(), PaymentError> {
        if !self.status.can_transition_to(to) {
            return Err(PaymentError::InvalidStateTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), PaymentError> {
        self.transition(PaymentStatus::Completed)?;
        self.completed_at = Some(self.updated_at);
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), PaymentError> {
        self.transition(PaymentStatus::Failed)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    /// Check whether a refund may be requested at `now`.
    pub fn ensure_refundable(&self, now: DateTime<Utc>, window: Duration) -> Result<(), PaymentError> {
        if !self.status.is_refundable() || self.refund_claimed() {
            return Err(PaymentError::NotEligibleForRefund);
        }
        let settled_at = self.completed_at.unwrap_or(self.created_at);
        if now - settled_at > window {
            return Err(PaymentError::RefundPeriodExpired);
        }
        Ok(())
    }

    /// A completed payment whose refund has been claimed but not settled
    pub fn refund_claimed(&self) -> bool {
        self.status == PaymentStatus::Completed && self.refund.is_some()
    }

    /// Reserve a completed payment for a refund before the gateway is called.
    /// The status is unchanged; the refund details mark the claim.
    pub fn claim_refund(&mut self, reason: &str) -> Result<(), PaymentError> {
        let reason = validate_reason(reason)?;
        if !self.status.is_refundable() || self.refund_claimed() {
            return Err(PaymentError::NotEligibleForRefund);
        }
        self.updated_at = Utc::now();
        self.refund = Some(RefundDetails {
            reason,
            requested_at: self.updated_at,
            gateway_refund_id: None,
        });
        Ok(())
    }

    /// Drop an unsettled refund claim, leaving the payment refundable again.
    pub fn release_refund_claim(&mut self) {
        if self.refund_claimed() {
            self.refund = None;
            self.updated_at = Utc::now();
        }
    }

    /// Record a refund that still needs back-office handling.
    pub fn request_refund(&mut self, reason: &str) -> Result<(), PaymentError> {
        let reason = validate_reason(reason)?;
        let requested_at = self.refund.as_ref().map(|r| r.requested_at);
        self.transition(PaymentStatus::RefundRequested)?;
        self.refund = Some(RefundDetails {
            reason,
            requested_at: requested_at.unwrap_or(self.updated_at),
            gateway_refund_id: None,
        });
        Ok(())
    }

    /// Record a refund the gateway has already issued.
    pub fn mark_refunded(&mut self, reason: &str, gateway_refund_id: String) -> Result<(), PaymentError> {
        let reason = validate_reason(reason)?;
        let requested_at = self.refund.as_ref().map(|r| r.requested_at);
        self.transition(PaymentStatus::Refunded)?;
        self.refund = Some(RefundDetails {
            reason,
            requested_at: requested_at.unwrap_or(self.updated_at),
            gateway_refund_id: Some(gateway_refund_id),
        });
        Ok(())
    }
}

fn validate_reason(reason: &str) -> Result<String, PaymentError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(PaymentError::MissingRefundReason);
    }
    Ok(reason.to_string())
}
