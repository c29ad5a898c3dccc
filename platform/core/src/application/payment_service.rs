// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Payment Application Service
//!
//! Orchestrates the purchase workflow across the course catalog, the payment
//! gateway and the payment/enrollment repositories:
//!
//! 1. `create_payment_intent` registers an intent with the gateway and stores a
//!    `pending` payment.
//! 2. `confirm_payment` asks the gateway for the intent status and settles the
//!    payment. On success exactly one enrollment exists afterwards, however
//!    many times (or however concurrently) confirmation runs.
//! 3. `process_refund` claims a completed payment inside the refund window,
//!    refunds it through the gateway and cancels the enrollment it paid for.
//!    A second completed payment for the same course keeps the enrollment
//!    alive and takes it over.
//!
//! Every status change is a compare-and-set against the status the decision
//! was based on, so concurrent requests on one payment cannot both apply.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::enrollment_service::{
    enrolled_event, ensure_enrollment, EnrollmentServiceError, ENROLLMENT_WRITE_ATTEMPTS,
};
use crate::domain::course::{CourseError, CourseId};
use crate::domain::enrollment::{Enrollment, EnrollmentError, EnrollmentStatus};
use crate::domain::events::{EnrollmentEvent, PaymentEvent};
use crate::domain::payment::{Payment, PaymentError, PaymentId, PaymentStatus, DEFAULT_REFUND_WINDOW_DAYS};
use crate::domain::payment_gateway::{GatewayError, IntentStatus, PaymentGateway};
use crate::domain::platform_config::{PaymentsConfig, RefundMode};
use crate::domain::repository::{CourseRepository, EnrollmentRepository, PaymentRepository, RepositoryError};
use crate::domain::user::UserId;
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub refund_window: Duration,
    pub refund_mode: RefundMode,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            refund_window: Duration::days(DEFAULT_REFUND_WINDOW_DAYS),
            refund_mode: RefundMode::Automatic,
        }
    }
}

impl From<&PaymentsConfig> for PaymentSettings {
    fn from(config: &PaymentsConfig) -> Self {
        Self {
            refund_window: Duration::try_days(config.refund_window_days)
                .unwrap_or_else(|| Duration::days(DEFAULT_REFUND_WINDOW_DAYS)),
            refund_mode: config.refund_mode,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntentCreated {
    pub payment_id: PaymentId,
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
}

/// Result of a confirmation attempt. `enrollment` is present once the payment
/// is completed.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentConfirmation {
    pub payment: Payment,
    pub enrollment: Option<Enrollment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundResult {
    pub payment: Payment,
    pub enrollment: Option<Enrollment>,
}

#[derive(Debug, Error)]
pub enum PaymentServiceError {
    #[error("Course not found")]
    CourseNotFound(CourseId),

    #[error("Payment not found")]
    PaymentNotFound,

    #[error("You are already enrolled in this course")]
    AlreadyEnrolled,

    #[error(transparent)]
    Course(#[from] CourseError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<EnrollmentServiceError> for PaymentServiceError {
    fn from(err: EnrollmentServiceError) -> Self {
        match err {
            EnrollmentServiceError::CourseNotFound(id) => PaymentServiceError::CourseNotFound(id),
            EnrollmentServiceError::AlreadyEnrolled => PaymentServiceError::AlreadyEnrolled,
            EnrollmentServiceError::Course(e) => PaymentServiceError::Course(e),
            EnrollmentServiceError::Enrollment(e) => PaymentServiceError::Enrollment(e),
            EnrollmentServiceError::Repository(e) => PaymentServiceError::Repository(e),
            EnrollmentServiceError::NotFound(id) => {
                PaymentServiceError::Repository(RepositoryError::NotFound(format!("enrollment {}", id)))
            }
        }
    }
}

#[async_trait]
pub trait PaymentService: Send + Sync {
    async fn create_payment_intent(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<PaymentIntentCreated, PaymentServiceError>;

    async fn confirm_payment(
        &self,
        user_id: UserId,
        payment_intent_id: &str,
    ) -> Result<PaymentConfirmation, PaymentServiceError>;

    async fn process_refund(
        &self,
        user_id: UserId,
        payment_id: PaymentId,
        reason: &str,
    ) -> Result<RefundResult, PaymentServiceError>;

    /// The user's payments, newest first
    async fn list_payments(&self, user_id: UserId) -> Result<Vec<Payment>, PaymentServiceError>;
}

pub struct StandardPaymentService {
    courses: Arc<dyn CourseRepository>,
    payments: Arc<dyn PaymentRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    gateway: Arc<dyn PaymentGateway>,
    event_bus: Arc<EventBus>,
    settings: PaymentSettings,
}

impl StandardPaymentService {
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        payments: Arc<dyn PaymentRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        gateway: Arc<dyn PaymentGateway>,
        event_bus: Arc<EventBus>,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            courses,
            payments,
            enrollments,
            gateway,
            event_bus,
            settings,
        }
    }

    fn owned_payment(user_id: UserId, payment: Option<Payment>) -> Result<Payment, PaymentServiceError> {
        payment
            .filter(|p| p.user_id == user_id)
            .ok_or(PaymentServiceError::PaymentNotFound)
    }

    async fn reload(&self, id: PaymentId) -> Result<Payment, PaymentServiceError> {
        self.payments
            .find_by_id(id)
            .await?
            .ok_or(PaymentServiceError::PaymentNotFound)
    }

    /// Grant access for a completed payment. Safe to call repeatedly.
    async fn settle_enrollment(&self, payment: &Payment) -> Result<Enrollment, PaymentServiceError> {
        let (enrollment, outcome) = ensure_enrollment(
            self.enrollments.as_ref(),
            payment.user_id,
            payment.course_id,
            Some(payment.id),
        )
        .await?;

        if outcome.is_new_access() {
            info!(
                enrollment_id = %enrollment.id,
                payment_id = %payment.id,
                ?outcome,
                "Enrollment granted for payment"
            );
            metrics::counter!("lyceum_enrollments_total", "source" => "payment").increment(1);
            self.event_bus.publish_enrollment_event(enrolled_event(&enrollment));
        } else if enrollment.payment_id != Some(payment.id) {
            warn!(
                payment_id = %payment.id,
                enrollment_id = %enrollment.id,
                paid_by = ?enrollment.payment_id,
                "Course access was already granted; this payment is a duplicate and can be refunded"
            );
            metrics::counter!("lyceum_payments_duplicate_total").increment(1);
        }
        Ok(enrollment)
    }

    /// Withdraw the access a refunded payment bought. An enrollment paid by a
    /// different payment is left alone. If the user holds another completed
    /// payment for the course, the enrollment is moved onto it instead of
    /// being cancelled.
    async fn revoke_paid_access(&self, refunded: &Payment) -> Result<Option<Enrollment>, PaymentServiceError> {
        for _ in 0..ENROLLMENT_WRITE_ATTEMPTS {
            let Some(mut enrollment) = self
                .enrollments
                .find_by_user_and_course(refunded.user_id, refunded.course_id)
                .await?
            else {
                return Ok(None);
            };
            if enrollment.payment_id != Some(refunded.id) || enrollment.status == EnrollmentStatus::Cancelled {
                return Ok(Some(enrollment));
            }

            let read_status = enrollment.status;
            if let Some(other) = self.other_completed_payment(refunded).await? {
                enrollment.payment_id = Some(other.id);
                if self.enrollments.update_if_status(&enrollment, read_status).await? {
                    info!(
                        enrollment_id = %enrollment.id,
                        payment_id = %other.id,
                        "Enrollment moved to the remaining completed payment"
                    );
                    return Ok(Some(enrollment));
                }
                continue;
            }

            enrollment.cancel()?;
            if self.enrollments.update_if_status(&enrollment, read_status).await? {
                self.event_bus
                    .publish_enrollment_event(EnrollmentEvent::EnrollmentCancelled {
                        enrollment_id: enrollment.id,
                        user_id: enrollment.user_id,
                        course_id: enrollment.course_id,
                        cancelled_at: enrollment.cancelled_at.unwrap_or_else(Utc::now),
                    });
                return Ok(Some(enrollment));
            }
            debug!(enrollment_id = %enrollment.id, "Enrollment changed during refund, retrying");
        }

        Err(RepositoryError::Conflict("enrollments_status".to_string()).into())
    }

    async fn other_completed_payment(&self, refunded: &Payment) -> Result<Option<Payment>, PaymentServiceError> {
        Ok(self
            .payments
            .find_by_user(refunded.user_id)
            .await?
            .into_iter()
            .find(|p| {
                p.id != refunded.id
                    && p.course_id == refunded.course_id
                    && p.status == PaymentStatus::Completed
                    && !p.refund_claimed()
            }))
    }

    async fn complete(&self, payment: Payment) -> Result<PaymentConfirmation, PaymentServiceError> {
        let mut completed = payment.clone();
        completed.complete()?;

        let payment = if self.payments.update_if_status(&completed, PaymentStatus::Pending).await? {
            info!(payment_id = %completed.id, "Payment completed");
            metrics::counter!("lyceum_payments_completed_total").increment(1);
            self.event_bus.publish_payment_event(PaymentEvent::PaymentCompleted {
                payment_id: completed.id,
                user_id: completed.user_id,
                course_id: completed.course_id,
                completed_at: completed.completed_at.unwrap_or(completed.updated_at),
            });
            completed
        } else {
            // Another confirmer won the race; act on what it wrote
            let current = self.reload(payment.id).await?;
            if current.status != PaymentStatus::Completed {
                return Err(PaymentError::InvalidStateTransition {
                    from: current.status,
                    to: PaymentStatus::Completed,
                }
                .into());
            }
            debug!(payment_id = %current.id, "Payment completed by a concurrent confirmation");
            current
        };

        let enrollment = self.settle_enrollment(&payment).await?;
        Ok(PaymentConfirmation {
            payment,
            enrollment: Some(enrollment),
        })
    }

    async fn fail(&self, payment: Payment, reason: &str) -> Result<PaymentConfirmation, PaymentServiceError> {
        let mut failed = payment.clone();
        failed.fail(reason)?;

        if !self.payments.update_if_status(&failed, PaymentStatus::Pending).await? {
            let current = self.reload(payment.id).await?;
            return Ok(PaymentConfirmation {
                payment: current,
                enrollment: None,
            });
        }

        warn!(payment_id = %failed.id, reason, "Payment failed");
        metrics::counter!("lyceum_payments_failed_total").increment(1);
        self.event_bus.publish_payment_event(PaymentEvent::PaymentFailed {
            payment_id: failed.id,
            reason: reason.to_string(),
            failed_at: failed.updated_at,
        });
        Ok(PaymentConfirmation {
            payment: failed,
            enrollment: None,
        })
    }
}

#[async_trait]
impl PaymentService for StandardPaymentService {
    async fn create_payment_intent(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<PaymentIntentCreated, PaymentServiceError> {
        let course = self
            .courses
            .find_by_id(course_id)
            .await?
            .ok_or(PaymentServiceError::CourseNotFound(course_id))?;
        course.ensure_enrollable()?;
        let price = course.resolve_price()?;

        if let Some(existing) = self.enrollments.find_by_user_and_course(user_id, course_id).await? {
            if existing.status.grants_access() {
                return Err(PaymentServiceError::AlreadyEnrolled);
            }
        }

        let payment_id = PaymentId::new();
        let metadata = BTreeMap::from([
            ("course_id".to_string(), course_id.to_string()),
            ("user_id".to_string(), user_id.to_string()),
            ("payment_id".to_string(), payment_id.to_string()),
        ]);
        let intent = self
            .gateway
            .create_intent(price.amount_cents, &price.currency, &metadata)
            .await?;

        let payment = Payment::new_pending(payment_id, user_id, course_id, &price, intent.id.clone());
        self.payments.insert(&payment).await?;

        info!(
            %payment_id,
            %course_id,
            amount_cents = price.amount_cents,
            currency = %price.currency,
            "Payment intent created"
        );
        metrics::counter!("lyceum_payments_intents_created_total").increment(1);
        self.event_bus.publish_payment_event(PaymentEvent::IntentCreated {
            payment_id,
            user_id,
            course_id,
            amount_cents: payment.amount_cents,
            currency: payment.currency.clone(),
            created_at: payment.created_at,
        });

        Ok(PaymentIntentCreated {
            payment_id,
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
            amount_cents: payment.amount_cents,
            currency: payment.currency,
        })
    }

    async fn confirm_payment(
        &self,
        user_id: UserId,
        payment_intent_id: &str,
    ) -> Result<PaymentConfirmation, PaymentServiceError> {
        let found = self.payments.find_by_intent_id(payment_intent_id).await?;
        let payment = Self::owned_payment(user_id, found)?;

        match payment.status {
            PaymentStatus::Pending => {}
            PaymentStatus::Completed => {
                debug!(payment_id = %payment.id, "Payment already completed");
                let enrollment = self.settle_enrollment(&payment).await?;
                return Ok(PaymentConfirmation {
                    payment,
                    enrollment: Some(enrollment),
                });
            }
            other => {
                return Err(PaymentError::InvalidStateTransition {
                    from: other,
                    to: PaymentStatus::Completed,
                }
                .into())
            }
        }

        let intent = self.gateway.retrieve_intent(payment_intent_id).await?;
        match intent.status {
            IntentStatus::Succeeded => self.complete(payment).await,
            IntentStatus::Canceled => self.fail(payment, "payment intent was canceled").await,
            status => {
                debug!(payment_id = %payment.id, ?status, "Payment intent not settled yet");
                Ok(PaymentConfirmation {
                    payment,
                    enrollment: None,
                })
            }
        }
    }

    async fn process_refund(
        &self,
        user_id: UserId,
        payment_id: PaymentId,
        reason: &str,
    ) -> Result<RefundResult, PaymentServiceError> {
        let found = self.payments.find_by_id(payment_id).await?;
        let payment = Self::owned_payment(user_id, found)?;
        payment.ensure_refundable(Utc::now(), self.settings.refund_window)?;

        // Only the request that wins the claim talks to the gateway
        let mut claimed = payment.clone();
        claimed.claim_refund(reason)?;
        if !self.payments.claim_refund(&claimed).await? {
            return Err(PaymentError::NotEligibleForRefund.into());
        }

        let mut refunded = claimed.clone();
        match self.settings.refund_mode {
            RefundMode::Automatic => {
                match self
                    .gateway
                    .refund(&payment.gateway_intent_id, &payment.id.to_string())
                    .await
                {
                    Ok(gateway_refund) => refunded.mark_refunded(reason, gateway_refund.id)?,
                    Err(e @ GatewayError::Rejected(_)) => {
                        warn!(%payment_id, error = %e, "Gateway rejected refund");
                        self.payments.release_refund_claim(&claimed).await?;
                        return Err(e.into());
                    }
                    Err(e) => {
                        warn!(
                            %payment_id,
                            error = %e,
                            "Gateway refund failed, leaving refund for manual processing"
                        );
                        refunded.request_refund(reason)?;
                    }
                }
            }
            RefundMode::Manual => refunded.request_refund(reason)?,
        }

        if !self.payments.update_if_status(&refunded, PaymentStatus::Completed).await? {
            return Err(PaymentError::NotEligibleForRefund.into());
        }

        let enrollment = self.revoke_paid_access(&refunded).await?;

        info!(%payment_id, status = %refunded.status, "Refund processed");
        metrics::counter!("lyceum_payments_refunds_total", "status" => refunded.status.as_str()).increment(1);
        self.event_bus.publish_payment_event(PaymentEvent::RefundProcessed {
            payment_id,
            user_id,
            status: refunded.status,
            reason: reason.trim().to_string(),
            processed_at: refunded.updated_at,
        });

        Ok(RefundResult {
            payment: refunded,
            enrollment,
        })
    }

    async fn list_payments(&self, user_id: UserId) -> Result<Vec<Payment>, PaymentServiceError> {
        Ok(self.payments.find_by_user(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_refund_window_falls_back_to_default() {
        let config = PaymentsConfig {
            refund_window_days: i64::MAX,
            ..PaymentsConfig::default()
        };
        let settings = PaymentSettings::from(&config);
        assert_eq!(settings.refund_window, Duration::days(DEFAULT_REFUND_WINDOW_DAYS));

        let config = PaymentsConfig {
            refund_window_days: 14,
            ..PaymentsConfig::default()
        };
        assert_eq!(PaymentSettings::from(&config).refund_window, Duration::days(14));
    }
}
