// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::certificate::CertificateId;
use crate::domain::course::CourseId;
use crate::domain::enrollment::EnrollmentId;
use crate::domain::payment::{PaymentId, PaymentStatus};
use crate::domain::poll::{PollId, PollOptionId};
use crate::domain::user::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PaymentEvent {
    IntentCreated {
        payment_id: PaymentId,
        user_id: UserId,
        course_id: CourseId,
        amount_cents: i64,
        currency: String,
        created_at: DateTime<Utc>,
    },
    PaymentCompleted {
        payment_id: PaymentId,
        user_id: UserId,
        course_id: CourseId,
        completed_at: DateTime<Utc>,
    },
    PaymentFailed {
        payment_id: PaymentId,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    RefundProcessed {
        payment_id: PaymentId,
        user_id: UserId,
        /// `refunded` or `refund_requested`
        status: PaymentStatus,
        reason: String,
        processed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EnrollmentEvent {
    Enrolled {
        enrollment_id: EnrollmentId,
        user_id: UserId,
        course_id: CourseId,
        payment_id: Option<PaymentId>,
        enrolled_at: DateTime<Utc>,
    },
    EnrollmentCompleted {
        enrollment_id: EnrollmentId,
        user_id: UserId,
        course_id: CourseId,
        completed_at: DateTime<Utc>,
    },
    EnrollmentCancelled {
        enrollment_id: EnrollmentId,
        user_id: UserId,
        course_id: CourseId,
        cancelled_at: DateTime<Utc>,
    },
    CertificateIssued {
        certificate_id: CertificateId,
        enrollment_id: EnrollmentId,
        user_id: UserId,
        certificate_number: String,
        issued_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ForumEvent {
    PollCreated {
        poll_id: PollId,
        created_by: UserId,
        created_at: DateTime<Utc>,
    },
    VoteCast {
        poll_id: PollId,
        option_id: PollOptionId,
        user_id: UserId,
        voted_at: DateTime<Utc>,
    },
    PollClosed {
        poll_id: PollId,
        closed_at: DateTime<Utc>,
    },
}
