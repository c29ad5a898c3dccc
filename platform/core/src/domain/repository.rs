// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate root: one repository per
//! aggregate, interface defined in the domain layer, implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `CourseRepository` | `Course` | `InMemoryCourseRepository`, `PostgresCourseRepository` |
//! | `EnrollmentRepository` | `Enrollment` | `InMemoryEnrollmentRepository`, `PostgresEnrollmentRepository` |
//! | `PaymentRepository` | `Payment` | `InMemoryPaymentRepository`, `PostgresPaymentRepository` |
//! | `PollRepository` | `Poll` + votes | `InMemoryPollRepository`, `PostgresPollRepository` |
//! | `CertificateRepository` | `Certificate` | `InMemoryCertificateRepository`, `PostgresCertificateRepository` |
//!
//! ## Write semantics
//!
//! Multi-step writes that can race are expressed as single atomic operations
//! here rather than read-then-write in the services:
//!
//! - `PaymentRepository::update_if_status` and
//!   `EnrollmentRepository::update_if_status` are compare-and-set on status.
//! - `PaymentRepository::claim_refund` reserves a completed payment for one
//!   refund before the gateway is called.
//! - `EnrollmentRepository::insert_if_absent` resolves the (user, course)
//!   unique key to the existing row instead of failing.
//! - `PollRepository::record_vote` is one insert guarded by unique keys and
//!   reports a conflict as `RepositoryError::Conflict(<constraint name>)`.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::certificate::Certificate;
use crate::domain::course::{Course, CourseId};
use crate::domain::enrollment::{Enrollment, EnrollmentId, EnrollmentStatus};
use crate::domain::payment::{Payment, PaymentId, PaymentStatus};
use crate::domain::poll::{Poll, PollId, PollOptionId, PollVote};
use crate::domain::user::UserId;

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Save course (create or update)
    async fn save(&self, course: &Course) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: CourseId) -> Result<Option<Course>, RepositoryError>;

    /// List courses, optionally restricted to published ones
    async fn list(&self, published_only: bool) -> Result<Vec<Course>, RepositoryError>;
}

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Insert a new enrollment unless one already exists for the same
    /// (user, course). Returns the stored row and whether it was created.
    async fn insert_if_absent(&self, enrollment: &Enrollment) -> Result<(Enrollment, bool), RepositoryError>;

    /// Persist `enrollment` only if the stored row is still in `expected`
    /// status. Returns `false` when another writer moved it first.
    async fn update_if_status(
        &self,
        enrollment: &Enrollment,
        expected: EnrollmentStatus,
    ) -> Result<bool, RepositoryError>;

    async fn find_by_id(&self, id: EnrollmentId) -> Result<Option<Enrollment>, RepositoryError>;

    async fn find_by_user_and_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, RepositoryError>;

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Enrollment>, RepositoryError>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert a new payment
    async fn insert(&self, payment: &Payment) -> Result<(), RepositoryError>;

    /// Persist `payment` only if the stored row is still in `expected` status.
    /// Returns `false` when another writer moved it first.
    async fn update_if_status(&self, payment: &Payment, expected: PaymentStatus) -> Result<bool, RepositoryError>;

    /// Store the refund details of a claimed payment (see
    /// `Payment::claim_refund`). Applies only to a `completed` row without
    /// refund details; `false` means another request got there first.
    async fn claim_refund(&self, payment: &Payment) -> Result<bool, RepositoryError>;

    /// Clear the refund details of a claim that did not settle.
    async fn release_refund_claim(&self, payment: &Payment) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError>;

    async fn find_by_intent_id(&self, intent_id: &str) -> Result<Option<Payment>, RepositoryError>;

    /// Payments of a user, newest first
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Payment>, RepositoryError>;
}

#[async_trait]
pub trait PollRepository: Send + Sync {
    /// Create a poll with all of its options atomically
    async fn create(&self, poll: &Poll) -> Result<(), RepositoryError>;

    /// Update poll flags (active, expiry)
    async fn save(&self, poll: &Poll) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: PollId) -> Result<Option<Poll>, RepositoryError>;

    /// Insert a vote. `exclusive` marks a single-choice vote, which must be the
    /// voter's only vote in the poll.
    async fn record_vote(&self, vote: &PollVote, exclusive: bool) -> Result<(), RepositoryError>;

    /// Row counts per option
    async fn count_votes(&self, poll_id: PollId) -> Result<HashMap<PollOptionId, u64>, RepositoryError>;

    async fn count_voters(&self, poll_id: PollId) -> Result<u64, RepositoryError>;

    async fn find_votes_by_user(&self, poll_id: PollId, user_id: UserId) -> Result<Vec<PollVote>, RepositoryError>;
}

#[async_trait]
pub trait CertificateRepository: Send + Sync {
    /// Insert unless a certificate already exists for the enrollment.
    /// Returns the stored certificate and whether it was created.
    async fn insert_if_absent(&self, certificate: &Certificate) -> Result<(Certificate, bool), RepositoryError>;

    async fn find_by_enrollment(&self, enrollment_id: EnrollmentId) -> Result<Option<Certificate>, RepositoryError>;

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Certificate>, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// A unique constraint rejected the write; carries the constraint name.
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                RepositoryError::Conflict(db_err.constraint().unwrap_or("unknown").to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
