// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository abstractions defined in
//! the domain layer.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve domain aggregates
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL Repositories
//!
//! - **PostgresCourseRepository** - course catalog rows
//! - **PostgresEnrollmentRepository** - enrollments, unique per (user, course)
//! - **PostgresPaymentRepository** - payments with compare-and-set status updates
//! - **PostgresPollRepository** - polls, options and constraint-guarded votes
//! - **PostgresCertificateRepository** - certificates, unique per enrollment
//!
//! ## In-Memory Repositories
//!
//! Lock-guarded maps for development and tests. Every check-and-write runs
//! under a single write lock so they honour the same uniqueness guarantees as
//! the database constraints.

pub mod postgres_certificate;
pub mod postgres_course;
pub mod postgres_enrollment;
pub mod postgres_payment;
pub mod postgres_poll;

pub use postgres_certificate::PostgresCertificateRepository;
pub use postgres_course::PostgresCourseRepository;
pub use postgres_enrollment::PostgresEnrollmentRepository;
pub use postgres_payment::PostgresPaymentRepository;
pub use postgres_poll::PostgresPollRepository;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::certificate::Certificate;
use crate::domain::course::{Course, CourseId, CourseStatus};
use crate::domain::enrollment::{Enrollment, EnrollmentId, EnrollmentStatus};
use crate::domain::payment::{Payment, PaymentId, PaymentStatus};
use crate::domain::poll::{Poll, PollId, PollOptionId, PollVote, UNIQUE_VOTE_PER_OPTION, UNIQUE_VOTE_PER_POLL};
use crate::domain::repository::{
    CertificateRepository, CourseRepository, EnrollmentRepository, PaymentRepository, PollRepository,
    RepositoryError,
};
use crate::domain::user::UserId;

#[derive(Clone, Default)]
pub struct InMemoryCourseRepository {
    courses: Arc<RwLock<HashMap<CourseId, Course>>>,
}

impl InMemoryCourseRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CourseRepository for InMemoryCourseRepository {
    async fn save(&self, course: &Course) -> Result<(), RepositoryError> {
        self.courses.write().insert(course.id, course.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: CourseId) -> Result<Option<Course>, RepositoryError> {
        Ok(self.courses.read().get(&id).cloned())
    }

    async fn list(&self, published_only: bool) -> Result<Vec<Course>, RepositoryError> {
        let mut courses: Vec<Course> = self
            .courses
            .read()
            .values()
            .filter(|c| !published_only || c.status == CourseStatus::Published)
            .cloned()
            .collect();
        courses.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(courses)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryEnrollmentRepository {
    enrollments: Arc<RwLock<HashMap<EnrollmentId, Enrollment>>>,
}

impl InMemoryEnrollmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.enrollments.read().len()
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryEnrollmentRepository {
    async fn insert_if_absent(&self, enrollment: &Enrollment) -> Result<(Enrollment, bool), RepositoryError> {
        let mut enrollments = self.enrollments.write();
        if let Some(existing) = enrollments
            .values()
            .find(|e| e.user_id == enrollment.user_id && e.course_id == enrollment.course_id)
        {
            return Ok((existing.clone(), false));
        }
        enrollments.insert(enrollment.id, enrollment.clone());
        Ok((enrollment.clone(), true))
    }

    async fn update_if_status(
        &self,
        enrollment: &Enrollment,
        expected: EnrollmentStatus,
    ) -> Result<bool, RepositoryError> {
        let mut enrollments = self.enrollments.write();
        match enrollments.get_mut(&enrollment.id) {
            Some(stored) if stored.status == expected => {
                *stored = enrollment.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound(format!("enrollment {}", enrollment.id))),
        }
    }

    async fn find_by_id(&self, id: EnrollmentId) -> Result<Option<Enrollment>, RepositoryError> {
        Ok(self.enrollments.read().get(&id).cloned())
    }

    async fn find_by_user_and_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        Ok(self
            .enrollments
            .read()
            .values()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
            .cloned())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Enrollment>, RepositoryError> {
        let mut found: Vec<Enrollment> = self
            .enrollments
            .read()
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.enrolled_at.cmp(&a.enrolled_at));
        Ok(found)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryPaymentRepository {
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<(), RepositoryError> {
        let mut payments = self.payments.write();
        if payments.contains_key(&payment.id) {
            return Err(RepositoryError::Conflict("payments_pkey".to_string()));
        }
        if payments.values().any(|p| p.gateway_intent_id == payment.gateway_intent_id) {
            return Err(RepositoryError::Conflict("payments_gateway_intent_id_key".to_string()));
        }
        payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn update_if_status(&self, payment: &Payment, expected: PaymentStatus) -> Result<bool, RepositoryError> {
        let mut payments = self.payments.write();
        match payments.get_mut(&payment.id) {
            Some(stored) if stored.status == expected => {
                *stored = payment.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound(format!("payment {}", payment.id))),
        }
    }

    async fn claim_refund(&self, payment: &Payment) -> Result<bool, RepositoryError> {
        if payment.refund.is_none() {
            return Ok(false);
        }
        let mut payments = self.payments.write();
        match payments.get_mut(&payment.id) {
            Some(stored) if stored.status == PaymentStatus::Completed && stored.refund.is_none() => {
                stored.refund = payment.refund.clone();
                stored.updated_at = payment.updated_at;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound(format!("payment {}", payment.id))),
        }
    }

    async fn release_refund_claim(&self, payment: &Payment) -> Result<(), RepositoryError> {
        let mut payments = self.payments.write();
        if let Some(stored) = payments.get_mut(&payment.id) {
            if stored.status == PaymentStatus::Completed {
                stored.refund = None;
                stored.updated_at = chrono::Utc::now();
            }
        }
        Ok(())
    }

    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        Ok(self.payments.read().get(&id).cloned())
    }

    async fn find_by_intent_id(&self, intent_id: &str) -> Result<Option<Payment>, RepositoryError> {
        Ok(self
            .payments
            .read()
            .values()
            .find(|p| p.gateway_intent_id == intent_id)
            .cloned())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Payment>, RepositoryError> {
        let mut found: Vec<Payment> = self
            .payments
            .read()
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

struct StoredVote {
    vote: PollVote,
    exclusive: bool,
}

#[derive(Default)]
struct PollStore {
    polls: HashMap<PollId, Poll>,
    votes: Vec<StoredVote>,
}

#[derive(Clone, Default)]
pub struct InMemoryPollRepository {
    store: Arc<RwLock<PollStore>>,
}

impl InMemoryPollRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollRepository for InMemoryPollRepository {
    async fn create(&self, poll: &Poll) -> Result<(), RepositoryError> {
        let mut store = self.store.write();
        if store.polls.contains_key(&poll.id) {
            return Err(RepositoryError::Conflict("polls_pkey".to_string()));
        }
        store.polls.insert(poll.id, poll.clone());
        Ok(())
    }

    async fn save(&self, poll: &Poll) -> Result<(), RepositoryError> {
        let mut store = self.store.write();
        match store.polls.get_mut(&poll.id) {
            Some(stored) => {
                stored.is_active = poll.is_active;
                stored.expires_at = poll.expires_at;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("poll {}", poll.id))),
        }
    }

    async fn find_by_id(&self, id: PollId) -> Result<Option<Poll>, RepositoryError> {
        Ok(self.store.read().polls.get(&id).cloned())
    }

    async fn record_vote(&self, vote: &PollVote, exclusive: bool) -> Result<(), RepositoryError> {
        let mut store = self.store.write();
        if store
            .votes
            .iter()
            .any(|v| v.vote.user_id == vote.user_id && v.vote.option_id == vote.option_id)
        {
            return Err(RepositoryError::Conflict(UNIQUE_VOTE_PER_OPTION.to_string()));
        }
        if exclusive
            && store
                .votes
                .iter()
                .any(|v| v.exclusive && v.vote.poll_id == vote.poll_id && v.vote.user_id == vote.user_id)
        {
            return Err(RepositoryError::Conflict(UNIQUE_VOTE_PER_POLL.to_string()));
        }
        store.votes.push(StoredVote {
            vote: vote.clone(),
            exclusive,
        });
        Ok(())
    }

    async fn count_votes(&self, poll_id: PollId) -> Result<HashMap<PollOptionId, u64>, RepositoryError> {
        let store = self.store.read();
        let mut counts = HashMap::new();
        for stored in store.votes.iter().filter(|v| v.vote.poll_id == poll_id) {
            *counts.entry(stored.vote.option_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn count_voters(&self, poll_id: PollId) -> Result<u64, RepositoryError> {
        let store = self.store.read();
        let mut voters: Vec<UserId> = store
            .votes
            .iter()
            .filter(|v| v.vote.poll_id == poll_id)
            .map(|v| v.vote.user_id)
            .collect();
        voters.sort_by_key(|u| u.0);
        voters.dedup();
        Ok(voters.len() as u64)
    }

    async fn find_votes_by_user(&self, poll_id: PollId, user_id: UserId) -> Result<Vec<PollVote>, RepositoryError> {
        Ok(self
            .store
            .read()
            .votes
            .iter()
            .filter(|v| v.vote.poll_id == poll_id && v.vote.user_id == user_id)
            .map(|v| v.vote.clone())
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryCertificateRepository {
    certificates: Arc<RwLock<Vec<Certificate>>>,
}

impl InMemoryCertificateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CertificateRepository for InMemoryCertificateRepository {
    async fn insert_if_absent(&self, certificate: &Certificate) -> Result<(Certificate, bool), RepositoryError> {
        let mut certificates = self.certificates.write();
        if let Some(existing) = certificates
            .iter()
            .find(|c| c.enrollment_id == certificate.enrollment_id)
        {
            return Ok((existing.clone(), false));
        }
        certificates.push(certificate.clone());
        Ok((certificate.clone(), true))
    }

    async fn find_by_enrollment(&self, enrollment_id: EnrollmentId) -> Result<Option<Certificate>, RepositoryError> {
        Ok(self
            .certificates
            .read()
            .iter()
            .find(|c| c.enrollment_id == enrollment_id)
            .cloned())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Certificate>, RepositoryError> {
        Ok(self
            .certificates
            .read()
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::poll::TopicId;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_enrollment_insert_if_absent_returns_existing() {
        let repo = InMemoryEnrollmentRepository::new();
        let user = UserId::new();
        let course = CourseId::new();

        let first = Enrollment::new(user, course, None);
        let (stored, created) = repo.insert_if_absent(&first).await.unwrap();
        assert!(created);
        assert_eq!(stored.id, first.id);

        let second = Enrollment::new(user, course, None);
        let (stored, created) = repo.insert_if_absent(&second).await.unwrap();
        assert!(!created);
        assert_eq!(stored.id, first.id);
        assert_eq!(repo.count(), 1);
    }

    #[tokio::test]
    async fn test_single_choice_vote_constraints() {
        let repo = InMemoryPollRepository::new();
        let poll = Poll::new(
            TopicId(Uuid::new_v4()),
            "Which?",
            &["a".to_string(), "b".to_string()],
            false,
            None,
            UserId::new(),
        )
        .unwrap();
        repo.create(&poll).await.unwrap();

        let voter = UserId::new();
        repo.record_vote(&poll.cast(poll.options[0].id, voter), true).await.unwrap();

        match repo.record_vote(&poll.cast(poll.options[0].id, voter), true).await {
            Err(RepositoryError::Conflict(c)) => assert_eq!(c, UNIQUE_VOTE_PER_OPTION),
            other => panic!("expected option conflict, got {:?}", other.err()),
        }
        match repo.record_vote(&poll.cast(poll.options[1].id, voter), true).await {
            Err(RepositoryError::Conflict(c)) => assert_eq!(c, UNIQUE_VOTE_PER_POLL),
            other => panic!("expected poll conflict, got {:?}", other.err()),
        }

        let counts = repo.count_votes(poll.id).await.unwrap();
        assert_eq!(counts.get(&poll.options[0].id), Some(&1));
        assert_eq!(repo.count_voters(poll.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_payment_compare_and_set() {
        let repo = InMemoryPaymentRepository::new();
        let price = crate::domain::course::Price { amount_cents: 100, currency: "usd".into() };
        let payment = Payment::new_pending(PaymentId::new(), UserId::new(), CourseId::new(), &price, "pi_1".into());
        repo.insert(&payment).await.unwrap();

        let mut completed = payment.clone();
        completed.complete().unwrap();
        assert!(repo.update_if_status(&completed, PaymentStatus::Pending).await.unwrap());
        // Second writer expecting pending loses
        assert!(!repo.update_if_status(&completed, PaymentStatus::Pending).await.unwrap());
        assert!(matches!(repo.insert(&payment).await, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_enrollment_update_rejects_stale_status() {
        let repo = InMemoryEnrollmentRepository::new();
        let (enrollment, _) = repo
            .insert_if_absent(&Enrollment::new(UserId::new(), CourseId::new(), None))
            .await
            .unwrap();

        let mut cancelled = enrollment.clone();
        cancelled.cancel().unwrap();
        assert!(repo.update_if_status(&cancelled, EnrollmentStatus::Active).await.unwrap());

        // A progress update read before the cancellation must not resurrect the row
        let mut progressed = enrollment.clone();
        progressed.update_progress(100).unwrap();
        assert!(!repo.update_if_status(&progressed, EnrollmentStatus::Active).await.unwrap());
        let stored = repo.find_by_id(enrollment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EnrollmentStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_refund_claim_is_exclusive() {
        let repo = InMemoryPaymentRepository::new();
        let price = crate::domain::course::Price { amount_cents: 100, currency: "usd".into() };
        let mut payment = Payment::new_pending(PaymentId::new(), UserId::new(), CourseId::new(), &price, "pi_2".into());
        repo.insert(&payment).await.unwrap();
        // Not claimable while pending
        let mut early = payment.clone();
        early.refund = Some(crate::domain::payment::RefundDetails {
            reason: "early".into(),
            requested_at: chrono::Utc::now(),
            gateway_refund_id: None,
        });
        assert!(!repo.claim_refund(&early).await.unwrap());

        payment.complete().unwrap();
        assert!(repo.update_if_status(&payment, PaymentStatus::Pending).await.unwrap());

        let mut first = payment.clone();
        first.claim_refund("first").unwrap();
        let mut second = payment.clone();
        second.claim_refund("second").unwrap();
        assert!(repo.claim_refund(&first).await.unwrap());
        assert!(!repo.claim_refund(&second).await.unwrap());

        repo.release_refund_claim(&first).await.unwrap();
        assert!(repo.claim_refund(&second).await.unwrap());
        let stored = repo.find_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.refund.map(|r| r.reason), Some("second".to_string()));
    }
}
