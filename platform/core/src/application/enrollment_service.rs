// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Enrollment Application Service
//!
//! Direct enrollment into free courses, progress tracking and the
//! insert-if-absent helper shared with payment confirmation. Completing an
//! enrollment publishes [`EnrollmentEvent::EnrollmentCompleted`], which the
//! enrollment observer turns into a certificate job.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::course::{CourseError, CourseId};
use crate::domain::enrollment::{Enrollment, EnrollmentError, EnrollmentId, EnrollmentStatus};
use crate::domain::events::EnrollmentEvent;
use crate::domain::payment::PaymentId;
use crate::domain::repository::{CourseRepository, EnrollmentRepository, RepositoryError};
use crate::domain::user::UserId;
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Error)]
pub enum EnrollmentServiceError {
    #[error("Course not found")]
    CourseNotFound(CourseId),

    #[error("Enrollment not found")]
    NotFound(EnrollmentId),

    #[error("You are already enrolled in this course")]
    AlreadyEnrolled,

    #[error(transparent)]
    Course(#[from] CourseError),

    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// How [`ensure_enrollment`] arrived at the returned row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentOutcome {
    Created,
    Reactivated,
    Existing,
}

impl EnrollmentOutcome {
    pub fn is_new_access(&self) -> bool {
        !matches!(self, EnrollmentOutcome::Existing)
    }
}

/// Compare-and-set retries before an enrollment write gives up
pub(crate) const ENROLLMENT_WRITE_ATTEMPTS: usize = 3;

/// Make sure `user_id` holds an active enrollment in `course_id`.
///
/// At most one row per (user, course) ever exists: the insert is a no-op on
/// conflict and the existing row is returned instead. A cancelled row is
/// reactivated and re-linked to `payment_id`.
pub async fn ensure_enrollment(
    repository: &dyn EnrollmentRepository,
    user_id: UserId,
    course_id: CourseId,
    payment_id: Option<PaymentId>,
) -> Result<(Enrollment, EnrollmentOutcome), EnrollmentServiceError> {
    let candidate = Enrollment::new(user_id, course_id, payment_id);
    for _ in 0..ENROLLMENT_WRITE_ATTEMPTS {
        let (mut enrollment, inserted) = repository.insert_if_absent(&candidate).await?;
        if inserted {
            return Ok((enrollment, EnrollmentOutcome::Created));
        }

        if enrollment.status != EnrollmentStatus::Cancelled {
            debug!(enrollment_id = %enrollment.id, "Enrollment already exists");
            return Ok((enrollment, EnrollmentOutcome::Existing));
        }

        enrollment.reactivate(payment_id)?;
        if repository
            .update_if_status(&enrollment, EnrollmentStatus::Cancelled)
            .await?
        {
            return Ok((enrollment, EnrollmentOutcome::Reactivated));
        }
        debug!(enrollment_id = %enrollment.id, "Enrollment changed during reactivation, retrying");
    }

    Err(RepositoryError::Conflict("enrollments_status".to_string()).into())
}

pub(crate) fn enrolled_event(enrollment: &Enrollment) -> EnrollmentEvent {
    EnrollmentEvent::Enrolled {
        enrollment_id: enrollment.id,
        user_id: enrollment.user_id,
        course_id: enrollment.course_id,
        payment_id: enrollment.payment_id,
        enrolled_at: enrollment.enrolled_at,
    }
}

#[async_trait]
pub trait EnrollmentService: Send + Sync {
    /// Enroll into a published free course.
    async fn enroll_free(&self, user_id: UserId, course_id: CourseId) -> Result<Enrollment, EnrollmentServiceError>;

    async fn list_enrollments(&self, user_id: UserId) -> Result<Vec<Enrollment>, EnrollmentServiceError>;

    async fn update_progress(
        &self,
        user_id: UserId,
        enrollment_id: EnrollmentId,
        percentage: u16,
    ) -> Result<Enrollment, EnrollmentServiceError>;
}

pub struct StandardEnrollmentService {
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    event_bus: Arc<EventBus>,
}

impl StandardEnrollmentService {
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            courses,
            enrollments,
            event_bus,
        }
    }
}

#[async_trait]
impl EnrollmentService for StandardEnrollmentService {
    async fn enroll_free(&self, user_id: UserId, course_id: CourseId) -> Result<Enrollment, EnrollmentServiceError> {
        let course = self
            .courses
            .find_by_id(course_id)
            .await?
            .ok_or(EnrollmentServiceError::CourseNotFound(course_id))?;
        course.ensure_enrollable()?;
        if !course.is_free {
            return Err(CourseError::PaymentRequired.into());
        }

        let (enrollment, outcome) = ensure_enrollment(self.enrollments.as_ref(), user_id, course_id, None).await?;
        if !outcome.is_new_access() {
            return Err(EnrollmentServiceError::AlreadyEnrolled);
        }

        info!(enrollment_id = %enrollment.id, %user_id, %course_id, "Enrolled in free course");
        metrics::counter!("lyceum_enrollments_total", "source" => "free").increment(1);
        self.event_bus.publish_enrollment_event(enrolled_event(&enrollment));
        Ok(enrollment)
    }

    async fn list_enrollments(&self, user_id: UserId) -> Result<Vec<Enrollment>, EnrollmentServiceError> {
        Ok(self.enrollments.find_by_user(user_id).await?)
    }

    async fn update_progress(
        &self,
        user_id: UserId,
        enrollment_id: EnrollmentId,
        percentage: u16,
    ) -> Result<Enrollment, EnrollmentServiceError> {
        let mut attempts = 0;
        let (enrollment, just_completed) = loop {
            let mut enrollment = self
                .enrollments
                .find_by_id(enrollment_id)
                .await?
                .filter(|e| e.user_id == user_id)
                .ok_or(EnrollmentServiceError::NotFound(enrollment_id))?;

            let read_status = enrollment.status;
            let just_completed = enrollment.update_progress(percentage)?;
            if self.enrollments.update_if_status(&enrollment, read_status).await? {
                break (enrollment, just_completed);
            }

            attempts += 1;
            if attempts >= ENROLLMENT_WRITE_ATTEMPTS {
                return Err(RepositoryError::Conflict("enrollments_status".to_string()).into());
            }
            debug!(%enrollment_id, "Enrollment changed during progress update, retrying");
        };

        if just_completed {
            info!(%enrollment_id, "Enrollment completed");
            self.event_bus
                .publish_enrollment_event(EnrollmentEvent::EnrollmentCompleted {
                    enrollment_id,
                    user_id,
                    course_id: enrollment.course_id,
                    completed_at: enrollment.completed_at.unwrap_or_else(Utc::now),
                });
        }

        Ok(enrollment)
    }
}
