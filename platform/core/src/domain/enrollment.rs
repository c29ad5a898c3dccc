// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Enrollment Aggregate
//!
//! A (user, course) record granting access to a course, with a progress
//! percentage and a lifecycle status. At most one enrollment exists per
//! (user, course); a cancelled enrollment is reactivated rather than
//! duplicated when the user buys the course again.
//!
//! ```text
//! active ──(progress = 100)──► completed
//!   │                             │
//!   └──────────(cancel)───────────┴──► cancelled ──(reactivate)──► active
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::course::CourseId;
use crate::domain::payment::PaymentId;
use crate::domain::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnrollmentId(pub Uuid);

impl EnrollmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EnrollmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EnrollmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Cancelled,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether the enrollment currently grants course access.
    pub fn grants_access(&self) -> bool {
        matches!(self, Self::Active | Self::Completed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub payment_id: Option<PaymentId>,
    pub status: EnrollmentStatus,
    pub progress_percentage: u8,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnrollmentError {
    #[error("Progress must be between 0 and 100, got {0}")]
    InvalidProgress(u16),

    #[error("Enrollment is cancelled")]
    Cancelled,

    #[error("Enrollment is already cancelled")]
    AlreadyCancelled,

    #[error("Enrollment is not cancelled")]
    NotCancelled,
}

impl Enrollment {
    pub fn new(user_id: UserId, course_id: CourseId, payment_id: Option<PaymentId>) -> Self {
        Self {
            id: EnrollmentId::new(),
            user_id,
            course_id,
            payment_id,
            status: EnrollmentStatus::Active,
            progress_percentage: 0,
            enrolled_at: Utc::now(),
            completed_at: None,
            cancelled_at: None,
        }
    }

    /// Record learner progress. Returns `true` when this update completed the
    /// enrollment.
    pub fn update_progress(&mut self, percentage: u16) -> Result<bool, EnrollmentError> {
        if percentage > 100 {
            return Err(EnrollmentError::InvalidProgress(percentage));
        }
        if self.status == EnrollmentStatus::Cancelled {
            return Err(EnrollmentError::Cancelled);
        }

        let percentage = percentage as u8;
        if percentage > self.progress_percentage {
            self.progress_percentage = percentage;
        }

        if self.progress_percentage == 100 && self.status == EnrollmentStatus::Active {
            self.status = EnrollmentStatus::Completed;
            self.completed_at = Some(Utc::now());
            return Ok(true);
        }
        Ok(false)
    }

    pub fn cancel(&mut self) -> Result<(), EnrollmentError> {
        if self.status == EnrollmentStatus::Cancelled {
            return Err(EnrollmentError::AlreadyCancelled);
        }
        self.status = EnrollmentStatus::Cancelled;
        self.cancelled_at = Some(Utc::now());
        Ok(())
    }

    pub fn reactivate(&mut self, payment_id: Option<PaymentId>) -> Result<(), EnrollmentError> {
        if self.status != EnrollmentStatus::Cancelled {
            return Err(EnrollmentError::NotCancelled);
        }
        self.status = EnrollmentStatus::Active;
        self.payment_id = payment_id;
        self.progress_percentage = 0;
        self.enrolled_at = Utc::now();
        self.completed_at = None;
        self.cancelled_at = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enrollment() -> Enrollment {
        Enrollment::new(UserId::new(), CourseId::new(), None)
    }

    #[test]
    fn test_progress_completes_at_100() {
        let mut e = enrollment();
        assert_eq!(e.update_progress(40), Ok(false));
        assert_eq!(e.status, EnrollmentStatus::Active);
        assert_eq!(e.update_progress(100), Ok(true));
        assert_eq!(e.status, EnrollmentStatus::Completed);
        assert!(e.completed_at.is_some());
        // Further updates don't complete twice
        assert_eq!(e.update_progress(100), Ok(false));
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut e = enrollment();
        e.update_progress(70).unwrap();
        e.update_progress(20).unwrap();
        assert_eq!(e.progress_percentage, 70);
    }

    #[test]
    fn test_invalid_progress_rejected() {
        let mut e = enrollment();
        assert_eq!(e.update_progress(101), Err(EnrollmentError::InvalidProgress(101)));
    }

    #[test]
    fn test_cancelled_enrollment() {
        let mut e = enrollment();
        e.cancel().unwrap();
        assert_eq!(e.cancel(), Err(EnrollmentError::AlreadyCancelled));
        assert_eq!(e.update_progress(10), Err(EnrollmentError::Cancelled));
        assert!(!e.status.grants_access());

        let payment = PaymentId::new();
        e.reactivate(Some(payment)).unwrap();
        assert_eq!(e.status, EnrollmentStatus::Active);
        assert_eq!(e.payment_id, Some(payment));
        assert_eq!(e.reactivate(None), Err(EnrollmentError::NotCancelled));
    }
}
