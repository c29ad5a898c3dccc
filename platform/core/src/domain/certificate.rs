// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Course completion certificates. One per enrollment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::course::CourseId;
use crate::domain::enrollment::{Enrollment, EnrollmentId, EnrollmentStatus};
use crate::domain::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CertificateId(pub Uuid);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub enrollment_id: EnrollmentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub certificate_number: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CertificateError {
    #[error("Enrollment {0} is not completed")]
    EnrollmentNotCompleted(EnrollmentId),
}

impl Certificate {
    pub fn issue(enrollment: &Enrollment) -> Result<Self, CertificateError> {
        if enrollment.status != EnrollmentStatus::Completed {
            return Err(CertificateError::EnrollmentNotCompleted(enrollment.id));
        }
        let id = Uuid::new_v4();
        let issued_at = Utc::now();
        Ok(Self {
            id: CertificateId(id),
            enrollment_id: enrollment.id,
            user_id: enrollment.user_id,
            course_id: enrollment.course_id,
            certificate_number: certificate_number(&id, issued_at),
            issued_at,
        })
    }
}

/// `CERT-YYYYMMDD-XXXXXXXX`
fn certificate_number(id: &Uuid, issued_at: DateTime<Utc>) -> String {
    let simple = id.simple().to_string();
    format!("CERT-{}-{}", issued_at.format("%Y%m%d"), simple[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_requires_completion() {
        let mut enrollment = Enrollment::new(UserId::new(), CourseId::new(), None);
        assert_eq!(
            Certificate::issue(&enrollment).unwrap_err(),
            CertificateError::EnrollmentNotCompleted(enrollment.id)
        );

        enrollment.update_progress(100).unwrap();
        let cert = Certificate::issue(&enrollment).unwrap();
        assert_eq!(cert.enrollment_id, enrollment.id);
        assert!(cert.certificate_number.starts_with("CERT-"));
        assert_eq!(cert.certificate_number.len(), "CERT-20260101-ABCDEF12".len());
    }
}
