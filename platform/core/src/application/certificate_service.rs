// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::domain::certificate::{Certificate, CertificateError};
use crate::domain::enrollment::EnrollmentId;
use crate::domain::events::EnrollmentEvent;
use crate::domain::repository::{CertificateRepository, EnrollmentRepository, RepositoryError};
use crate::domain::user::UserId;
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Error)]
pub enum CertificateServiceError {
    #[error("Enrollment not found")]
    EnrollmentNotFound(EnrollmentId),

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[async_trait]
pub trait CertificateService: Send + Sync {
    /// Issue the certificate for a completed enrollment. Re-issuing returns
    /// the certificate that already exists.
    async fn issue_for_enrollment(&self, enrollment_id: EnrollmentId) -> Result<Certificate, CertificateServiceError>;

    async fn list_certificates(&self, user_id: UserId) -> Result<Vec<Certificate>, CertificateServiceError>;
}

pub struct StandardCertificateService {
    enrollments: Arc<dyn EnrollmentRepository>,
    certificates: Arc<dyn CertificateRepository>,
    event_bus: Arc<EventBus>,
}

impl StandardCertificateService {
    pub fn new(
        enrollments: Arc<dyn EnrollmentRepository>,
        certificates: Arc<dyn CertificateRepository>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            enrollments,
            certificates,
            event_bus,
        }
    }
}

#[async_trait]
impl CertificateService for StandardCertificateService {
    async fn issue_for_enrollment(&self, enrollment_id: EnrollmentId) -> Result<Certificate, CertificateServiceError> {
        let enrollment = self
            .enrollments
            .find_by_id(enrollment_id)
            .await?
            .ok_or(CertificateServiceError::EnrollmentNotFound(enrollment_id))?;

        let candidate = Certificate::issue(&enrollment)?;
        let (certificate, inserted) = self.certificates.insert_if_absent(&candidate).await?;
        if inserted {
            info!(
                %enrollment_id,
                certificate_number = %certificate.certificate_number,
                "Certificate issued"
            );
            metrics::counter!("lyceum_certificates_issued_total").increment(1);
            self.event_bus
                .publish_enrollment_event(EnrollmentEvent::CertificateIssued {
                    certificate_id: certificate.id,
                    enrollment_id,
                    user_id: certificate.user_id,
                    certificate_number: certificate.certificate_number.clone(),
                    issued_at: certificate.issued_at,
                });
        }
        Ok(certificate)
    }

    async fn list_certificates(&self, user_id: UserId) -> Result<Vec<Certificate>, CertificateServiceError> {
        Ok(self.certificates.find_by_user(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::course::CourseId;
    use crate::domain::enrollment::{Enrollment, EnrollmentStatus};
    use crate::infrastructure::repositories::{InMemoryCertificateRepository, InMemoryEnrollmentRepository};

    #[tokio::test]
    async fn test_issuance_is_idempotent() {
        let enrollments = Arc::new(InMemoryEnrollmentRepository::new());
        let service = StandardCertificateService::new(
            enrollments.clone(),
            Arc::new(InMemoryCertificateRepository::new()),
            Arc::new(EventBus::new(8)),
        );

        let mut enrollment = Enrollment::new(UserId::new(), CourseId::new(), None);
        enrollments.insert_if_absent(&enrollment).await.unwrap();

        let err = service.issue_for_enrollment(enrollment.id).await.unwrap_err();
        assert!(matches!(
            err,
            CertificateServiceError::Certificate(CertificateError::EnrollmentNotCompleted(_))
        ));

        enrollment.update_progress(100).unwrap();
        assert!(enrollments
            .update_if_status(&enrollment, EnrollmentStatus::Active)
            .await
            .unwrap());

        let first = service.issue_for_enrollment(enrollment.id).await.unwrap();
        let second = service.issue_for_enrollment(enrollment.id).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(first.certificate_number.starts_with("CERT-"));
        assert_eq!(service.list_certificates(enrollment.user_id).await.unwrap().len(), 1);
    }
}
