// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Dispatches queued [`JobDescriptor`]s to the application services.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

use crate::application::certificate_service::{CertificateService, CertificateServiceError};
use crate::infrastructure::job_queue::{JobDescriptor, JobError, JobHandler};

pub struct PlatformJobHandler {
    certificates: Arc<dyn CertificateService>,
}

impl PlatformJobHandler {
    pub fn new(certificates: Arc<dyn CertificateService>) -> Self {
        Self { certificates }
    }
}

impl From<CertificateServiceError> for JobError {
    fn from(err: CertificateServiceError) -> Self {
        match err {
            // Storage hiccups may clear up; anything else will fail the same way again
            CertificateServiceError::Repository(e) => JobError::Transient(e.to_string()),
            other => JobError::Permanent(other.to_string()),
        }
    }
}

#[async_trait]
impl JobHandler for PlatformJobHandler {
    async fn handle(&self, job: &JobDescriptor) -> Result<(), JobError> {
        match job {
            JobDescriptor::IssueCertificate { enrollment_id } => {
                self.certificates.issue_for_enrollment(*enrollment_id).await?;
                Ok(())
            }
        }
    }

    async fn failed(&self, job: &JobDescriptor, error: &JobError, attempts: u32) {
        // Issuance is a single insert, so a failed job leaves nothing behind to undo
        match job {
            JobDescriptor::IssueCertificate { enrollment_id } => {
                error!(
                    %enrollment_id,
                    attempts,
                    error = %error,
                    "Certificate issuance abandoned"
                );
                metrics::counter!("lyceum_certificate_issuance_failed_total").increment(1);
            }
        }
    }
}
