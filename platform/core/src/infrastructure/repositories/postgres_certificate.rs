// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::certificate::{Certificate, CertificateId};
use crate::domain::course::CourseId;
use crate::domain::enrollment::EnrollmentId;
use crate::domain::repository::{CertificateRepository, RepositoryError};
use crate::domain::user::UserId;

pub struct PostgresCertificateRepository {
    pool: PgPool,
}

impl PostgresCertificateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CERTIFICATE_COLUMNS: &str = "id, enrollment_id, user_id, course_id, certificate_number, issued_at";

fn row_to_certificate(row: &PgRow) -> Result<Certificate, RepositoryError> {
    Ok(Certificate {
        id: CertificateId(row.try_get("id")?),
        enrollment_id: EnrollmentId(row.try_get("enrollment_id")?),
        user_id: UserId(row.try_get("user_id")?),
        course_id: CourseId(row.try_get("course_id")?),
        certificate_number: row.try_get("certificate_number")?,
        issued_at: row.try_get("issued_at")?,
    })
}

#[async_trait]
impl CertificateRepository for PostgresCertificateRepository {
    async fn insert_if_absent(&self, certificate: &Certificate) -> Result<(Certificate, bool), RepositoryError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO certificates (id, enrollment_id, user_id, course_id, certificate_number, issued_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (enrollment_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(certificate.id.0)
        .bind(certificate.enrollment_id.0)
        .bind(certificate.user_id.0)
        .bind(certificate.course_id.0)
        .bind(&certificate.certificate_number)
        .bind(certificate.issued_at)
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_some() {
            return Ok((certificate.clone(), true));
        }

        let existing = self
            .find_by_enrollment(certificate.enrollment_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("certificate for enrollment {}", certificate.enrollment_id)))?;
        Ok((existing, false))
    }

    async fn find_by_enrollment(&self, enrollment_id: EnrollmentId) -> Result<Option<Certificate>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM certificates WHERE enrollment_id = $1",
            CERTIFICATE_COLUMNS
        ))
        .bind(enrollment_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_certificate).transpose()
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Certificate>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM certificates WHERE user_id = $1 ORDER BY issued_at DESC",
            CERTIFICATE_COLUMNS
        ))
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_certificate).collect()
    }
}
