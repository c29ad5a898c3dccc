// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Enrollment Repository
//!
//! `EnrollmentRepository` backed by the `enrollments` table. The
//! `enrollments_user_course_key` unique constraint is what makes
//! `insert_if_absent` safe under concurrent confirmations: the insert uses
//! `ON CONFLICT DO NOTHING` and the loser reads the winner's row. Updates are
//! compare-and-set on the stored status.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::course::CourseId;
use crate::domain::enrollment::{Enrollment, EnrollmentId, EnrollmentStatus};
use crate::domain::payment::PaymentId;
use crate::domain::repository::{EnrollmentRepository, RepositoryError};
use crate::domain::user::UserId;

pub struct PostgresEnrollmentRepository {
    pool: PgPool,
}

impl PostgresEnrollmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ENROLLMENT_COLUMNS: &str = "id, user_id, course_id, payment_id, status, progress_percentage, \
     enrolled_at, completed_at, cancelled_at";

fn row_to_enrollment(row: &PgRow) -> Result<Enrollment, RepositoryError> {
    let status: String = row.try_get("status")?;
    let progress: i16 = row.try_get("progress_percentage")?;
    let payment_id: Option<uuid::Uuid> = row.try_get("payment_id")?;
    Ok(Enrollment {
        id: EnrollmentId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        course_id: CourseId(row.try_get("course_id")?),
        payment_id: payment_id.map(PaymentId),
        status: EnrollmentStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Serialization(format!("unknown enrollment status '{}'", status)))?,
        progress_percentage: u8::try_from(progress)
            .map_err(|_| RepositoryError::Serialization(format!("invalid progress {}", progress)))?,
        enrolled_at: row.try_get("enrolled_at")?,
        completed_at: row.try_get("completed_at")?,
        cancelled_at: row.try_get("cancelled_at")?,
    })
}

#[async_trait]
impl EnrollmentRepository for PostgresEnrollmentRepository {
    async fn insert_if_absent(&self, enrollment: &Enrollment) -> Result<(Enrollment, bool), RepositoryError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO enrollments (
                id, user_id, course_id, payment_id, status, progress_percentage,
                enrolled_at, completed_at, cancelled_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT ON CONSTRAINT enrollments_user_course_key DO NOTHING
            RETURNING id
            "#,
        )
        .bind(enrollment.id.0)
        .bind(enrollment.user_id.0)
        .bind(enrollment.course_id.0)
        .bind(enrollment.payment_id.map(|p| p.0))
        .bind(enrollment.status.as_str())
        .bind(enrollment.progress_percentage as i16)
        .bind(enrollment.enrolled_at)
        .bind(enrollment.completed_at)
        .bind(enrollment.cancelled_at)
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_some() {
            return Ok((enrollment.clone(), true));
        }

        let existing = self
            .find_by_user_and_course(enrollment.user_id, enrollment.course_id)
            .await?
            .ok_or_else(|| {
                RepositoryError::NotFound(format!(
                    "enrollment for user {} in course {} vanished after conflict",
                    enrollment.user_id, enrollment.course_id
                ))
            })?;
        Ok((existing, false))
    }

    async fn update_if_status(
        &self,
        enrollment: &Enrollment,
        expected: EnrollmentStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE enrollments SET
                payment_id = $3,
                status = $4,
                progress_percentage = $5,
                enrolled_at = $6,
                completed_at = $7,
                cancelled_at = $8
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(enrollment.id.0)
        .bind(expected.as_str())
        .bind(enrollment.payment_id.map(|p| p.0))
        .bind(enrollment.status.as_str())
        .bind(enrollment.progress_percentage as i16)
        .bind(enrollment.enrolled_at)
        .bind(enrollment.completed_at)
        .bind(enrollment.cancelled_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_by_id(&self, id: EnrollmentId) -> Result<Option<Enrollment>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM enrollments WHERE id = $1", ENROLLMENT_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_enrollment).transpose()
    }

    async fn find_by_user_and_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM enrollments WHERE user_id = $1 AND course_id = $2",
            ENROLLMENT_COLUMNS
        ))
        .bind(user_id.0)
        .bind(course_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_enrollment).transpose()
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Enrollment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM enrollments WHERE user_id = $1 ORDER BY enrolled_at DESC",
            ENROLLMENT_COLUMNS
        ))
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_enrollment).collect()
    }
}
