// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Course Repository
//!
//! `CourseRepository` backed by the `courses` table.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::course::{Course, CourseId, CourseStatus};
use crate::domain::repository::{CourseRepository, RepositoryError};
use crate::domain::user::UserId;

pub struct PostgresCourseRepository {
    pool: PgPool,
}

impl PostgresCourseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const COURSE_COLUMNS: &str =
    "id, title, slug, instructor_id, price_cents, currency, is_free, status, created_at";

fn row_to_course(row: &PgRow) -> Result<Course, RepositoryError> {
    let status: String = row.try_get("status")?;
    Ok(Course {
        id: CourseId(row.try_get("id")?),
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        instructor_id: UserId(row.try_get("instructor_id")?),
        price_cents: row.try_get("price_cents")?,
        currency: row.try_get("currency")?,
        is_free: row.try_get("is_free")?,
        status: CourseStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Serialization(format!("unknown course status '{}'", status)))?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl CourseRepository for PostgresCourseRepository {
    async fn save(&self, course: &Course) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO courses (id, title, slug, instructor_id, price_cents, currency, is_free, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                slug = EXCLUDED.slug,
                price_cents = EXCLUDED.price_cents,
                currency = EXCLUDED.currency,
                is_free = EXCLUDED.is_free,
                status = EXCLUDED.status
            "#,
        )
        .bind(course.id.0)
        .bind(&course.title)
        .bind(&course.slug)
        .bind(course.instructor_id.0)
        .bind(course.price_cents)
        .bind(&course.currency)
        .bind(course.is_free)
        .bind(course.status.as_str())
        .bind(course.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: CourseId) -> Result<Option<Course>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM courses WHERE id = $1", COURSE_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_course).transpose()
    }

    async fn list(&self, published_only: bool) -> Result<Vec<Course>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM courses WHERE ($1 = FALSE OR status = 'published') ORDER BY title ASC",
            COURSE_COLUMNS
        ))
        .bind(published_only)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_course).collect()
    }
}
