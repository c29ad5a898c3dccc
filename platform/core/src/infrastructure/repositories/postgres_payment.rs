// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Payment Repository
//!
//! `PaymentRepository` backed by the `payments` table. Status changes are
//! written with `UPDATE ... WHERE status = <expected>` so two requests racing
//! on the same payment cannot both apply a transition. A refund claim fills
//! the refund columns of a `completed` row whose `refund_requested_at` is
//! still NULL, so only one request can go on to call the gateway.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::course::CourseId;
use crate::domain::payment::{Payment, PaymentId, PaymentStatus, RefundDetails};
use crate::domain::repository::{PaymentRepository, RepositoryError};
use crate::domain::user::UserId;

pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PAYMENT_COLUMNS: &str = "id, user_id, course_id, amount_cents, currency, gateway_intent_id, status, \
     failure_reason, refund_reason, refund_requested_at, gateway_refund_id, created_at, completed_at, updated_at";

fn row_to_payment(row: &PgRow) -> Result<Payment, RepositoryError> {
    let status: String = row.try_get("status")?;
    let refund_reason: Option<String> = row.try_get("refund_reason")?;
    let refund_requested_at: Option<DateTime<Utc>> = row.try_get("refund_requested_at")?;
    let refund = match refund_reason {
        Some(reason) => Some(RefundDetails {
            reason,
            requested_at: refund_requested_at.ok_or_else(|| {
                RepositoryError::Serialization("refund_reason set without refund_requested_at".to_string())
            })?,
            gateway_refund_id: row.try_get("gateway_refund_id")?,
        }),
        None => None,
    };

    Ok(Payment {
        id: PaymentId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        course_id: CourseId(row.try_get("course_id")?),
        amount_cents: row.try_get("amount_cents")?,
        currency: row.try_get("currency")?,
        gateway_intent_id: row.try_get("gateway_intent_id")?,
        status: PaymentStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Serialization(format!("unknown payment status '{}'", status)))?,
        failure_reason: row.try_get("failure_reason")?,
        refund,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn insert(&self, payment: &Payment) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, user_id, course_id, amount_cents, currency, gateway_intent_id, status,
                failure_reason, refund_reason, refund_requested_at, gateway_refund_id,
                created_at, completed_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(payment.id.0)
        .bind(payment.user_id.0)
        .bind(payment.course_id.0)
        .bind(payment.amount_cents)
        .bind(&payment.currency)
        .bind(&payment.gateway_intent_id)
        .bind(payment.status.as_str())
        .bind(&payment.failure_reason)
        .bind(payment.refund.as_ref().map(|r| r.reason.clone()))
        .bind(payment.refund.as_ref().map(|r| r.requested_at))
        .bind(payment.refund.as_ref().and_then(|r| r.gateway_refund_id.clone()))
        .bind(payment.created_at)
        .bind(payment.completed_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_if_status(&self, payment: &Payment, expected: PaymentStatus) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = $3,
                failure_reason = $4,
                refund_reason = $5,
                refund_requested_at = $6,
                gateway_refund_id = $7,
                completed_at = $8,
                updated_at = $9
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(payment.id.0)
        .bind(expected.as_str())
        .bind(payment.status.as_str())
        .bind(&payment.failure_reason)
        .bind(payment.refund.as_ref().map(|r| r.reason.clone()))
        .bind(payment.refund.as_ref().map(|r| r.requested_at))
        .bind(payment.refund.as_ref().and_then(|r| r.gateway_refund_id.clone()))
        .bind(payment.completed_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn claim_refund(&self, payment: &Payment) -> Result<bool, RepositoryError> {
        let Some(refund) = payment.refund.as_ref() else {
            return Ok(false);
        };
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                refund_reason = $2,
                refund_requested_at = $3,
                updated_at = $4
            WHERE id = $1 AND status = 'completed' AND refund_requested_at IS NULL
            "#,
        )
        .bind(payment.id.0)
        .bind(&refund.reason)
        .bind(refund.requested_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_refund_claim(&self, payment: &Payment) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE payments SET
                refund_reason = NULL,
                refund_requested_at = NULL,
                updated_at = $2
            WHERE id = $1 AND status = 'completed'
            "#,
        )
        .bind(payment.id.0)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_payment).transpose()
    }

    async fn find_by_intent_id(&self, intent_id: &str) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE gateway_intent_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(intent_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_payment).transpose()
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Payment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE user_id = $1 ORDER BY created_at DESC",
            PAYMENT_COLUMNS
        ))
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_payment).collect()
    }
}
