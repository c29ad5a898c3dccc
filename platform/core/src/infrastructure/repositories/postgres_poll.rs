// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Poll Repository
//!
//! Polls, options and votes. Poll creation writes the poll and every option in
//! one transaction. Votes are a single `INSERT`; the schema carries two unique
//! keys on `poll_votes`:
//!
//! - `poll_votes_user_option_key (user_id, option_id)`
//! - `poll_votes_single_choice_idx (poll_id, user_id) WHERE exclusive`
//!
//! A violation surfaces as `RepositoryError::Conflict(<constraint>)`.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use std::collections::HashMap;

use crate::domain::poll::{Poll, PollId, PollOption, PollOptionId, PollVote, TopicId};
use crate::domain::repository::{PollRepository, RepositoryError};
use crate::domain::user::UserId;

pub struct PostgresPollRepository {
    pool: PgPool,
}

impl PostgresPollRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_option(row: &PgRow) -> Result<PollOption, RepositoryError> {
    Ok(PollOption {
        id: PollOptionId(row.try_get("id")?),
        poll_id: PollId(row.try_get("poll_id")?),
        text: row.try_get("text")?,
        position: row.try_get("position")?,
    })
}

fn row_to_vote(row: &PgRow) -> Result<PollVote, RepositoryError> {
    Ok(PollVote {
        id: row.try_get("id")?,
        poll_id: PollId(row.try_get("poll_id")?),
        option_id: PollOptionId(row.try_get("option_id")?),
        user_id: UserId(row.try_get("user_id")?),
        voted_at: row.try_get("voted_at")?,
    })
}

#[async_trait]
impl PollRepository for PostgresPollRepository {
    async fn create(&self, poll: &Poll) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO polls (id, topic_id, question, allow_multiple, is_active, expires_at, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(poll.id.0)
        .bind(poll.topic_id.0)
        .bind(&poll.question)
        .bind(poll.allow_multiple)
        .bind(poll.is_active)
        .bind(poll.expires_at)
        .bind(poll.created_by.0)
        .bind(poll.created_at)
        .execute(&mut *tx)
        .await?;

        for option in &poll.options {
            sqlx::query(
                r#"
                INSERT INTO poll_options (id, poll_id, text, position)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(option.id.0)
            .bind(poll.id.0)
            .bind(&option.text)
            .bind(option.position)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn save(&self, poll: &Poll) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE polls SET is_active = $2, expires_at = $3 WHERE id = $1")
            .bind(poll.id.0)
            .bind(poll.is_active)
            .bind(poll.expires_at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("poll {}", poll.id)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: PollId) -> Result<Option<Poll>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, topic_id, question, allow_multiple, is_active, expires_at, created_by, created_at
            FROM polls
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let option_rows = sqlx::query(
            "SELECT id, poll_id, text, position FROM poll_options WHERE poll_id = $1 ORDER BY position ASC",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        let options = option_rows.iter().map(row_to_option).collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Poll {
            id: PollId(row.try_get("id")?),
            topic_id: TopicId(row.try_get("topic_id")?),
            question: row.try_get("question")?,
            allow_multiple: row.try_get("allow_multiple")?,
            is_active: row.try_get("is_active")?,
            expires_at: row.try_get("expires_at")?,
            created_by: UserId(row.try_get("created_by")?),
            created_at: row.try_get("created_at")?,
            options,
        }))
    }

    async fn record_vote(&self, vote: &PollVote, exclusive: bool) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO poll_votes (id, poll_id, option_id, user_id, exclusive, voted_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(vote.id)
        .bind(vote.poll_id.0)
        .bind(vote.option_id.0)
        .bind(vote.user_id.0)
        .bind(exclusive)
        .bind(vote.voted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count_votes(&self, poll_id: PollId) -> Result<HashMap<PollOptionId, u64>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT option_id, COUNT(*) AS votes
            FROM poll_votes
            WHERE poll_id = $1
            GROUP BY option_id
            "#,
        )
        .bind(poll_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            let votes: i64 = row.try_get("votes")?;
            counts.insert(PollOptionId(row.try_get("option_id")?), votes.max(0) as u64);
        }
        Ok(counts)
    }

    async fn count_voters(&self, poll_id: PollId) -> Result<u64, RepositoryError> {
        let voters: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT user_id) FROM poll_votes WHERE poll_id = $1")
            .bind(poll_id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(voters.max(0) as u64)
    }

    async fn find_votes_by_user(&self, poll_id: PollId, user_id: UserId) -> Result<Vec<PollVote>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, poll_id, option_id, user_id, voted_at
            FROM poll_votes
            WHERE poll_id = $1 AND user_id = $2
            ORDER BY voted_at ASC
            "#,
        )
        .bind(poll_id.0)
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_vote).collect()
    }
}
