// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Forum Poll Aggregate
//!
//! Polls attached to forum topics. Two voting modes:
//!
//! - **single choice** (`allow_multiple = false`): one vote per user per poll
//! - **multiple choice** (`allow_multiple = true`): one vote per user per option
//!
//! Both constraints are enforced by the vote store as unique keys; the names
//! below identify which key a conflicting insert hit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::user::UserId;

/// Unique key on `(user_id, option_id)`.
pub const UNIQUE_VOTE_PER_OPTION: &str = "poll_votes_user_option_key";
/// Partial unique key on `(poll_id, user_id)` for single-choice votes.
pub const UNIQUE_VOTE_PER_POLL: &str = "poll_votes_single_choice_idx";

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PollId(pub Uuid);

impl PollId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PollId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PollOptionId(pub Uuid);

impl PollOptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PollOptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Forum topics are managed elsewhere; polls only reference them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicId(pub Uuid);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollOption {
    pub id: PollOptionId,
    pub poll_id: PollId,
    pub text: String,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub topic_id: TopicId,
    pub question: String,
    pub allow_multiple: bool,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub options: Vec<PollOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollVote {
    pub id: Uuid,
    pub poll_id: PollId,
    pub option_id: PollOptionId,
    pub user_id: UserId,
    pub voted_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("Invalid poll: {0}")]
    Invalid(String),

    #[error("This poll is no longer active")]
    Inactive,

    #[error("This poll has expired")]
    Expired,

    #[error("Option does not belong to this poll")]
    UnknownOption,

    #[error("You have already voted for this option")]
    AlreadyVotedForOption,

    #[error("You have already voted in this poll")]
    AlreadyVotedInPoll,

    #[error("Only the poll creator can close this poll")]
    NotCreator,
}

impl Poll {
    pub fn new(
        topic_id: TopicId,
        question: &str,
        option_texts: &[String],
        allow_multiple: bool,
        expires_at: Option<DateTime<Utc>>,
        created_by: UserId,
    ) -> Result<Self, PollError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PollError::Invalid("question cannot be empty".to_string()));
        }
        if option_texts.len() < MIN_OPTIONS || option_texts.len() > MAX_OPTIONS {
            return Err(PollError::Invalid(format!(
                "a poll needs between {} and {} options",
                MIN_OPTIONS, MAX_OPTIONS
            )));
        }

        let now = Utc::now();
        if let Some(expiry) = expires_at {
            if expiry <= now {
                return Err(PollError::Invalid("expiry must be in the future".to_string()));
            }
        }

        let id = PollId::new();
        let mut seen = HashSet::new();
        let mut options = Vec::with_capacity(option_texts.len());
        for (position, text) in option_texts.iter().enumerate() {
            let text = text.trim();
            if text.is_empty() {
                return Err(PollError::Invalid("option text cannot be empty".to_string()));
            }
            if !seen.insert(text.to_lowercase()) {
                return Err(PollError::Invalid(format!("duplicate option '{}'", text)));
            }
            options.push(PollOption {
                id: PollOptionId::new(),
                poll_id: id,
                text: text.to_string(),
                position: position as i32,
            });
        }

        Ok(Self {
            id,
            topic_id,
            question: question.to_string(),
            allow_multiple,
            is_active: true,
            expires_at,
            created_by,
            created_at: now,
            options,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| now >= expiry)
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired(now)
    }

    /// Guard clauses that run before a vote is written.
    pub fn ensure_accepts_vote(&self, option_id: PollOptionId, now: DateTime<Utc>) -> Result<(), PollError> {
        if !self.is_active {
            return Err(PollError::Inactive);
        }
        if self.is_expired(now) {
            return Err(PollError::Expired);
        }
        if !self.options.iter().any(|o| o.id == option_id) {
            return Err(PollError::UnknownOption);
        }
        Ok(())
    }

    pub fn close(&mut self, by: UserId) -> Result<(), PollError> {
        if by != self.created_by {
            return Err(PollError::NotCreator);
        }
        self.is_active = false;
        Ok(())
    }

    pub fn cast(&self, option_id: PollOptionId, user_id: UserId) -> PollVote {
        PollVote {
            id: Uuid::new_v4(),
            poll_id: self.id,
            option_id,
            user_id,
            voted_at: Utc::now(),
        }
    }
}

/// Map a unique-key conflict reported by the vote store to a domain error.
pub fn vote_conflict(constraint: &str) -> PollError {
    if constraint == UNIQUE_VOTE_PER_POLL {
        PollError::AlreadyVotedInPoll
    } else {
        PollError::AlreadyVotedForOption
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionTally {
    pub option_id: PollOptionId,
    pub text: String,
    pub votes: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResults {
    pub poll_id: PollId,
    pub question: String,
    pub allow_multiple: bool,
    pub is_open: bool,
    pub total_votes: u64,
    pub voter_count: u64,
    pub options: Vec<OptionTally>,
}

impl PollResults {
    /// Build results from per-option row counts. Options without rows count as zero.
    pub fn tally(
        poll: &Poll,
        counts: &HashMap<PollOptionId, u64>,
        voter_count: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let total_votes: u64 = poll
            .options
            .iter()
            .map(|o| counts.get(&o.id).copied().unwrap_or(0))
            .sum();

        let mut options: Vec<OptionTally> = poll
            .options
            .iter()
            .map(|o| {
                let votes = counts.get(&o.id).copied().unwrap_or(0);
                OptionTally {
                    option_id: o.id,
                    text: o.text.clone(),
                    votes,
                    percentage: percentage(votes, total_votes),
                }
            })
            .collect();
        options.sort_by_key(|t| {
            poll.options
                .iter()
                .find(|o| o.id == t.option_id)
                .map(|o| o.position)
                .unwrap_or(i32::MAX)
        });

        Self {
            poll_id: poll.id,
            question: poll.question.clone(),
            allow_multiple: poll.allow_multiple,
            is_open: poll.is_open(now),
            total_votes,
            voter_count,
            options,
        }
    }
}

fn percentage(votes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((votes as f64 / total as f64) * 10_000.0).round() / 100.0
}
