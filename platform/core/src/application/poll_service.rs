// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Poll Application Service
//!
//! Votes are written with a single insert. Duplicate detection is left to the
//! store's unique keys (one vote per user and option, plus one vote per user
//! and poll for single-choice polls); a conflict comes back as
//! [`RepositoryError::Conflict`] naming the violated key and is mapped to the
//! matching [`PollError`]. Results are always counted from stored votes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::events::ForumEvent;
use crate::domain::poll::{vote_conflict, Poll, PollError, PollId, PollOptionId, PollResults, PollVote, TopicId};
use crate::domain::repository::{PollRepository, RepositoryError};
use crate::domain::user::UserId;
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePollRequest {
    pub topic_id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub allow_multiple: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum PollServiceError {
    #[error("Poll not found")]
    NotFound(PollId),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[async_trait]
pub trait PollService: Send + Sync {
    async fn create_poll(&self, creator: UserId, request: CreatePollRequest) -> Result<Poll, PollServiceError>;

    async fn vote(
        &self,
        user_id: UserId,
        poll_id: PollId,
        option_id: PollOptionId,
    ) -> Result<PollVote, PollServiceError>;

    async fn get_poll_results(&self, poll_id: PollId) -> Result<PollResults, PollServiceError>;

    async fn close_poll(&self, user_id: UserId, poll_id: PollId) -> Result<Poll, PollServiceError>;
}

pub struct StandardPollService {
    repository: Arc<dyn PollRepository>,
    event_bus: Arc<EventBus>,
}

impl StandardPollService {
    pub fn new(repository: Arc<dyn PollRepository>, event_bus: Arc<EventBus>) -> Self {
        Self { repository, event_bus }
    }

    async fn load(&self, poll_id: PollId) -> Result<Poll, PollServiceError> {
        self.repository
            .find_by_id(poll_id)
            .await?
            .ok_or(PollServiceError::NotFound(poll_id))
    }
}

#[async_trait]
impl PollService for StandardPollService {
    async fn create_poll(&self, creator: UserId, request: CreatePollRequest) -> Result<Poll, PollServiceError> {
        let poll = Poll::new(
            TopicId(request.topic_id),
            &request.question,
            &request.options,
            request.allow_multiple,
            request.expires_at,
            creator,
        )?;
        self.repository.create(&poll).await?;

        info!(poll_id = %poll.id, options = poll.options.len(), "Poll created");
        self.event_bus.publish_forum_event(ForumEvent::PollCreated {
            poll_id: poll.id,
            created_by: creator,
            created_at: poll.created_at,
        });
        Ok(poll)
    }

    async fn vote(
        &self,
        user_id: UserId,
        poll_id: PollId,
        option_id: PollOptionId,
    ) -> Result<PollVote, PollServiceError> {
        let poll = self.load(poll_id).await?;
        poll.ensure_accepts_vote(option_id, Utc::now())?;

        let vote = poll.cast(option_id, user_id);
        match self.repository.record_vote(&vote, !poll.allow_multiple).await {
            Ok(()) => {}
            Err(RepositoryError::Conflict(constraint)) => {
                debug!(%poll_id, %user_id, constraint, "Duplicate vote rejected");
                metrics::counter!("lyceum_poll_votes_rejected_total").increment(1);
                return Err(vote_conflict(&constraint).into());
            }
            Err(e) => return Err(e.into()),
        }

        metrics::counter!("lyceum_poll_votes_total").increment(1);
        self.event_bus.publish_forum_event(ForumEvent::VoteCast {
            poll_id,
            option_id,
            user_id,
            voted_at: vote.voted_at,
        });
        Ok(vote)
    }

    async fn get_poll_results(&self, poll_id: PollId) -> Result<PollResults, PollServiceError> {
        let poll = self.load(poll_id).await?;
        let counts = self.repository.count_votes(poll_id).await?;
        let voters = self.repository.count_voters(poll_id).await?;
        Ok(PollResults::tally(&poll, &counts, voters, Utc::now()))
    }

    async fn close_poll(&self, user_id: UserId, poll_id: PollId) -> Result<Poll, PollServiceError> {
        let mut poll = self.load(poll_id).await?;
        poll.close(user_id)?;
        self.repository.save(&poll).await?;

        info!(%poll_id, "Poll closed");
        self.event_bus.publish_forum_event(ForumEvent::PollClosed {
            poll_id,
            closed_at: Utc::now(),
        });
        Ok(poll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::InMemoryPollRepository;

    fn service() -> StandardPollService {
        StandardPollService::new(Arc::new(InMemoryPollRepository::new()), Arc::new(EventBus::new(16)))
    }

    fn request(allow_multiple: bool) -> CreatePollRequest {
        CreatePollRequest {
            topic_id: Uuid::new_v4(),
            question: "Which runtime?".into(),
            options: vec!["tokio".into(), "async-std".into(), "smol".into()],
            allow_multiple,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_single_choice_rejects_second_option() {
        let service = service();
        let poll = service.create_poll(UserId::new(), request(false)).await.unwrap();
        let voter = UserId::new();

        service.vote(voter, poll.id, poll.options[0].id).await.unwrap();
        let err = service.vote(voter, poll.id, poll.options[1].id).await.unwrap_err();
        assert!(matches!(err, PollServiceError::Poll(PollError::AlreadyVotedInPoll)));

        let err = service.vote(voter, poll.id, poll.options[0].id).await.unwrap_err();
        assert!(matches!(err, PollServiceError::Poll(PollError::AlreadyVotedForOption)));
    }

    #[tokio::test]
    async fn test_multiple_choice_results() {
        let service = service();
        let poll = service.create_poll(UserId::new(), request(true)).await.unwrap();
        let (a, b) = (UserId::new(), UserId::new());

        service.vote(a, poll.id, poll.options[0].id).await.unwrap();
        service.vote(a, poll.id, poll.options[1].id).await.unwrap();
        service.vote(b, poll.id, poll.options[0].id).await.unwrap();

        let results = service.get_poll_results(poll.id).await.unwrap();
        assert_eq!(results.total_votes, 3);
        assert_eq!(results.voter_count, 2);
        assert_eq!(results.options[0].votes, 2);
        assert_eq!(results.options[0].percentage, 66.67);
        assert_eq!(results.options[1].percentage, 33.33);
        assert_eq!(results.options[2].percentage, 0.0);
    }

    #[tokio::test]
    async fn test_closed_poll_rejects_votes() {
        let service = service();
        let creator = UserId::new();
        let poll = service.create_poll(creator, request(false)).await.unwrap();

        let err = service.close_poll(UserId::new(), poll.id).await.unwrap_err();
        assert!(matches!(err, PollServiceError::Poll(PollError::NotCreator)));

        service.close_poll(creator, poll.id).await.unwrap();
        let err = service.vote(UserId::new(), poll.id, poll.options[0].id).await.unwrap_err();
        assert!(matches!(err, PollServiceError::Poll(PollError::Inactive)));

        let results = service.get_poll_results(poll.id).await.unwrap();
        assert!(!results.is_open);
    }

    #[tokio::test]
    async fn test_option_from_another_poll() {
        let service = service();
        let first = service.create_poll(UserId::new(), request(false)).await.unwrap();
        let second = service.create_poll(UserId::new(), request(false)).await.unwrap();

        let err = service
            .vote(UserId::new(), first.id, second.options[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, PollServiceError::Poll(PollError::UnknownOption)));
    }
}
