// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Vote uniqueness under concurrency and result tallies.

mod common;

use chrono::{Duration, Utc};
use futures::future::join_all;
use uuid::Uuid;

use common::Harness;
use lyceum_core::application::poll_service::{CreatePollRequest, PollService, PollServiceError};
use lyceum_core::domain::poll::{Poll, PollError};
use lyceum_core::domain::repository::PollRepository;
use lyceum_core::domain::user::UserId;

fn request(allow_multiple: bool) -> CreatePollRequest {
    CreatePollRequest {
        topic_id: Uuid::new_v4(),
        question: "Next study group topic?".into(),
        options: vec!["Lifetimes".into(), "Macros".into(), "Unsafe".into(), "FFI".into()],
        allow_multiple,
        expires_at: None,
    }
}

async fn create(h: &Harness, allow_multiple: bool) -> Poll {
    h.poll_service.create_poll(UserId::new(), request(allow_multiple)).await.unwrap()
}

#[tokio::test]
async fn test_concurrent_single_choice_votes_keep_one_row() {
    let h = Harness::new();
    let poll = create(&h, false).await;
    let voter = UserId::new();

    let attempts = poll.options.iter().cycle().take(24).map(|option| {
        let service = h.poll_service.clone();
        let (poll_id, option_id) = (poll.id, option.id);
        tokio::spawn(async move { service.vote(voter, poll_id, option_id).await })
    });
    let outcomes: Vec<_> = join_all(attempts).await.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    for rejected in outcomes.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(
            rejected,
            PollServiceError::Poll(PollError::AlreadyVotedInPoll | PollError::AlreadyVotedForOption)
        ));
    }
    assert_eq!(h.polls.find_votes_by_user(poll.id, voter).await.unwrap().len(), 1);

    let results = h.poll_service.get_poll_results(poll.id).await.unwrap();
    assert_eq!(results.total_votes, 1);
    assert_eq!(results.voter_count, 1);
}

#[tokio::test]
async fn test_concurrent_multiple_choice_votes_keep_one_row_per_option() {
    let h = Harness::new();
    let poll = create(&h, true).await;
    let voter = UserId::new();

    let attempts = poll.options.iter().cycle().take(poll.options.len() * 4).map(|option| {
        let service = h.poll_service.clone();
        let (poll_id, option_id) = (poll.id, option.id);
        tokio::spawn(async move { service.vote(voter, poll_id, option_id).await })
    });
    let accepted = join_all(attempts)
        .await
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();

    assert_eq!(accepted, poll.options.len());
    let results = h.poll_service.get_poll_results(poll.id).await.unwrap();
    assert!(results.options.iter().all(|o| o.votes == 1));
    assert_eq!(results.voter_count, 1);
}

#[tokio::test]
async fn test_percentages_sum_to_one_hundred() {
    let h = Harness::new();
    let poll = create(&h, false).await;

    for (i, option) in [0, 0, 0, 1, 1, 2].iter().map(|&i| &poll.options[i]).enumerate() {
        let voter = UserId(Uuid::from_u128(i as u128 + 1));
        h.poll_service.vote(voter, poll.id, option.id).await.unwrap();
    }

    let results = h.poll_service.get_poll_results(poll.id).await.unwrap();
    assert_eq!(results.total_votes, 6);
    let percentages: Vec<f64> = results.options.iter().map(|o| o.percentage).collect();
    assert_eq!(percentages, vec![50.0, 33.33, 16.67, 0.0]);
    let sum: f64 = percentages.iter().sum();
    assert!((sum - 100.0).abs() < 0.05);
}

#[tokio::test]
async fn test_empty_poll_reports_zero_percentages() {
    let h = Harness::new();
    let poll = create(&h, false).await;
    let results = h.poll_service.get_poll_results(poll.id).await.unwrap();
    assert_eq!(results.total_votes, 0);
    assert!(results.options.iter().all(|o| o.percentage == 0.0));
    assert!(results.is_open);
}

#[tokio::test]
async fn test_expired_poll_rejects_votes() {
    let h = Harness::new();
    let mut poll = create(&h, false).await;
    poll.expires_at = Some(Utc::now() - Duration::minutes(1));
    h.polls.save(&poll).await.unwrap();

    let err = h
        .poll_service
        .vote(UserId::new(), poll.id, poll.options[0].id)
        .await
        .unwrap_err();
    assert!(matches!(err, PollServiceError::Poll(PollError::Expired)));
    assert_eq!(err.to_string(), "This poll has expired");
}

#[tokio::test]
async fn test_invalid_poll_definitions() {
    let h = Harness::new();
    let mut single_option = request(false);
    single_option.options.truncate(1);
    assert!(matches!(
        h.poll_service.create_poll(UserId::new(), single_option).await,
        Err(PollServiceError::Poll(PollError::Invalid(_)))
    ));

    let mut past = request(false);
    past.expires_at = Some(Utc::now() - Duration::hours(1));
    assert!(matches!(
        h.poll_service.create_poll(UserId::new(), past).await,
        Err(PollServiceError::Poll(PollError::Invalid(_)))
    ));
}
