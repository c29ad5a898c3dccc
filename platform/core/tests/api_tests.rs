// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP status codes and bodies, driven through the router with `oneshot`.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::Harness;
use lyceum_core::domain::course::Price;
use lyceum_core::domain::payment::{Payment, PaymentId};
use lyceum_core::domain::payment_gateway::IntentStatus;
use lyceum_core::domain::repository::PaymentRepository;
use lyceum_core::domain::user::UserId;
use lyceum_core::presentation::app;

async fn send(router: &Router, method: &str, uri: &str, user: Option<UserId>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new();
    let router = app(h.app_state());
    let (status, body) = send(&router, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let h = Harness::new();
    let router = app(h.app_state());

    let (status, body) = send(&router, "GET", "/api/payments", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("X-User-Id"));

    let request = Request::builder()
        .uri("/api/enrollments")
        .header("X-User-Id", "not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_course_lifecycle_over_http() {
    let h = Harness::new();
    let router = app(h.app_state());
    let instructor = UserId::new();

    let (status, course) = send(
        &router,
        "POST",
        "/api/courses",
        Some(instructor),
        Some(json!({ "title": "Embedded Rust", "price_cents": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let course_id = course["id"].as_str().unwrap().to_string();

    // Drafts are not listed and cannot be joined
    let (_, listed) = send(&router, "GET", "/api/courses", None, None).await;
    assert_eq!(listed.as_array().unwrap().len(), 0);
    let learner = UserId::new();
    let (status, _) = send(&router, "POST", &format!("/api/courses/{}/enroll", course_id), Some(learner), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&router, "POST", &format!("/api/courses/{}/publish", course_id), Some(learner), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&router, "POST", &format!("/api/courses/{}/publish", course_id), Some(instructor), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, enrollment) =
        send(&router, "POST", &format!("/api/courses/{}/enroll", course_id), Some(learner), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&router, "POST", &format!("/api/courses/{}/enroll", course_id), Some(learner), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let progress_uri = format!("/api/enrollments/{}/progress", enrollment["id"].as_str().unwrap());
    let (status, body) = send(
        &router,
        "PUT",
        &progress_uri,
        Some(learner),
        Some(json!({ "progress_percentage": 120 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());

    let (status, updated) = send(
        &router,
        "PUT",
        &progress_uri,
        Some(learner),
        Some(json!({ "progress_percentage": 55 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["progress_percentage"], 55);

    let (status, _) = send(&router, "GET", "/api/courses/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_purchase_and_refund_over_http() {
    let h = Harness::new();
    let router = app(h.app_state());
    let course = h.published_course(Some(2500)).await;
    let user = UserId::new();

    let (status, intent) = send(
        &router,
        "POST",
        &format!("/api/courses/{}/payment-intent", course.id),
        Some(user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let intent_id = intent["payment_intent_id"].as_str().unwrap().to_string();
    let payment_id = intent["payment_id"].as_str().unwrap().to_string();

    // Refunding before the charge settles
    let (status, body) = send(
        &router,
        "POST",
        &format!("/api/payments/{}/refund", payment_id),
        Some(user),
        Some(json!({ "reason": "changed my mind" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Payment is not eligible for refund");

    h.gateway.set_status(&intent_id, IntentStatus::Succeeded).unwrap();
    let (status, confirmation) = send(
        &router,
        "POST",
        "/api/payments/confirm",
        Some(user),
        Some(json!({ "payment_intent_id": intent_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmation["payment"]["status"], "completed");
    assert_eq!(confirmation["enrollment"]["status"], "active");

    let (status, _) = send(
        &router,
        "POST",
        &format!("/api/courses/{}/payment-intent", course.id),
        Some(user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, refund) = send(
        &router,
        "POST",
        &format!("/api/payments/{}/refund", payment_id),
        Some(user),
        Some(json!({ "reason": "wrong course" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refund["payment"]["status"], "refunded");
    assert_eq!(refund["enrollment"]["status"], "cancelled");

    let (_, payments) = send(&router, "GET", "/api/payments", Some(user), None).await;
    assert_eq!(payments.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_gateway_failure_is_bad_gateway() {
    let h = Harness::new();
    let router = app(h.app_state());
    let course = h.published_course(Some(2500)).await;
    let user = UserId::new();

    // The local row exists but the processor has never heard of this intent
    let price = Price {
        amount_cents: 2500,
        currency: "usd".into(),
    };
    let orphan = Payment::new_pending(PaymentId::new(), user, course.id, &price, "pi_orphan".into());
    h.payments.insert(&orphan).await.unwrap();

    let (status, body) = send(
        &router,
        "POST",
        "/api/payments/confirm",
        Some(user),
        Some(json!({ "payment_intent_id": "pi_orphan" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().starts_with("Payment gateway error"));

    let (status, _) = send(
        &router,
        "POST",
        "/api/payments/confirm",
        Some(user),
        Some(json!({ "payment_intent_id": "pi_unknown" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_poll_voting_over_http() {
    let h = Harness::new();
    let router = app(h.app_state());
    let creator = UserId::new();

    let (status, poll) = send(
        &router,
        "POST",
        "/api/polls",
        Some(creator),
        Some(json!({
            "topic_id": uuid::Uuid::new_v4(),
            "question": "Pair programming on Fridays?",
            "options": ["Yes", "No"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let poll_id = poll["id"].as_str().unwrap().to_string();
    let yes = poll["options"][0]["id"].clone();
    let no = poll["options"][1]["id"].clone();

    let voter = UserId::new();
    let vote_uri = format!("/api/polls/{}/vote", poll_id);
    let (status, _) = send(&router, "POST", &vote_uri, Some(voter), Some(json!({ "option_id": yes }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&router, "POST", &vote_uri, Some(voter), Some(json!({ "option_id": no }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "You have already voted in this poll");

    let (status, body) = send(&router, "POST", &vote_uri, Some(voter), Some(json!({ "option_id": yes }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "You have already voted for this option");

    let (status, body) = send(
        &router,
        "POST",
        &vote_uri,
        Some(UserId::new()),
        Some(json!({ "option_id": uuid::Uuid::new_v4() })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, results) = send(&router, "GET", &format!("/api/polls/{}/results", poll_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["total_votes"], 1);
    assert_eq!(results["options"][0]["percentage"], 100.0);

    let close_uri = format!("/api/polls/{}/close", poll_id);
    let (status, _) = send(&router, "POST", &close_uri, Some(voter), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&router, "POST", &close_uri, Some(creator), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&router, "POST", &vote_uri, Some(UserId::new()), Some(json!({ "option_id": no }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
