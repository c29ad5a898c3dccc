// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP JSON API
//!
//! Thin axum handlers over the application services. The caller's identity
//! comes from the `X-User-Id` header, which the upstream auth layer sets after
//! authenticating the request.

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::application::certificate_service::CertificateService;
use crate::application::course_service::{CourseService, CreateCourseRequest};
use crate::application::enrollment_service::EnrollmentService;
use crate::application::payment_service::{PaymentConfirmation, PaymentIntentCreated, PaymentService, RefundResult};
use crate::application::poll_service::{CreatePollRequest, PollService};
use crate::domain::certificate::Certificate;
use crate::domain::course::{Course, CourseId};
use crate::domain::enrollment::{Enrollment, EnrollmentId};
use crate::domain::payment::{Payment, PaymentId};
use crate::domain::poll::{Poll, PollId, PollOptionId, PollResults, PollVote};
use crate::domain::user::UserId;
use crate::presentation::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub courses: Arc<dyn CourseService>,
    pub enrollments: Arc<dyn EnrollmentService>,
    pub payments: Arc<dyn PaymentService>,
    pub polls: Arc<dyn PollService>,
    pub certificates: Arc<dyn CertificateService>,
    pub start_time: Instant,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/courses", get(list_courses_handler).post(create_course_handler))
        .route("/api/courses/{id}", get(get_course_handler))
        .route("/api/courses/{id}/publish", post(publish_course_handler))
        .route("/api/courses/{id}/enroll", post(enroll_handler))
        .route("/api/courses/{id}/payment-intent", post(create_payment_intent_handler))
        .route("/api/payments", get(list_payments_handler))
        .route("/api/payments/confirm", post(confirm_payment_handler))
        .route("/api/payments/{id}/refund", post(refund_handler))
        .route("/api/enrollments", get(list_enrollments_handler))
        .route("/api/enrollments/{id}/progress", put(update_progress_handler))
        .route("/api/certificates", get(list_certificates_handler))
        .route("/api/polls", post(create_poll_handler))
        .route("/api/polls/{id}/vote", post(vote_handler))
        .route("/api/polls/{id}/results", get(poll_results_handler))
        .route("/api/polls/{id}/close", post(close_poll_handler))
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
}

/// Identity of the caller, taken from the `X-User-Id` header
pub struct AuthenticatedUser(pub UserId);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| UserId::parse(value.trim()))
            .map(AuthenticatedUser)
            .ok_or(ApiError::Unauthenticated)
    }
}

/// A path id that is not a UUID cannot name anything, so it is reported as
/// not found rather than as a malformed request.
fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("{} not found", what)))
}

type ApiResult<T> = Result<Json<T>, ApiError>;
type Created<T> = Result<(StatusCode, Json<T>), ApiError>;

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

// ── Courses ──────────────────────────────────────────────────────────────────

async fn list_courses_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Course>> {
    Ok(Json(state.courses.list_courses(true).await?))
}

async fn create_course_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(request): Json<CreateCourseRequest>,
) -> Created<Course> {
    let course = state.courses.create_course(user_id, request).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn get_course_handler(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Course> {
    let id = CourseId(parse_id(&id, "Course")?);
    Ok(Json(state.courses.get_course(id).await?))
}

async fn publish_course_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Course> {
    let id = CourseId(parse_id(&id, "Course")?);
    Ok(Json(state.courses.publish_course(id, user_id).await?))
}

async fn enroll_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<String>,
) -> Created<Enrollment> {
    let course_id = CourseId(parse_id(&id, "Course")?);
    let enrollment = state.enrollments.enroll_free(user_id, course_id).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

// ── Payments ─────────────────────────────────────────────────────────────────

async fn create_payment_intent_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<String>,
) -> Created<PaymentIntentCreated> {
    let course_id = CourseId(parse_id(&id, "Course")?);
    let intent = state.payments.create_payment_intent(user_id, course_id).await?;
    Ok((StatusCode::CREATED, Json(intent)))
}

#[derive(Deserialize)]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: String,
}

async fn confirm_payment_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(request): Json<ConfirmPaymentRequest>,
) -> ApiResult<PaymentConfirmation> {
    let intent_id = request.payment_intent_id.trim();
    if intent_id.is_empty() {
        return Err(ApiError::Validation("payment_intent_id is required".to_string()));
    }
    Ok(Json(state.payments.confirm_payment(user_id, intent_id).await?))
}

#[derive(Deserialize)]
pub struct RefundRequest {
    #[serde(default)]
    pub reason: String,
}

async fn refund_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<RefundRequest>,
) -> ApiResult<RefundResult> {
    let payment_id = PaymentId(parse_id(&id, "Payment")?);
    Ok(Json(
        state
            .payments
            .process_refund(user_id, payment_id, &request.reason)
            .await?,
    ))
}

async fn list_payments_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> ApiResult<Vec<Payment>> {
    Ok(Json(state.payments.list_payments(user_id).await?))
}

// ── Enrollments & certificates ───────────────────────────────────────────────

async fn list_enrollments_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> ApiResult<Vec<Enrollment>> {
    Ok(Json(state.enrollments.list_enrollments(user_id).await?))
}

#[derive(Deserialize)]
pub struct UpdateProgressRequest {
    pub progress_percentage: u16,
}

async fn update_progress_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateProgressRequest>,
) -> ApiResult<Enrollment> {
    let enrollment_id = EnrollmentId(parse_id(&id, "Enrollment")?);
    Ok(Json(
        state
            .enrollments
            .update_progress(user_id, enrollment_id, request.progress_percentage)
            .await?,
    ))
}

async fn list_certificates_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> ApiResult<Vec<Certificate>> {
    Ok(Json(state.certificates.list_certificates(user_id).await?))
}

// ── Polls ────────────────────────────────────────────────────────────────────

async fn create_poll_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(request): Json<CreatePollRequest>,
) -> Created<Poll> {
    let poll = state.polls.create_poll(user_id, request).await?;
    Ok((StatusCode::CREATED, Json(poll)))
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub option_id: Uuid,
}

async fn vote_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<VoteRequest>,
) -> Created<PollVote> {
    let poll_id = PollId(parse_id(&id, "Poll")?);
    let vote = state
        .polls
        .vote(user_id, poll_id, PollOptionId(request.option_id))
        .await?;
    Ok((StatusCode::CREATED, Json(vote)))
}

async fn poll_results_handler(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<PollResults> {
    let poll_id = PollId(parse_id(&id, "Poll")?);
    Ok(Json(state.polls.get_poll_results(poll_id).await?))
}

async fn close_poll_handler(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<Poll> {
    let poll_id = PollId(parse_id(&id, "Poll")?);
    Ok(Json(state.polls.close_poll(user_id, poll_id).await?))
}
