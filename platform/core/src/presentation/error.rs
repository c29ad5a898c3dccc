// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP error mapping. Every failure leaves the API as `{"error": "<message>"}`
//! with a status chosen by error category.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::application::certificate_service::CertificateServiceError;
use crate::application::course_service::CourseServiceError;
use crate::application::enrollment_service::EnrollmentServiceError;
use crate::application::payment_service::PaymentServiceError;
use crate::application::poll_service::PollServiceError;
use crate::domain::certificate::CertificateError;
use crate::domain::course::CourseError;
use crate::domain::enrollment::EnrollmentError;
use crate::domain::payment::PaymentError;
use crate::domain::payment_gateway::GatewayError;
use crate::domain::poll::PollError;
use crate::domain::repository::RepositoryError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing or invalid X-User-Id header")]
    Unauthenticated,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            error!(error = %detail, "Request failed with internal error");
        }
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => ApiError::NotFound(format!("Not found: {}", what)),
            RepositoryError::Conflict(constraint) => {
                ApiError::Conflict(format!("Conflicting record ({})", constraint))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        warn!(error = %err, "Payment gateway call failed");
        ApiError::Gateway(err.to_string())
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::MissingRefundReason => ApiError::Validation(err.to_string()),
            _ => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<CourseError> for ApiError {
    fn from(err: CourseError) -> Self {
        match err {
            CourseError::Invalid(_) => ApiError::Validation(err.to_string()),
            CourseError::NotInstructor => ApiError::Forbidden(err.to_string()),
            _ => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<EnrollmentError> for ApiError {
    fn from(err: EnrollmentError) -> Self {
        match err {
            EnrollmentError::InvalidProgress(_) => ApiError::Validation(err.to_string()),
            _ => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<PollError> for ApiError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Invalid(_) => ApiError::Validation(err.to_string()),
            PollError::AlreadyVotedForOption | PollError::AlreadyVotedInPoll => ApiError::Conflict(err.to_string()),
            PollError::NotCreator => ApiError::Forbidden(err.to_string()),
            PollError::Inactive | PollError::Expired | PollError::UnknownOption => {
                ApiError::BadRequest(err.to_string())
            }
        }
    }
}

impl From<CertificateError> for ApiError {
    fn from(err: CertificateError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<PaymentServiceError> for ApiError {
    fn from(err: PaymentServiceError) -> Self {
        match err {
            PaymentServiceError::CourseNotFound(_) | PaymentServiceError::PaymentNotFound => {
                ApiError::NotFound(err.to_string())
            }
            PaymentServiceError::AlreadyEnrolled => ApiError::Conflict(err.to_string()),
            PaymentServiceError::Course(e) => e.into(),
            PaymentServiceError::Payment(e) => e.into(),
            PaymentServiceError::Enrollment(e) => e.into(),
            PaymentServiceError::Gateway(e) => e.into(),
            PaymentServiceError::Repository(e) => e.into(),
        }
    }
}

impl From<EnrollmentServiceError> for ApiError {
    fn from(err: EnrollmentServiceError) -> Self {
        match err {
            EnrollmentServiceError::CourseNotFound(_) | EnrollmentServiceError::NotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            EnrollmentServiceError::AlreadyEnrolled => ApiError::Conflict(err.to_string()),
            EnrollmentServiceError::Course(e) => e.into(),
            EnrollmentServiceError::Enrollment(e) => e.into(),
            EnrollmentServiceError::Repository(e) => e.into(),
        }
    }
}

impl From<CourseServiceError> for ApiError {
    fn from(err: CourseServiceError) -> Self {
        match err {
            CourseServiceError::NotFound(_) => ApiError::NotFound(err.to_string()),
            CourseServiceError::Course(e) => e.into(),
            CourseServiceError::Repository(e) => e.into(),
        }
    }
}

impl From<PollServiceError> for ApiError {
    fn from(err: PollServiceError) -> Self {
        match err {
            PollServiceError::NotFound(_) => ApiError::NotFound(err.to_string()),
            PollServiceError::Poll(e) => e.into(),
            PollServiceError::Repository(e) => e.into(),
        }
    }
}

impl From<CertificateServiceError> for ApiError {
    fn from(err: CertificateServiceError) -> Self {
        match err {
            CertificateServiceError::EnrollmentNotFound(_) => ApiError::NotFound(err.to_string()),
            CertificateServiceError::Certificate(e) => e.into(),
            CertificateServiceError::Repository(e) => e.into(),
        }
    }
}
