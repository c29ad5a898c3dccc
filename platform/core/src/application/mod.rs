// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod certificate_service;
pub mod course_service;
pub mod enrollment_observer;
pub mod enrollment_service;
pub mod job_handler;
pub mod payment_service;
pub mod poll_service;

pub use certificate_service::{CertificateService, StandardCertificateService};
pub use course_service::{CourseService, StandardCourseService};
pub use enrollment_observer::EnrollmentObserver;
pub use enrollment_service::{EnrollmentService, StandardEnrollmentService};
pub use job_handler::PlatformJobHandler;
pub use payment_service::{PaymentService, PaymentSettings, StandardPaymentService};
pub use poll_service::{PollService, StandardPollService};
