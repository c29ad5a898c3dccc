// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared wiring for integration tests: in-memory repositories, the simulated
//! gateway and real application services.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Instant;

use lyceum_core::application::payment_service::PaymentSettings;
use lyceum_core::application::{
    StandardCertificateService, StandardCourseService, StandardEnrollmentService, StandardPaymentService,
    StandardPollService,
};
use lyceum_core::domain::course::Course;
use lyceum_core::domain::platform_config::RefundMode;
use lyceum_core::domain::repository::CourseRepository;
use lyceum_core::domain::user::UserId;
use lyceum_core::infrastructure::event_bus::EventBus;
use lyceum_core::infrastructure::payment_gateway::SimulatedGateway;
use lyceum_core::infrastructure::repositories::{
    InMemoryCertificateRepository, InMemoryCourseRepository, InMemoryEnrollmentRepository,
    InMemoryPaymentRepository, InMemoryPollRepository,
};
use lyceum_core::presentation::AppState;

pub struct Harness {
    pub courses: Arc<InMemoryCourseRepository>,
    pub enrollments: Arc<InMemoryEnrollmentRepository>,
    pub payments: Arc<InMemoryPaymentRepository>,
    pub polls: Arc<InMemoryPollRepository>,
    pub certificates: Arc<InMemoryCertificateRepository>,
    pub gateway: Arc<SimulatedGateway>,
    pub event_bus: Arc<EventBus>,
    pub course_service: Arc<StandardCourseService>,
    pub enrollment_service: Arc<StandardEnrollmentService>,
    pub payment_service: Arc<StandardPaymentService>,
    pub poll_service: Arc<StandardPollService>,
    pub certificate_service: Arc<StandardCertificateService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_refund_mode(RefundMode::Automatic)
    }

    pub fn with_refund_mode(refund_mode: RefundMode) -> Self {
        let courses = Arc::new(InMemoryCourseRepository::new());
        let enrollments = Arc::new(InMemoryEnrollmentRepository::new());
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let polls = Arc::new(InMemoryPollRepository::new());
        let certificates = Arc::new(InMemoryCertificateRepository::new());
        let gateway = Arc::new(SimulatedGateway::new());
        let event_bus = Arc::new(EventBus::new(256));

        let settings = PaymentSettings {
            refund_mode,
            ..PaymentSettings::default()
        };

        Self {
            course_service: Arc::new(StandardCourseService::new(courses.clone())),
            enrollment_service: Arc::new(StandardEnrollmentService::new(
                courses.clone(),
                enrollments.clone(),
                event_bus.clone(),
            )),
            payment_service: Arc::new(StandardPaymentService::new(
                courses.clone(),
                payments.clone(),
                enrollments.clone(),
                gateway.clone(),
                event_bus.clone(),
                settings,
            )),
            poll_service: Arc::new(StandardPollService::new(polls.clone(), event_bus.clone())),
            certificate_service: Arc::new(StandardCertificateService::new(
                enrollments.clone(),
                certificates.clone(),
                event_bus.clone(),
            )),
            courses,
            enrollments,
            payments,
            polls,
            certificates,
            gateway,
            event_bus,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            courses: self.course_service.clone(),
            enrollments: self.enrollment_service.clone(),
            payments: self.payment_service.clone(),
            polls: self.poll_service.clone(),
            certificates: self.certificate_service.clone(),
            start_time: Instant::now(),
        }
    }

    /// Store a published course owned by a fresh instructor.
    pub async fn published_course(&self, price_cents: Option<i64>) -> Course {
        let instructor = UserId::new();
        let mut course = Course::new("Systems Programming".into(), instructor, price_cents, None)
            .expect("valid course");
        course.publish(instructor).expect("instructor publishes");
        self.courses.save(&course).await.expect("course saved");
        course
    }
}
