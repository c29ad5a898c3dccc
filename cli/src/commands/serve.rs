// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `lyceum serve`
//!
//! Wires repositories, the payment gateway, the event bus and the job queue
//! into the application services, then serves the HTTP API until SIGINT or
//! SIGTERM. Queued jobs are drained before the process exits.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use lyceum_core::application::{
    CertificateService, EnrollmentObserver, PlatformJobHandler, StandardCertificateService, StandardCourseService,
    StandardEnrollmentService, StandardPaymentService, StandardPollService,
};
use lyceum_core::domain::platform_config::PlatformConfigManifest;
use lyceum_core::domain::repository::{
    CertificateRepository, CourseRepository, EnrollmentRepository, PaymentRepository, PollRepository, PostgresConfig,
};
use lyceum_core::infrastructure::db::Database;
use lyceum_core::infrastructure::job_queue::JobQueueConfig;
use lyceum_core::infrastructure::payment_gateway;
use lyceum_core::infrastructure::repositories::{
    InMemoryCertificateRepository, InMemoryCourseRepository, InMemoryEnrollmentRepository, InMemoryPaymentRepository,
    InMemoryPollRepository, PostgresCertificateRepository, PostgresCourseRepository, PostgresEnrollmentRepository,
    PostgresPaymentRepository, PostgresPollRepository,
};
use lyceum_core::infrastructure::{EventBus, JobQueue};
use lyceum_core::presentation::{app, AppState};

const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

struct Repositories {
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    payments: Arc<dyn PaymentRepository>,
    polls: Arc<dyn PollRepository>,
    certificates: Arc<dyn CertificateRepository>,
}

impl Repositories {
    async fn from_config(config: &PlatformConfigManifest) -> Result<Self> {
        match &config.spec.database {
            Some(db) => {
                let database = Database::new(&PostgresConfig {
                    connection_string: db.url.clone(),
                    max_connections: db.max_connections,
                })
                .await
                .context("Failed to connect to PostgreSQL")?;
                let pool = database.get_pool().clone();
                info!(max_connections = db.max_connections, "Using PostgreSQL repositories");

                Ok(Self {
                    courses: Arc::new(PostgresCourseRepository::new(pool.clone())),
                    enrollments: Arc::new(PostgresEnrollmentRepository::new(pool.clone())),
                    payments: Arc::new(PostgresPaymentRepository::new(pool.clone())),
                    polls: Arc::new(PostgresPollRepository::new(pool.clone())),
                    certificates: Arc::new(PostgresCertificateRepository::new(pool)),
                })
            }
            None => {
                warn!("No database configured; using in-memory repositories. Data is lost on restart.");
                Ok(Self {
                    courses: Arc::new(InMemoryCourseRepository::new()),
                    enrollments: Arc::new(InMemoryEnrollmentRepository::new()),
                    payments: Arc::new(InMemoryPaymentRepository::new()),
                    polls: Arc::new(InMemoryPollRepository::new()),
                    certificates: Arc::new(InMemoryCertificateRepository::new()),
                })
            }
        }
    }
}

pub async fn run(mut config: PlatformConfigManifest, port_override: Option<u16>) -> Result<()> {
    if let Some(port) = port_override {
        config.spec.server.port = port;
    }
    config.validate().context("Configuration validation failed")?;

    info!(name = %config.metadata.name, "Starting Lyceum server");

    if let Some(port) = config.spec.observability.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics exporter listening on 0.0.0.0:{}", port);
    }

    let repositories = Repositories::from_config(&config).await?;
    let gateway = payment_gateway::from_config(&config.spec.payments)?;
    let event_bus = Arc::new(EventBus::with_default_capacity());

    let certificates: Arc<dyn CertificateService> = Arc::new(StandardCertificateService::new(
        repositories.enrollments.clone(),
        repositories.certificates.clone(),
        event_bus.clone(),
    ));

    let (job_queue, workers) = JobQueue::start(
        JobQueueConfig::from(&config.spec.jobs),
        Arc::new(PlatformJobHandler::new(certificates.clone())),
    );
    let observer = EnrollmentObserver::new(&event_bus, job_queue.clone()).start();

    let state = AppState {
        courses: Arc::new(StandardCourseService::new(repositories.courses.clone())),
        enrollments: Arc::new(StandardEnrollmentService::new(
            repositories.courses.clone(),
            repositories.enrollments.clone(),
            event_bus.clone(),
        )),
        payments: Arc::new(StandardPaymentService::new(
            repositories.courses.clone(),
            repositories.payments.clone(),
            repositories.enrollments.clone(),
            gateway,
            event_bus.clone(),
            (&config.spec.payments).into(),
        )),
        polls: Arc::new(StandardPollService::new(repositories.polls.clone(), event_bus.clone())),
        certificates,
        start_time: Instant::now(),
    };

    let addr = format!("{}:{}", config.spec.server.bind_address, config.spec.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("HTTP API listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Draining background jobs");
    // The observer and the local handle are the only senders; workers exit
    // once the channel is empty and closed.
    observer.abort();
    drop(job_queue);
    if tokio::time::timeout(WORKER_DRAIN_TIMEOUT, workers.join()).await.is_err() {
        warn!("Job workers did not finish within {:?}", WORKER_DRAIN_TIMEOUT);
    }

    info!("Lyceum server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
