// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Enrollment Observer
//!
//! Background task that listens for enrollment events on the event bus and
//! schedules follow-up work on the job queue. Completing a course enqueues an
//! `IssueCertificate` job; issuance itself happens on the queue workers.
//!
//! Errors are logged and counted; the observer keeps running until the event
//! bus closes.

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::events::EnrollmentEvent;
use crate::infrastructure::event_bus::{EnrollmentEventReceiver, EventBus, EventBusError};
use crate::infrastructure::job_queue::{JobDescriptor, JobQueue};

pub struct EnrollmentObserver {
    receiver: EnrollmentEventReceiver,
    queue: JobQueue,
}

impl EnrollmentObserver {
    /// Subscribes immediately, so events published after this call are seen
    /// even if `start` runs later.
    pub fn new(event_bus: &EventBus, queue: JobQueue) -> Self {
        Self {
            receiver: event_bus.subscribe_enrollments(),
            queue,
        }
    }

    pub fn start(mut self) -> JoinHandle<()> {
        info!("Starting enrollment observer");

        tokio::spawn(async move {
            let mut jobs_scheduled = 0u64;

            loop {
                match self.receiver.recv().await {
                    Ok(EnrollmentEvent::EnrollmentCompleted { enrollment_id, .. }) => {
                        let job = JobDescriptor::IssueCertificate { enrollment_id };
                        match self.queue.enqueue(job).await {
                            Ok(()) => {
                                jobs_scheduled += 1;
                                debug!(%enrollment_id, "Scheduled certificate issuance");
                            }
                            Err(e) => {
                                error!(%enrollment_id, error = %e, "Failed to schedule certificate issuance");
                            }
                        }
                    }
                    Ok(_) => continue,
                    Err(EventBusError::Lagged(n)) => {
                        warn!("Enrollment observer lagged by {} events, some completions were missed", n);
                        metrics::counter!("lyceum_observer_events_dropped_total").increment(n);
                    }
                    Err(EventBusError::Closed) => break,
                    Err(e) => {
                        error!(error = ?e, "Unexpected error receiving enrollment event");
                    }
                }
            }

            info!(jobs_scheduled, "Enrollment observer shut down");
        })
    }
}
