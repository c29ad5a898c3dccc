// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Background Job Queue
//
// Jobs are described by a serde-tagged `JobDescriptor`, serialized to JSON on
// enqueue and decoded by a fixed pool of tokio workers sharing one mpsc
// receiver. Delivery is at-least-once: a failing job is retried with a linear
// backoff until `max_attempts` is reached, after which the handler's
// `failed()` hook runs exactly once.
//
// The queue is process-local. Jobs still buffered when the process exits are
// lost; handlers must therefore be idempotent and safe to re-run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::enrollment::EnrollmentId;
use crate::domain::platform_config::JobsConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobDescriptor {
    IssueCertificate { enrollment_id: EnrollmentId },
}

impl JobDescriptor {
    pub fn kind(&self) -> &'static str {
        match self {
            JobDescriptor::IssueCertificate { .. } => "issue_certificate",
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum JobError {
    /// Worth another attempt
    #[error("{0}")]
    Transient(String),

    /// Retrying cannot help; go straight to `failed()`
    #[error("{0}")]
    Permanent(String),
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &JobDescriptor) -> Result<(), JobError>;

    /// Called once per job after its final attempt failed.
    async fn failed(&self, job: &JobDescriptor, error: &JobError, attempts: u32);
}

#[derive(Debug, Clone)]
pub struct JobQueueConfig {
    pub workers: usize,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub capacity: usize,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            capacity: 1024,
        }
    }
}

impl From<&JobsConfig> for JobQueueConfig {
    fn from(config: &JobsConfig) -> Self {
        Self {
            workers: config.workers.max(1),
            max_attempts: config.max_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            capacity: config.queue_capacity.max(1),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobQueueError {
    #[error("Job queue is shut down")]
    Closed,

    #[error("Failed to serialize job: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Producer side of the queue. Workers stop once every clone has been dropped
/// and the buffer is drained.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<String>,
}

/// Handles to the running workers
pub struct JobWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl JobWorkers {
    /// Wait for every worker to drain the queue and exit.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Job worker panicked");
            }
        }
    }
}

impl JobQueue {
    pub fn start(config: JobQueueConfig, handler: Arc<dyn JobHandler>) -> (Self, JobWorkers) {
        let (sender, receiver) = mpsc::channel::<String>(config.capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        info!(
            workers = config.workers,
            max_attempts = config.max_attempts,
            "Starting job queue"
        );

        let handles = (0..config.workers)
            .map(|worker_id| {
                let receiver = receiver.clone();
                let handler = handler.clone();
                let config = config.clone();
                tokio::spawn(async move {
                    loop {
                        let next = receiver.lock().await.recv().await;
                        let Some(payload) = next else {
                            break;
                        };
                        process(worker_id, &payload, handler.as_ref(), &config).await;
                    }
                    debug!(worker_id, "Job worker stopped");
                })
            })
            .collect();

        (Self { sender }, JobWorkers { handles })
    }

    pub async fn enqueue(&self, job: JobDescriptor) -> Result<(), JobQueueError> {
        let payload = serde_json::to_string(&job)?;
        self.sender.send(payload).await.map_err(|_| JobQueueError::Closed)?;
        metrics::counter!("lyceum_jobs_enqueued_total", "kind" => job.kind()).increment(1);
        debug!(kind = job.kind(), "Job enqueued");
        Ok(())
    }
}

async fn process(worker_id: usize, payload: &str, handler: &dyn JobHandler, config: &JobQueueConfig) {
    let job: JobDescriptor = match serde_json::from_str(payload) {
        Ok(job) => job,
        Err(e) => {
            error!(worker_id, error = %e, payload, "Discarding undecodable job");
            metrics::counter!("lyceum_jobs_discarded_total").increment(1);
            return;
        }
    };

    let mut attempt = 0;
    let last_error = loop {
        attempt += 1;
        match handler.handle(&job).await {
            Ok(()) => {
                debug!(worker_id, kind = job.kind(), attempt, "Job completed");
                metrics::counter!("lyceum_jobs_completed_total", "kind" => job.kind()).increment(1);
                return;
            }
            Err(e @ JobError::Permanent(_)) => break e,
            Err(e) if attempt >= config.max_attempts => break e,
            Err(e) => {
                warn!(
                    worker_id,
                    kind = job.kind(),
                    attempt,
                    error = %e,
                    "Job attempt failed, retrying"
                );
                metrics::counter!("lyceum_jobs_retried_total", "kind" => job.kind()).increment(1);
                tokio::time::sleep(config.retry_backoff * attempt).await;
            }
        }
    };

    error!(
        worker_id,
        kind = job.kind(),
        attempts = attempt,
        error = %last_error,
        "Job failed permanently"
    );
    metrics::counter!("lyceum_jobs_failed_total", "kind" => job.kind()).increment(1);
    handler.failed(&job, &last_error, attempt).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as SyncMutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyHandler {
        fail_first: u32,
        permanent: bool,
        calls: AtomicU32,
        failures: SyncMutex<Vec<(JobDescriptor, u32)>>,
    }

    impl FlakyHandler {
        fn new(fail_first: u32, permanent: bool) -> Arc<Self> {
            Arc::new(Self {
                fail_first,
                permanent,
                calls: AtomicU32::new(0),
                failures: SyncMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl JobHandler for FlakyHandler {
        async fn handle(&self, _job: &JobDescriptor) -> Result<(), JobError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_first {
                if self.permanent {
                    return Err(JobError::Permanent("no such enrollment".into()));
                }
                return Err(JobError::Transient("database unavailable".into()));
            }
            Ok(())
        }

        async fn failed(&self, job: &JobDescriptor, _error: &JobError, attempts: u32) {
            self.failures.lock().push((job.clone(), attempts));
        }
    }

    fn config(max_attempts: u32) -> JobQueueConfig {
        JobQueueConfig {
            workers: 2,
            max_attempts,
            retry_backoff: Duration::from_millis(1),
            capacity: 16,
        }
    }

    fn issue() -> JobDescriptor {
        JobDescriptor::IssueCertificate {
            enrollment_id: EnrollmentId::new(),
        }
    }

    #[test]
    fn test_descriptor_serialization_is_tagged() {
        let job = issue();
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["kind"], "issue_certificate");
        assert!(json.get("enrollment_id").is_some());
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let handler = FlakyHandler::new(2, false);
        let (queue, workers) = JobQueue::start(config(3), handler.clone());
        queue.enqueue(issue()).await.unwrap();
        drop(queue);
        workers.join().await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert!(handler.failures.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failed_hook_runs_once_after_max_attempts() {
        let handler = FlakyHandler::new(u32::MAX, false);
        let (queue, workers) = JobQueue::start(config(3), handler.clone());
        let job = issue();
        queue.enqueue(job.clone()).await.unwrap();
        drop(queue);
        workers.join().await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        let failures = handler.failures.lock();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0], (job, 3));
    }

    #[tokio::test]
    async fn test_permanent_failure_skips_retries() {
        let handler = FlakyHandler::new(u32::MAX, true);
        let (queue, workers) = JobQueue::start(config(5), handler.clone());
        queue.enqueue(issue()).await.unwrap();
        drop(queue);
        workers.join().await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(handler.failures.lock()[0].1, 1);
    }
}
