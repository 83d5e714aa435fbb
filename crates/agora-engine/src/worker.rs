use crate::error::EngineError;
use crate::orchestrator::Orchestrator;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Single queue worker: claims due jobs and hands them to the orchestrator.
/// Effective evaluation concurrency is 1 per tournament by contract, so one
/// worker loop serves the whole engine; background jobs share the same
/// queue.
pub struct Worker {
    orchestrator: Arc<Orchestrator>,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let shutdown = orchestrator.shutdown_handle();
        Self {
            orchestrator,
            poll_interval: Duration::from_secs(1),
            shutdown,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run until shutdown. Jobs that complete are acked; a shutdown mid-job
    /// leaves the lease to expire so the job redelivers on restart; anything
    /// else is retried with backoff until the queue drops it.
    pub async fn run(&self) {
        info!("👷 queue worker started");
        while !self.shutdown.load(Ordering::Relaxed) {
            let claimed = match self.orchestrator.queue().claim_due(Utc::now()).await {
                Ok(claimed) => claimed,
                Err(e) => {
                    error!(error = %e, "queue claim failed");
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
            };

            let Some(job) = claimed else {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            };

            debug!(job = %job.kind, attempt = job.attempts, "job picked up");
            match self.orchestrator.handle_job(&job).await {
                Ok(()) => {
                    if let Err(e) = self.orchestrator.queue().ack(&job.id).await {
                        error!(job = %job.kind, error = %e, "ack failed, job will redeliver");
                    }
                }
                Err(EngineError::Shutdown) => {
                    info!(job = %job.kind, "shutdown during job, leaving lease for redelivery");
                    break;
                }
                Err(e) => {
                    // Infrastructure trouble around the job itself; back off
                    // and let the queue redeliver.
                    error!(job = %job.kind, error = %e, "job failed, scheduling retry");
                    let backoff = ChronoDuration::seconds(30 * job.attempts as i64);
                    if let Err(e) = self
                        .orchestrator
                        .queue()
                        .retry_later(&job, backoff)
                        .await
                    {
                        error!(job = %job.kind, error = %e, "retry scheduling failed");
                    }
                }
            }
        }
        info!("👷 queue worker stopped");
    }

    /// Drain the queue until it is empty, then return. Test and single-shot
    /// tool support; production uses `run`.
    pub async fn drain(&self) -> crate::error::Result<()> {
        loop {
            let Some(job) = self.orchestrator.queue().claim_due(Utc::now()).await? else {
                return Ok(());
            };
            self.orchestrator.handle_job(&job).await?;
            self.orchestrator.queue().ack(&job.id).await?;
        }
    }
}
