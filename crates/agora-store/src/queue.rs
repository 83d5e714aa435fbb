use crate::backend::StoreBackend;
use crate::error::{Result, StoreError};
use agora_types::TournamentId;
use blake3::Hasher;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Work items the orchestrator runs. Each phase transition enqueues the next
/// kind; long waits are scheduled jobs, never in-process sleeps, so a
/// restarted engine resumes from the last persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    StartTournament { epoch_number: u64 },
    /// Periodic re-query of peers during the submission window. `seq` makes
    /// successive ticks distinct jobs while keeping each tick idempotent.
    CollectTick { tournament_id: TournamentId, seq: u64 },
    CloseSubmissions { tournament_id: TournamentId },
    RunEpoch { tournament_id: TournamentId, epoch_index: u64 },
    FinalizeTournament { tournament_id: TournamentId },
}

impl JobKind {
    /// The tournament this job belongs to, if any.
    pub fn tournament_id(&self) -> Option<&TournamentId> {
        match self {
            Self::StartTournament { .. } => None,
            Self::CollectTick { tournament_id, .. }
            | Self::CloseSubmissions { tournament_id }
            | Self::RunEpoch { tournament_id, .. }
            | Self::FinalizeTournament { tournament_id } => Some(tournament_id),
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartTournament { epoch_number } => {
                write!(f, "start_tournament(epoch={epoch_number})")
            }
            Self::CollectTick { tournament_id, seq } => {
                write!(f, "collect_tick({}, {seq})", &tournament_id.to_hex()[..8])
            }
            Self::CloseSubmissions { tournament_id } => {
                write!(f, "close_submissions({})", &tournament_id.to_hex()[..8])
            }
            Self::RunEpoch {
                tournament_id,
                epoch_index,
            } => write!(
                f,
                "run_epoch({}, {epoch_index})",
                &tournament_id.to_hex()[..8]
            ),
            Self::FinalizeTournament { tournament_id } => {
                write!(f, "finalize({})", &tournament_id.to_hex()[..8])
            }
        }
    }
}

/// Job id derived from the kind: enqueuing the same work twice lands on the
/// same row, which gives the queue its dedupe guarantee.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId([u8; 32]);

impl JobId {
    pub fn for_kind(kind: &JobKind) -> Self {
        let encoded = serde_json::to_vec(kind).expect("job kind serializes");
        let mut hasher = Hasher::new();
        hasher.update(b"agora:job");
        hasher.update(&encoded);
        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Leased,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub run_at: DateTime<Utc>,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub lease_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Durable at-least-once queue over the store backend.
///
/// Delivery model: `claim_due` leases the oldest due job; a crashed worker's
/// lease expires and the job is re-delivered. Task bodies must therefore be
/// idempotent — run creation dedupes on `(submission_id, epoch_number)`, and
/// job ids dedupe on content.
#[derive(Clone)]
pub struct JobQueue {
    backend: Arc<dyn StoreBackend>,
    lease: Duration,
}

impl JobQueue {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            backend,
            lease: Duration::minutes(30),
        }
    }

    pub fn with_lease(backend: Arc<dyn StoreBackend>, lease: Duration) -> Self {
        Self { backend, lease }
    }

    /// Enqueue work to run at `run_at`. Re-enqueueing the same kind is a
    /// no-op while the original is still pending.
    pub async fn enqueue_at(&self, kind: JobKind, run_at: DateTime<Utc>) -> Result<JobId> {
        let id = JobId::for_kind(&kind);
        if let Some(existing) = self.backend.get_job(&id).await? {
            debug!(job = %existing.kind, "job already queued, dedupe hit");
            return Ok(id);
        }

        let job = Job {
            id,
            kind,
            run_at,
            status: JobStatus::Queued,
            attempts: 0,
            max_attempts: 5,
            lease_until: None,
            created_at: Utc::now(),
        };
        info!(job = %job.kind, run_at = %run_at, "📬 job enqueued");
        self.backend.put_job(&job).await?;
        Ok(id)
    }

    pub async fn enqueue_now(&self, kind: JobKind) -> Result<JobId> {
        self.enqueue_at(kind, Utc::now()).await
    }

    /// Lease the oldest due job, if any. Expired leases are reclaimed here,
    /// which is what makes delivery at-least-once across crashes.
    pub async fn claim_due(&self, now: DateTime<Utc>) -> Result<Option<Job>> {
        let mut jobs = self.backend.list_jobs().await?;
        jobs.sort_by_key(|j| (j.run_at, j.created_at));

        for mut job in jobs {
            let due = match job.status {
                JobStatus::Queued => job.run_at <= now,
                JobStatus::Leased => job
                    .lease_until
                    .map(|lease| lease <= now)
                    .unwrap_or(true),
            };
            if !due {
                continue;
            }

            if job.attempts >= job.max_attempts {
                warn!(job = %job.kind, attempts = job.attempts, "☠️ job exhausted retries, dropping");
                self.backend.delete_job(&job.id).await?;
                continue;
            }

            job.status = JobStatus::Leased;
            job.attempts += 1;
            job.lease_until = Some(now + self.lease);
            self.backend.update_job(&job).await?;
            debug!(job = %job.kind, attempt = job.attempts, "job leased");
            return Ok(Some(job));
        }
        Ok(None)
    }

    /// Acknowledge successful completion.
    pub async fn ack(&self, id: &JobId) -> Result<()> {
        self.backend.delete_job(id).await
    }

    /// Return a failed job to the queue after a delay. Exhausted jobs are
    /// dropped by the next `claim_due`.
    pub async fn retry_later(&self, job: &Job, delay: Duration) -> Result<()> {
        let mut job = job.clone();
        job.status = JobStatus::Queued;
        job.run_at = Utc::now() + delay;
        job.lease_until = None;
        self.backend.update_job(&job).await
    }

    /// Remove pending work for a tournament that reached a terminal state.
    pub async fn purge_tournament(&self, tournament_id: &TournamentId) -> Result<()> {
        for job in self.backend.list_jobs().await? {
            if job.kind.tournament_id() == Some(tournament_id) {
                self.backend.delete_job(&job.id).await?;
            }
        }
        Ok(())
    }
}

impl JobQueue {
    pub fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.backend
    }
}

// The queue's own tests live with the memory backend, where a backend
// instance is cheap to come by. See `memory.rs`.

impl StoreError {
    pub(crate) fn job_not_found(id: &JobId) -> Self {
        Self::NotFound(format!("job {}", id))
    }
}
