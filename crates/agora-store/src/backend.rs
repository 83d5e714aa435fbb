use crate::error::Result;
use crate::queue::{Job, JobId};
use agora_types::{
    EvaluationRun, RunId, Submission, SubmissionId, Tournament, TournamentId, TournamentResult,
};
use async_trait::async_trait;

/// Storage backend for the tournament tables and the job queue.
///
/// Backends provide durability and atomicity primitives; domain invariants
/// (transition graphs, uniqueness rules) are enforced one layer up in
/// `TournamentStore`. `put_*` inserts and fails on an existing key;
/// `update_*` overwrites and fails on a missing key.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    // Tournaments
    async fn put_tournament(&self, tournament: &Tournament) -> Result<()>;
    async fn update_tournament(&self, tournament: &Tournament) -> Result<()>;
    async fn get_tournament(&self, id: &TournamentId) -> Result<Option<Tournament>>;
    async fn get_tournament_by_epoch(&self, epoch_number: u64) -> Result<Option<Tournament>>;
    async fn list_tournaments(&self) -> Result<Vec<Tournament>>;

    // Submissions
    async fn put_submission(&self, submission: &Submission) -> Result<()>;
    async fn update_submission(&self, submission: &Submission) -> Result<()>;
    async fn get_submission(&self, id: &SubmissionId) -> Result<Option<Submission>>;
    async fn list_submissions(&self, tournament: &TournamentId) -> Result<Vec<Submission>>;

    // Evaluation runs
    async fn put_run(&self, run: &EvaluationRun) -> Result<()>;
    async fn update_run(&self, run: &EvaluationRun) -> Result<()>;
    async fn get_run(&self, id: &RunId) -> Result<Option<EvaluationRun>>;
    async fn list_runs_by_submission(&self, submission: &SubmissionId)
        -> Result<Vec<EvaluationRun>>;

    // Results. `put_results` replaces the tournament's result set in one
    // atomic write: either the whole ranking lands or none of it.
    async fn put_results(
        &self,
        tournament: &TournamentId,
        results: &[TournamentResult],
    ) -> Result<()>;
    async fn list_results(&self, tournament: &TournamentId) -> Result<Vec<TournamentResult>>;

    // Job queue
    async fn put_job(&self, job: &Job) -> Result<()>;
    async fn update_job(&self, job: &Job) -> Result<()>;
    async fn get_job(&self, id: &JobId) -> Result<Option<Job>>;
    async fn list_jobs(&self) -> Result<Vec<Job>>;
    async fn delete_job(&self, id: &JobId) -> Result<()>;

    /// Flush any pending writes.
    async fn flush(&self) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;
}

#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub tournament_count: usize,
    pub submission_count: usize,
    pub run_count: usize,
    pub result_count: usize,
    pub job_count: usize,
}
