use crate::backend::{StoreBackend, StoreStats};
use crate::error::{Result, StoreError};
use crate::queue::{Job, JobId};
use agora_types::{
    EvaluationRun, ParticipantId, RunId, Submission, SubmissionId, Tournament, TournamentId,
    TournamentResult,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type ResultKey = (TournamentId, ParticipantId);

/// In-memory store backend for tests and development.
#[derive(Default)]
pub struct MemoryBackend {
    tournaments: Arc<RwLock<HashMap<TournamentId, Tournament>>>,
    submissions: Arc<RwLock<HashMap<SubmissionId, Submission>>>,
    runs: Arc<RwLock<HashMap<RunId, EvaluationRun>>>,
    results: Arc<RwLock<HashMap<ResultKey, TournamentResult>>>,
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn put_tournament(&self, tournament: &Tournament) -> Result<()> {
        let mut tournaments = self.tournaments.write().await;
        if tournaments.contains_key(&tournament.id) {
            return Err(StoreError::AlreadyExists(format!(
                "tournament {}",
                tournament.id
            )));
        }
        tournaments.insert(tournament.id, tournament.clone());
        Ok(())
    }

    async fn update_tournament(&self, tournament: &Tournament) -> Result<()> {
        let mut tournaments = self.tournaments.write().await;
        if !tournaments.contains_key(&tournament.id) {
            return Err(StoreError::NotFound(format!("tournament {}", tournament.id)));
        }
        tournaments.insert(tournament.id, tournament.clone());
        Ok(())
    }

    async fn get_tournament(&self, id: &TournamentId) -> Result<Option<Tournament>> {
        Ok(self.tournaments.read().await.get(id).cloned())
    }

    async fn get_tournament_by_epoch(&self, epoch_number: u64) -> Result<Option<Tournament>> {
        Ok(self
            .tournaments
            .read()
            .await
            .values()
            .find(|t| t.epoch_number == epoch_number)
            .cloned())
    }

    async fn list_tournaments(&self) -> Result<Vec<Tournament>> {
        let mut all: Vec<Tournament> = self.tournaments.read().await.values().cloned().collect();
        all.sort_by_key(|t| t.epoch_number);
        Ok(all)
    }

    async fn put_submission(&self, submission: &Submission) -> Result<()> {
        let mut submissions = self.submissions.write().await;
        if submissions.contains_key(&submission.id) {
            return Err(StoreError::AlreadyExists(format!(
                "submission {}",
                submission.id
            )));
        }
        submissions.insert(submission.id, submission.clone());
        Ok(())
    }

    async fn update_submission(&self, submission: &Submission) -> Result<()> {
        let mut submissions = self.submissions.write().await;
        if !submissions.contains_key(&submission.id) {
            return Err(StoreError::NotFound(format!("submission {}", submission.id)));
        }
        submissions.insert(submission.id, submission.clone());
        Ok(())
    }

    async fn get_submission(&self, id: &SubmissionId) -> Result<Option<Submission>> {
        Ok(self.submissions.read().await.get(id).cloned())
    }

    async fn list_submissions(&self, tournament: &TournamentId) -> Result<Vec<Submission>> {
        let mut matching: Vec<Submission> = self
            .submissions
            .read()
            .await
            .values()
            .filter(|s| &s.tournament_id == tournament)
            .cloned()
            .collect();
        // Stable evaluation order is part of the scheduling contract.
        matching.sort_by_key(|s| s.id);
        Ok(matching)
    }

    async fn put_run(&self, run: &EvaluationRun) -> Result<()> {
        let mut runs = self.runs.write().await;
        if runs.contains_key(&run.id) {
            return Err(StoreError::AlreadyExists(format!("run {}", run.id)));
        }
        runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn update_run(&self, run: &EvaluationRun) -> Result<()> {
        let mut runs = self.runs.write().await;
        if !runs.contains_key(&run.id) {
            return Err(StoreError::NotFound(format!("run {}", run.id)));
        }
        runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(&self, id: &RunId) -> Result<Option<EvaluationRun>> {
        Ok(self.runs.read().await.get(id).cloned())
    }

    async fn list_runs_by_submission(
        &self,
        submission: &SubmissionId,
    ) -> Result<Vec<EvaluationRun>> {
        let mut matching: Vec<EvaluationRun> = self
            .runs
            .read()
            .await
            .values()
            .filter(|r| &r.submission_id == submission)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.epoch_number);
        Ok(matching)
    }

    async fn put_results(
        &self,
        tournament: &TournamentId,
        new_results: &[TournamentResult],
    ) -> Result<()> {
        // Single write lock: the replacement is atomic from every reader's
        // point of view.
        let mut results = self.results.write().await;
        results.retain(|(t, _), _| t != tournament);
        for result in new_results {
            results.insert(
                (result.tournament_id, result.participant_id.clone()),
                result.clone(),
            );
        }
        Ok(())
    }

    async fn list_results(&self, tournament: &TournamentId) -> Result<Vec<TournamentResult>> {
        let mut matching: Vec<TournamentResult> = self
            .results
            .read()
            .await
            .values()
            .filter(|r| &r.tournament_id == tournament)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.rank);
        Ok(matching)
    }

    async fn put_job(&self, job: &Job) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(format!("job {}", job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn update_job(&self, job: &Job) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if !jobs.contains_key(&job.id) {
            return Err(StoreError::job_not_found(&job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        Ok(self.jobs.read().await.values().cloned().collect())
    }

    async fn delete_job(&self, id: &JobId) -> Result<()> {
        self.jobs.write().await.remove(id);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            tournament_count: self.tournaments.read().await.len(),
            submission_count: self.submissions.read().await.len(),
            run_count: self.runs.read().await.len(),
            result_count: self.results.read().await.len(),
            job_count: self.jobs.read().await.len(),
        })
    }
}
