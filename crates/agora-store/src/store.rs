use crate::backend::StoreBackend;
use crate::error::{Result, StoreError};
use agora_types::{
    EvaluationRun, LifecycleState, ParticipantId, Submission, SubmissionId, SubmissionStatus,
    Tournament, TournamentConfig, TournamentId, TournamentResult, TournamentStatus,
};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Invariant-enforcing facade over a `StoreBackend`. Every mutation the
/// orchestrator performs goes through here; components never share entity
/// objects, only ids and snapshots.
#[derive(Clone)]
pub struct TournamentStore {
    backend: Arc<dyn StoreBackend>,
}

impl TournamentStore {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.backend
    }

    // ------------------------------------------------------------------
    // Tournaments
    // ------------------------------------------------------------------

    /// Create a tournament for an epoch. Fails when the epoch number is
    /// taken or another tournament is still live.
    pub async fn create_tournament(
        &self,
        epoch_number: u64,
        config: TournamentConfig,
        now: DateTime<Utc>,
    ) -> Result<Tournament> {
        if let Some(existing) = self.backend.get_tournament_by_epoch(epoch_number).await? {
            warn!(epoch = epoch_number, existing = %existing.id, "epoch number already taken");
            return Err(StoreError::DuplicateEpoch(epoch_number));
        }
        if let Some(live) = self.active_tournament().await? {
            return Err(StoreError::ActiveTournamentExists(live.id.to_hex()));
        }

        let tournament = Tournament::new(epoch_number, config, now);
        self.backend.put_tournament(&tournament).await?;
        info!(
            tournament_id = %tournament.id,
            epoch = epoch_number,
            networks = ?tournament.networks,
            "🏁 tournament created"
        );
        Ok(tournament)
    }

    pub async fn get_tournament(&self, id: &TournamentId) -> Result<Tournament> {
        self.backend
            .get_tournament(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("tournament {id}")))
    }

    /// The single tournament in a non-terminal status, if any.
    pub async fn active_tournament(&self) -> Result<Option<Tournament>> {
        Ok(self
            .backend
            .list_tournaments()
            .await?
            .into_iter()
            .find(|t| !t.status.is_terminal()))
    }

    pub async fn latest_epoch_number(&self) -> Result<Option<u64>> {
        Ok(self
            .backend
            .list_tournaments()
            .await?
            .into_iter()
            .map(|t| t.epoch_number)
            .max())
    }

    /// Advance the tournament along its lifecycle graph. Rejects anything
    /// the graph forbids.
    pub async fn advance_tournament(
        &self,
        id: &TournamentId,
        next: TournamentStatus,
    ) -> Result<Tournament> {
        let mut tournament = self.get_tournament(id).await?;
        if !tournament.status.can_transition_to(&next) {
            return Err(StoreError::InvalidTransition {
                entity: "tournament",
                from: tournament.status.to_string(),
                to: next.to_string(),
            });
        }
        let from = tournament.status;
        tournament.status = next;
        if next.is_terminal() {
            tournament.completed_at = Some(Utc::now());
        }
        self.backend.update_tournament(&tournament).await?;
        info!(
            tournament_id = %id,
            from = %from,
            to = %next,
            "🔄 tournament status advanced"
        );
        Ok(tournament)
    }

    pub async fn mark_weights_set(&self, id: &TournamentId) -> Result<()> {
        let mut tournament = self.get_tournament(id).await?;
        tournament.weights_set_at = Some(Utc::now());
        self.backend.update_tournament(&tournament).await
    }

    pub async fn set_tournament_counters(
        &self,
        id: &TournamentId,
        total_submissions: Option<u32>,
        total_runs: Option<u32>,
    ) -> Result<()> {
        let mut tournament = self.get_tournament(id).await?;
        if let Some(n) = total_submissions {
            tournament.total_submissions = n;
        }
        if let Some(n) = total_runs {
            tournament.total_runs = n;
        }
        self.backend.update_tournament(&tournament).await
    }

    // ------------------------------------------------------------------
    // Submissions
    // ------------------------------------------------------------------

    /// Record a participant's claim during the collection window. A repeat
    /// claim from the same participant replaces the previous `(url, commit)`
    /// while the submission is still pending; anything later is rejected.
    pub async fn upsert_submission(
        &self,
        tournament_id: TournamentId,
        participant_id: ParticipantId,
        repository_url: String,
        commit_hash: String,
        now: DateTime<Utc>,
    ) -> Result<Submission> {
        let id = SubmissionId::for_participant(&tournament_id, &participant_id);
        match self.backend.get_submission(&id).await? {
            None => {
                let submission = Submission::new(
                    tournament_id,
                    participant_id,
                    repository_url,
                    commit_hash,
                    now,
                );
                self.backend.put_submission(&submission).await?;
                info!(
                    submission_id = %submission.id,
                    participant = %submission.participant_id,
                    "📨 submission recorded"
                );
                Ok(submission)
            }
            Some(mut existing) => {
                if existing.status != SubmissionStatus::Pending {
                    return Err(StoreError::Conflict(format!(
                        "submission {id} already {}",
                        existing.status
                    )));
                }
                if existing.repository_url != repository_url
                    || existing.commit_hash != commit_hash
                {
                    existing.repository_url = repository_url;
                    existing.commit_hash = commit_hash;
                    existing.submitted_at = now;
                    self.backend.update_submission(&existing).await?;
                    info!(
                        submission_id = %existing.id,
                        participant = %existing.participant_id,
                        "submission claim updated"
                    );
                }
                Ok(existing)
            }
        }
    }

    pub async fn get_submission(&self, id: &SubmissionId) -> Result<Submission> {
        self.backend
            .get_submission(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("submission {id}")))
    }

    /// Submissions of a tournament in stable (submission-id) order.
    pub async fn list_submissions(&self, tournament: &TournamentId) -> Result<Vec<Submission>> {
        self.backend.list_submissions(tournament).await
    }

    pub async fn validated_submissions(
        &self,
        tournament: &TournamentId,
    ) -> Result<Vec<Submission>> {
        Ok(self
            .list_submissions(tournament)
            .await?
            .into_iter()
            .filter(|s| s.status == SubmissionStatus::Validated)
            .collect())
    }

    /// Move a submission along its lifecycle, attaching the build output or
    /// classified error.
    pub async fn set_submission_status(
        &self,
        id: &SubmissionId,
        next: SubmissionStatus,
        image_tag: Option<String>,
        error: Option<String>,
    ) -> Result<Submission> {
        let mut submission = self.get_submission(id).await?;
        if !submission.status.can_transition_to(&next) {
            return Err(StoreError::InvalidTransition {
                entity: "submission",
                from: submission.status.to_string(),
                to: next.to_string(),
            });
        }
        submission.status = next;
        if let Some(tag) = image_tag {
            submission.image_tag = Some(tag);
        }
        if let Some(message) = error {
            submission.error = Some(message);
        }
        if next == SubmissionStatus::Validated {
            submission.validated_at = Some(Utc::now());
        }
        self.backend.update_submission(&submission).await?;
        Ok(submission)
    }

    // ------------------------------------------------------------------
    // Evaluation runs
    // ------------------------------------------------------------------

    /// Create the run row unless it already exists. The run id is derived
    /// from `(submission_id, epoch_number)`, so re-delivered queue jobs land
    /// on the existing row and leave the store unchanged.
    pub async fn create_run_if_absent(&self, run: EvaluationRun) -> Result<(EvaluationRun, bool)> {
        if let Some(existing) = self.backend.get_run(&run.id).await? {
            return Ok((existing, false));
        }
        self.backend.put_run(&run).await?;
        Ok((run, true))
    }

    pub async fn get_run(&self, id: &agora_types::RunId) -> Result<EvaluationRun> {
        self.backend
            .get_run(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("run {id}")))
    }

    /// Persist updated run state, holding the status to its lifecycle graph.
    pub async fn update_run(&self, run: &EvaluationRun) -> Result<()> {
        let stored = self.get_run(&run.id).await?;
        if stored.status != run.status && !stored.status.can_transition_to(&run.status) {
            return Err(StoreError::InvalidTransition {
                entity: "run",
                from: stored.status.to_string(),
                to: run.status.to_string(),
            });
        }
        self.backend.update_run(run).await
    }

    pub async fn runs_for_submission(
        &self,
        submission: &SubmissionId,
    ) -> Result<Vec<EvaluationRun>> {
        self.backend.list_runs_by_submission(submission).await
    }

    /// Every run of every submission in a tournament, paired with its
    /// submission snapshot.
    pub async fn runs_for_tournament(
        &self,
        tournament: &TournamentId,
    ) -> Result<Vec<(Submission, Vec<EvaluationRun>)>> {
        let mut out = Vec::new();
        for submission in self.list_submissions(tournament).await? {
            let runs = self.runs_for_submission(&submission.id).await?;
            out.push((submission, runs));
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Results
    // ------------------------------------------------------------------

    /// Persist the final ranking, one result per participant, atomically.
    pub async fn persist_results(
        &self,
        tournament: &TournamentId,
        results: &[TournamentResult],
    ) -> Result<()> {
        let mut participants = HashSet::new();
        for result in results {
            if &result.tournament_id != tournament {
                return Err(StoreError::Conflict(format!(
                    "result for foreign tournament {}",
                    result.tournament_id
                )));
            }
            if !participants.insert(result.participant_id.clone()) {
                return Err(StoreError::Conflict(format!(
                    "duplicate result for participant {}",
                    result.participant_id
                )));
            }
        }
        self.backend.put_results(tournament, results).await?;
        info!(
            tournament_id = %tournament,
            participants = results.len(),
            "🏆 tournament results persisted"
        );
        Ok(())
    }

    pub async fn list_results(&self, tournament: &TournamentId) -> Result<Vec<TournamentResult>> {
        self.backend.list_results(tournament).await
    }
}
