use crate::config::TournamentConfig;
use crate::id::{ParticipantId, RunId, SubmissionId, TournamentId};
use crate::status::{RunStatus, SubmissionStatus, TournamentStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One complete evaluation cycle. Owned by the state store; the orchestrator
/// only ever holds snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    /// Globally unique, monotonically increasing across tournaments.
    pub epoch_number: u64,
    pub status: TournamentStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub weights_set_at: Option<DateTime<Utc>>,
    /// Configuration snapshot taken at creation.
    pub config: TournamentConfig,
    pub networks: Vec<String>,
    pub total_submissions: u32,
    pub total_runs: u32,
    pub created_at: DateTime<Utc>,
}

impl Tournament {
    pub fn new(epoch_number: u64, config: TournamentConfig, now: DateTime<Utc>) -> Self {
        let networks = config.networks.clone();
        Self {
            id: TournamentId::for_epoch(epoch_number),
            epoch_number,
            status: TournamentStatus::Pending,
            started_at: now,
            completed_at: None,
            weights_set_at: None,
            config,
            networks,
            total_submissions: 0,
            total_runs: 0,
            created_at: now,
        }
    }
}

/// A participant's `(repository, commit)` claim for one tournament, and the
/// image built from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub tournament_id: TournamentId,
    pub participant_id: ParticipantId,
    pub repository_url: String,
    /// 40-character lowercase hex, validated at collection.
    pub commit_hash: String,
    pub image_tag: Option<String>,
    pub status: SubmissionStatus,
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
}

impl Submission {
    pub fn new(
        tournament_id: TournamentId,
        participant_id: ParticipantId,
        repository_url: String,
        commit_hash: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SubmissionId::for_participant(&tournament_id, &participant_id),
            tournament_id,
            participant_id,
            repository_url,
            commit_hash,
            image_tag: None,
            status: SubmissionStatus::Pending,
            error: None,
            submitted_at: now,
            validated_at: None,
        }
    }
}

/// Exact pattern counts from one run's validation, kept as integers; only the
/// derived ratios are floating-point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub patterns_reported: u32,
    pub synthetic_found: u32,
    pub synthetic_expected: u32,
    pub novelty_valid: u32,
    pub novelty_invalid: u32,
}

/// The five sub-scores and the gated final score for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunScores {
    pub feature_performance: f64,
    pub synthetic_recall: f64,
    pub pattern_precision: f64,
    pub novelty_discovery: f64,
    pub pattern_performance: f64,
    pub final_score: f64,
}

/// One sandboxed execution of one submission on one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRun {
    pub id: RunId,
    pub submission_id: SubmissionId,
    pub epoch_number: u64,
    pub network: String,
    pub test_date: NaiveDate,
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub duration_seconds: Option<f64>,
    pub features_valid: Option<bool>,
    pub feature_time_seconds: Option<f64>,
    pub pattern_time_seconds: Option<f64>,
    pub counts: RunCounts,
    pub scores: Option<RunScores>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl EvaluationRun {
    pub fn new(
        submission_id: SubmissionId,
        epoch_number: u64,
        network: String,
        test_date: NaiveDate,
    ) -> Self {
        Self {
            id: RunId::for_epoch(&submission_id, epoch_number),
            submission_id,
            epoch_number,
            network,
            test_date,
            status: RunStatus::Pending,
            exit_code: None,
            duration_seconds: None,
            features_valid: None,
            feature_time_seconds: None,
            pattern_time_seconds: None,
            counts: RunCounts::default(),
            scores: None,
            error_message: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Whether this run, on its own, disqualifies the submission at
    /// aggregation: failed, timed out, or produced invalid features.
    pub fn disqualifies_submission(&self) -> bool {
        self.status.disqualifies() || self.features_valid == Some(false)
    }
}

/// Aggregated standing for one participant in one completed tournament.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentResult {
    pub tournament_id: TournamentId,
    pub participant_id: ParticipantId,
    pub submission_id: SubmissionId,
    pub mean_scores: RunScores,
    pub mean_duration_seconds: f64,
    pub total_runs: u32,
    pub total_patterns_reported: u32,
    pub total_synthetic_found: u32,
    pub total_novelty_valid: u32,
    pub total_novelty_invalid: u32,
    pub final_score: f64,
    pub rank: u32,
    pub beat_baseline: bool,
    pub is_winner: bool,
    pub disqualified: bool,
    pub disqualification_reason: Option<String>,
    pub calculated_at: DateTime<Utc>,
}
