use crate::aggregate::aggregate_results;
use crate::error::{EngineError, Result};
use crate::retry::with_store_retry;
use crate::weights::{normalize_weights, WeightSink};
use agora_dataset::{DatasetLayout, GroundTruth, TransferIndex, WorkLayout};
use agora_sandbox::{Sandbox, SandboxLimits, TIMEOUT_EXIT_CODE};
use agora_scoring::{
    FlowVerifier, MeasuredTimes, OutputValidator, PayloadTimings, ScoreParams, Scorer,
};
use agora_store::{Job, JobKind, JobQueue, TournamentStore};
use agora_submission::SubmissionProcessor;
use agora_types::{
    EvaluationRun, RunStatus, Submission, SubmissionStatus, Tournament, TournamentId,
    TournamentStatus,
};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Grace added on top of the container timeout for the orchestrator-level
/// watchdog that reaps stuck sandboxes.
const WATCHDOG_GRACE: Duration = Duration::from_secs(60);

/// Fixed phase budgets for the cheap phases; epoch and close budgets scale
/// with the tournament configuration.
const START_BUDGET: Duration = Duration::from_secs(120);
const COLLECT_TICK_BUDGET: Duration = Duration::from_secs(300);
const FINALIZE_BUDGET: Duration = Duration::from_secs(600);

/// The engine's control core: one logical supervisor per validator, driven
/// by the durable job queue.
pub struct Orchestrator {
    store: TournamentStore,
    queue: JobQueue,
    processor: Arc<SubmissionProcessor>,
    sandbox: Arc<dyn Sandbox>,
    validator: OutputValidator,
    datasets: DatasetLayout,
    work: WorkLayout,
    weight_sink: Arc<dyn WeightSink>,
    default_config: agora_types::TournamentConfig,
    collect_poll_seconds: u64,
    build_budget: Duration,
    shutdown: Arc<AtomicBool>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: TournamentStore,
        queue: JobQueue,
        processor: Arc<SubmissionProcessor>,
        sandbox: Arc<dyn Sandbox>,
        datasets: DatasetLayout,
        work: WorkLayout,
        weight_sink: Arc<dyn WeightSink>,
        default_config: agora_types::TournamentConfig,
    ) -> Self {
        Self {
            store,
            queue,
            processor,
            sandbox,
            validator: OutputValidator::default(),
            datasets,
            work,
            weight_sink,
            default_config,
            collect_poll_seconds: 30,
            build_budget: Duration::from_secs(600),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_collect_poll(mut self, seconds: u64) -> Self {
        self.collect_poll_seconds = seconds;
        self
    }

    /// Cooperative cancellation token: checked between jobs, between
    /// submissions, and between epochs. Sandboxes are killed forcefully by
    /// their own watchdog.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    fn check_shutdown(&self) -> Result<()> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(EngineError::Shutdown);
        }
        Ok(())
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn store(&self) -> &TournamentStore {
        &self.store
    }

    /// The administrative trigger: start a tournament for an explicit epoch
    /// number (manual schedule mode).
    pub async fn trigger_tournament(&self, epoch_number: u64) -> Result<()> {
        self.default_config.validate()?;
        self.queue
            .enqueue_now(JobKind::StartTournament { epoch_number })
            .await?;
        Ok(())
    }

    /// Execute one queue job under its phase budget. Phase errors never
    /// bubble out of here: they fail the tournament (no weight emission) and
    /// the job is acked. Only `Shutdown` escapes, leaving the job leased for
    /// redelivery after restart.
    pub async fn handle_job(&self, job: &Job) -> Result<()> {
        let budget = self.phase_budget(&job.kind).await;
        let outcome = match timeout(budget, self.dispatch(job)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(EngineError::PhaseTimeout(format!(
                "{} exceeded {}s",
                job.kind,
                budget.as_secs()
            ))),
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(EngineError::Shutdown) => Err(EngineError::Shutdown),
            Err(e) => {
                error!(job = %job.kind, error = %e, "❌ phase failed");
                if let Some(tournament_id) = job.kind.tournament_id() {
                    self.fail_tournament(tournament_id, &e.to_string()).await;
                }
                Ok(())
            }
        }
    }

    async fn phase_budget(&self, kind: &JobKind) -> Duration {
        match kind {
            JobKind::StartTournament { .. } => START_BUDGET,
            JobKind::CollectTick { .. } => COLLECT_TICK_BUDGET,
            JobKind::FinalizeTournament { .. } => FINALIZE_BUDGET,
            JobKind::CloseSubmissions { tournament_id } => {
                // One build budget per submission, bounded below.
                let submissions = self
                    .store
                    .list_submissions(tournament_id)
                    .await
                    .map(|s| s.len() as u32)
                    .unwrap_or(1)
                    .max(1);
                self.build_budget * submissions + START_BUDGET
            }
            JobKind::RunEpoch { tournament_id, .. } => {
                match self.store.get_tournament(tournament_id).await {
                    Ok(t) => {
                        let per_run = Duration::from_secs(t.config.run_timeout_seconds)
                            + WATCHDOG_GRACE;
                        let runs = (t.total_submissions.max(1)) as u32;
                        (per_run * runs).max(Duration::from_secs(t.config.epoch_duration_seconds))
                    }
                    Err(_) => Duration::from_secs(3600),
                }
            }
        }
    }

    async fn dispatch(&self, job: &Job) -> Result<()> {
        match &job.kind {
            JobKind::StartTournament { epoch_number } => self.start_tournament(*epoch_number).await,
            JobKind::CollectTick { tournament_id, seq } => {
                self.collect_tick(tournament_id, *seq).await
            }
            JobKind::CloseSubmissions { tournament_id } => {
                self.close_submissions(tournament_id).await
            }
            JobKind::RunEpoch {
                tournament_id,
                epoch_index,
            } => self.run_epoch(tournament_id, *epoch_index, job.run_at).await,
            JobKind::FinalizeTournament { tournament_id } => self.finalize(tournament_id).await,
        }
    }

    // ------------------------------------------------------------------
    // Phase: start + collect
    // ------------------------------------------------------------------

    async fn start_tournament(&self, epoch_number: u64) -> Result<()> {
        if let Err(e) = self.default_config.validate() {
            // ConfigurationInvalid is a refusal, not a tournament failure:
            // there is no tournament yet.
            error!(error = %e, "⚙️ refusing to start tournament with invalid configuration");
            return Ok(());
        }

        let now = Utc::now();
        let created = self
            .store
            .create_tournament(epoch_number, self.default_config.clone(), now)
            .await;

        let tournament = match created {
            Ok(t) => t,
            Err(agora_store::StoreError::ActiveTournamentExists(live)) => {
                warn!(epoch = epoch_number, live = %live, "tournament already live, skipping start");
                return Ok(());
            }
            Err(agora_store::StoreError::DuplicateEpoch(epoch)) => {
                warn!(epoch, "epoch already ran, skipping start");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        self.store
            .advance_tournament(&tournament.id, TournamentStatus::Collecting)
            .await?;

        self.queue
            .enqueue_now(JobKind::CollectTick {
                tournament_id: tournament.id,
                seq: 0,
            })
            .await?;
        let close_at =
            tournament.started_at + ChronoDuration::seconds(tournament.config.submission_duration_seconds as i64);
        self.queue
            .enqueue_at(
                JobKind::CloseSubmissions {
                    tournament_id: tournament.id,
                },
                close_at,
            )
            .await?;

        info!(
            tournament_id = %tournament.id,
            epoch = epoch_number,
            close_at = %close_at,
            "🏁 tournament started, collecting submissions"
        );
        Ok(())
    }

    async fn collect_tick(&self, tournament_id: &TournamentId, seq: u64) -> Result<()> {
        let tournament = self.store.get_tournament(tournament_id).await?;
        if tournament.status != TournamentStatus::Collecting {
            return Ok(());
        }

        match self
            .processor
            .collect_claims(tournament_id, tournament.epoch_number)
            .await
        {
            Ok(claims) => {
                for (participant, claim) in claims {
                    let result = with_store_retry("upsert_submission", || {
                        self.store.upsert_submission(
                            *tournament_id,
                            participant.clone(),
                            claim.repository_url.clone(),
                            claim.commit_hash.clone(),
                            Utc::now(),
                        )
                    })
                    .await;
                    match result {
                        Ok(_) => {}
                        Err(agora_store::StoreError::Conflict(_)) => {
                            // Claim landed after the window effectively
                            // closed for this participant; ignore.
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "collect pass failed, will retry next tick");
            }
        }

        let close_at = tournament.started_at
            + ChronoDuration::seconds(tournament.config.submission_duration_seconds as i64);
        let next_tick = Utc::now() + ChronoDuration::seconds(self.collect_poll_seconds as i64);
        if next_tick < close_at {
            self.queue
                .enqueue_at(
                    JobKind::CollectTick {
                        tournament_id: *tournament_id,
                        seq: seq + 1,
                    },
                    next_tick,
                )
                .await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase: close window, build images
    // ------------------------------------------------------------------

    async fn close_submissions(&self, tournament_id: &TournamentId) -> Result<()> {
        let tournament = self.store.get_tournament(tournament_id).await?;
        if tournament.status != TournamentStatus::Collecting {
            return Ok(());
        }

        let submissions = self.store.list_submissions(tournament_id).await?;
        info!(
            tournament_id = %tournament_id,
            submissions = submissions.len(),
            "📪 submission window closed, building images"
        );

        for submission in &submissions {
            self.check_shutdown()?;
            match submission.status {
                SubmissionStatus::Pending => {
                    with_store_retry("submission_validating", || {
                        self.store.set_submission_status(
                            &submission.id,
                            SubmissionStatus::Validating,
                            None,
                            None,
                        )
                    })
                    .await?;
                    self.build_submission(submission).await?;
                }
                // A crash mid-build leaves Validating rows behind; resume
                // them on redelivery.
                SubmissionStatus::Validating => self.build_submission(submission).await?,
                _ => {}
            }
        }

        with_store_retry("tournament_counters", || {
            self.store
                .set_tournament_counters(tournament_id, Some(submissions.len() as u32), None)
        })
        .await?;

        self.store
            .advance_tournament(tournament_id, TournamentStatus::Testing)
            .await?;
        self.queue
            .enqueue_now(JobKind::RunEpoch {
                tournament_id: *tournament_id,
                epoch_index: 0,
            })
            .await?;
        Ok(())
    }

    /// Build one submission; failures classify and mark the submission
    /// failed, the tournament continues.
    async fn build_submission(&self, submission: &Submission) -> Result<()> {
        let built = self
            .processor
            .build(
                &submission.id,
                &submission.participant_id,
                &submission.repository_url,
                &submission.commit_hash,
            )
            .await;

        match built {
            Ok(image_tag) => {
                with_store_retry("submission_validated", || {
                    self.store.set_submission_status(
                        &submission.id,
                        SubmissionStatus::Validated,
                        Some(image_tag.clone()),
                        None,
                    )
                })
                .await?;
            }
            Err(e) => {
                warn!(
                    submission_id = %submission.id,
                    participant = %submission.participant_id,
                    code = e.code(),
                    error = %e,
                    "submission failed validation"
                );
                with_store_retry("submission_failed", || {
                    self.store.set_submission_status(
                        &submission.id,
                        SubmissionStatus::Failed,
                        None,
                        Some(format!("{}: {}", e.code(), e)),
                    )
                })
                .await?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase: testing epochs
    // ------------------------------------------------------------------

    async fn run_epoch(
        &self,
        tournament_id: &TournamentId,
        epoch_index: u64,
        epoch_start: DateTime<Utc>,
    ) -> Result<()> {
        let tournament = self.store.get_tournament(tournament_id).await?;
        if tournament.status != TournamentStatus::Testing {
            return Ok(());
        }

        let config = &tournament.config;
        let network = config.network_for_epoch(epoch_index).to_string();
        let test_date =
            config.test_date_for_epoch(tournament.started_at.date_naive(), epoch_index);

        info!(
            tournament_id = %tournament_id,
            epoch = epoch_index,
            network = %network,
            test_date = %test_date,
            "⚡ epoch started"
        );

        // Dataset context is loaded once per epoch and shared read-only by
        // every evaluation in it.
        let dataset_dir = self.datasets.resolve(&network, test_date)?;
        let transfers = TransferIndex::load(&self.datasets.transfers_path(&dataset_dir))?;
        let ground_truth = GroundTruth::load(&self.datasets.ground_truth_path(&dataset_dir))?;

        // Sequential by contract: one sandbox at a time keeps resource
        // contention equal and timing comparable across submissions.
        for submission in self.store.validated_submissions(tournament_id).await? {
            self.check_shutdown()?;
            self.evaluate_submission(
                &tournament,
                &submission,
                epoch_index,
                &network,
                test_date,
                &dataset_dir,
                &transfers,
                &ground_truth,
            )
            .await?;
        }

        let rows = self.store.runs_for_tournament(tournament_id).await?;
        let total_runs: u32 = rows.iter().map(|(_, runs)| runs.len() as u32).sum();
        with_store_retry("tournament_counters", || {
            self.store
                .set_tournament_counters(tournament_id, None, Some(total_runs))
        })
        .await?;

        if epoch_index + 1 < config.epoch_count {
            // Hold the epoch cadence: the next epoch starts once
            // epoch_duration has elapsed since this one began.
            let next_at = (epoch_start
                + ChronoDuration::seconds(config.epoch_duration_seconds as i64))
            .max(Utc::now());
            self.queue
                .enqueue_at(
                    JobKind::RunEpoch {
                        tournament_id: *tournament_id,
                        epoch_index: epoch_index + 1,
                    },
                    next_at,
                )
                .await?;
        } else {
            self.store
                .advance_tournament(tournament_id, TournamentStatus::Evaluating)
                .await?;
            self.queue
                .enqueue_now(JobKind::FinalizeTournament {
                    tournament_id: *tournament_id,
                })
                .await?;
        }
        Ok(())
    }

    /// One full evaluation: stage input, run the sandbox under the watchdog,
    /// validate, verify flows, score, persist. Per-run failures classify and
    /// continue; only store failures propagate.
    #[allow(clippy::too_many_arguments)]
    async fn evaluate_submission(
        &self,
        tournament: &Tournament,
        submission: &Submission,
        epoch_index: u64,
        network: &str,
        test_date: NaiveDate,
        dataset_dir: &std::path::Path,
        transfers: &TransferIndex,
        ground_truth: &GroundTruth,
    ) -> Result<()> {
        let (mut run, created) = self
            .store
            .create_run_if_absent(EvaluationRun::new(
                submission.id,
                epoch_index,
                network.to_string(),
                test_date,
            ))
            .await?;

        // Idempotent resume: a re-delivered epoch job skips finished runs.
        if !created && matches!(run.status, RunStatus::Completed | RunStatus::Failed | RunStatus::Timeout) {
            return Ok(());
        }

        run.status = RunStatus::Running;
        run.started_at = Some(Utc::now());
        with_store_retry("run_started", || self.store.update_run(&run)).await?;

        let outcome = self
            .execute_run(&mut run, tournament, submission, epoch_index, dataset_dir, transfers, ground_truth)
            .await;

        if let Err(e) = outcome {
            // Host-side launch/staging failure: the run fails, the
            // tournament moves on.
            warn!(
                run_id = %run.id,
                participant = %submission.participant_id,
                error = %e,
                "run failed before completion"
            );
            run.status = RunStatus::Failed;
            run.error_message = Some(e);
        }

        run.completed_at = Some(Utc::now());
        with_store_retry("run_persisted", || self.store.update_run(&run)).await?;

        let _ = self
            .work
            .cleanup_run(&tournament.id, epoch_index, &submission.participant_id);

        info!(
            run_id = %run.id,
            participant = %submission.participant_id,
            status = %run.status,
            final_score = run.scores.map(|s| s.final_score).unwrap_or(0.0),
            "run recorded"
        );
        Ok(())
    }

    /// The sandbox-and-score part of a run. Returns `Err(message)` for
    /// host-side failures that should mark the run failed.
    #[allow(clippy::too_many_arguments)]
    async fn execute_run(
        &self,
        run: &mut EvaluationRun,
        tournament: &Tournament,
        submission: &Submission,
        epoch_index: u64,
        dataset_dir: &std::path::Path,
        transfers: &TransferIndex,
        ground_truth: &GroundTruth,
    ) -> std::result::Result<(), String> {
        let config = &tournament.config;
        let Some(image_tag) = submission.image_tag.as_deref() else {
            return Err("validated submission has no image tag".to_string());
        };

        let dirs = self
            .work
            .prepare_run_dirs(&tournament.id, epoch_index, &submission.participant_id)
            .map_err(|e| format!("workspace setup failed: {e}"))?;
        self.datasets
            .stage_run_input(dataset_dir, &dirs.input)
            .map_err(|e| format!("input staging failed: {e}"))?;

        let limits = SandboxLimits {
            wall_timeout: Duration::from_secs(config.run_timeout_seconds),
            memory_limit_bytes: config.memory_limit_bytes,
            cpu_cores: config.cpu_cores,
            process_limit: config.process_limit,
        };

        // Two layers of timeout: the sandbox enforces the payload budget,
        // and the orchestrator watchdog force-terminates a stuck runner.
        let watchdog = limits.wall_timeout + WATCHDOG_GRACE;
        let report = match timeout(
            watchdog,
            self.sandbox.run(image_tag, &dirs.input, &dirs.output, &limits),
        )
        .await
        {
            Err(_) => {
                warn!(run_id = %run.id, "watchdog killed a stuck sandbox");
                run.status = RunStatus::Timeout;
                run.exit_code = Some(TIMEOUT_EXIT_CODE);
                run.duration_seconds = Some(watchdog.as_secs_f64());
                return Ok(());
            }
            Ok(Err(e)) => return Err(format!("sandbox_launch_failed: {e}")),
            Ok(Ok(report)) => report,
        };

        run.duration_seconds = Some(report.wall_seconds);
        run.exit_code = Some(report.exit_code);

        if report.timed_out {
            run.status = RunStatus::Timeout;
            run.error_message = Some("container exceeded wall-clock timeout".to_string());
            return Ok(());
        }
        if report.exit_code != 0 {
            run.status = RunStatus::Failed;
            run.error_message = Some(format!("exit_code_{}", report.exit_code));
            return Ok(());
        }

        let outcome = self
            .validator
            .validate(&dirs.output)
            .map_err(|e| format!("output read failed: {e}"))?;
        let timings = PayloadTimings::read(&dirs.output, report.wall_seconds);
        let times = MeasuredTimes {
            feature_seconds: timings.feature_generation_seconds,
            pattern_seconds: timings.pattern_detection_seconds,
        };
        let scorer = Scorer::new(ScoreParams {
            baseline_feature_time_seconds: config.baseline_feature_time_seconds,
            baseline_pattern_time_seconds: config.baseline_pattern_time_seconds,
            feature_time_cap_seconds: config.feature_time_cap_seconds,
            pattern_time_cap_seconds: config.pattern_time_cap_seconds,
        });

        run.feature_time_seconds = Some(times.feature_seconds);
        run.pattern_time_seconds = Some(times.pattern_seconds);
        run.status = RunStatus::Completed;

        if !outcome.features_valid {
            run.features_valid = Some(false);
            run.error_message = outcome.invalid_reason.clone();
            run.scores = Some(scorer.score(false, &run.counts, &times));
            return Ok(());
        }

        let verifier = FlowVerifier::new(transfers);
        run.counts = Scorer::classify(&verifier, &outcome.patterns, ground_truth);
        run.features_valid = Some(true);
        run.scores = Some(scorer.score(true, &run.counts, &times));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase: finalize
    // ------------------------------------------------------------------

    async fn finalize(&self, tournament_id: &TournamentId) -> Result<()> {
        let tournament = self.store.get_tournament(tournament_id).await?;
        match tournament.status {
            TournamentStatus::Evaluating => {}
            // Redelivery after a crash past completion.
            TournamentStatus::Completed => return Ok(()),
            _ => return Ok(()),
        }

        let rows = self.store.runs_for_tournament(tournament_id).await?;
        let results = aggregate_results(&tournament, &rows, Utc::now());

        // Submissions disqualified by their runs are flagged on their row
        // too, so the reporting surface shows the reason.
        for result in results.iter().filter(|r| r.disqualified) {
            let status = self.store.get_submission(&result.submission_id).await?.status;
            if status == SubmissionStatus::Validated {
                with_store_retry("submission_disqualified", || {
                    self.store.set_submission_status(
                        &result.submission_id,
                        SubmissionStatus::Disqualified,
                        None,
                        result.disqualification_reason.clone(),
                    )
                })
                .await?;
            }
        }

        with_store_retry("persist_results", || {
            self.store.persist_results(tournament_id, &results)
        })
        .await?;

        let weights = normalize_weights(&results);
        self.weight_sink.emit(tournament_id, &weights).await?;
        self.store.mark_weights_set(tournament_id).await?;

        self.store
            .advance_tournament(tournament_id, TournamentStatus::Completed)
            .await?;
        self.queue.purge_tournament(tournament_id).await?;

        info!(
            tournament_id = %tournament_id,
            participants = results.len(),
            "✅ tournament completed, weights emitted"
        );
        Ok(())
    }

    /// Terminal failure path: no weight emission, pending jobs purged.
    pub async fn fail_tournament(&self, tournament_id: &TournamentId, reason: &str) {
        error!(tournament_id = %tournament_id, reason, "💥 tournament failed");
        match self
            .store
            .advance_tournament(tournament_id, TournamentStatus::Failed)
            .await
        {
            Ok(_) => {}
            Err(agora_store::StoreError::InvalidTransition { .. }) => {
                // Already terminal.
            }
            Err(e) => {
                error!(tournament_id = %tournament_id, error = %e, "could not record tournament failure");
            }
        }
        if let Err(e) = self.queue.purge_tournament(tournament_id).await {
            error!(tournament_id = %tournament_id, error = %e, "could not purge tournament jobs");
        }
    }
}
