//! End-to-end tournament flow against the in-memory store, with stub
//! implementations at every external seam: peer protocol, image builder,
//! and sandbox.
//!
//! Three participants:
//! - alice: clean run, finds the synthetic pattern plus one novelty;
//! - bob: container exits non-zero, which disqualifies him outright;
//! - carol: output is schema-valid but her one claimed pattern has no
//!   backing flows, so she only earns the feature-performance sliver.

use agora_dataset::{DatasetLayout, WorkLayout};
use agora_engine::{normalize_weights, Orchestrator, Worker};
use agora_sandbox::{RunReport, Sandbox, SandboxError, SandboxLimits};
use agora_store::{JobQueue, MemoryBackend, StoreBackend, TournamentStore};
use agora_submission::{
    builder::image_tag, ImageBuilder, SubmissionClaim, SubmissionError, SubmissionProcessor,
    SubmissionProtocol,
};
use agora_types::{
    ParticipantId, RunStatus, ScheduleMode, SubmissionId, SubmissionStatus, TournamentConfig,
    TournamentId, TournamentStatus,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const TEST_DATE: &str = "2025-06-01";

// ---------------------------------------------------------------------
// Stubs
// ---------------------------------------------------------------------

struct StubProtocol {
    claims: Vec<(ParticipantId, SubmissionClaim)>,
}

#[async_trait]
impl SubmissionProtocol for StubProtocol {
    async fn peers(&self) -> Result<Vec<ParticipantId>, SubmissionError> {
        Ok(self.claims.iter().map(|(p, _)| p.clone()).collect())
    }

    async fn collect(
        &self,
        _tournament_id: &TournamentId,
        _epoch_number: u64,
        peer: &ParticipantId,
    ) -> Result<Option<SubmissionClaim>, SubmissionError> {
        Ok(self
            .claims
            .iter()
            .find(|(p, _)| p == peer)
            .map(|(_, claim)| claim.clone()))
    }
}

struct StubBuilder;

#[async_trait]
impl ImageBuilder for StubBuilder {
    async fn build(
        &self,
        _submission_id: &SubmissionId,
        participant: &ParticipantId,
        _repository_url: &str,
        commit_hash: &str,
    ) -> Result<String, SubmissionError> {
        Ok(image_tag(participant, commit_hash))
    }
}

#[derive(Clone)]
enum PayloadBehavior {
    /// Write good artifacts: the synthetic pattern and one real novelty.
    Honest,
    /// Exit with the given non-zero code.
    Crash(i32),
    /// Valid schema, but the claimed pattern's flows do not exist.
    Fabricate,
}

struct StubSandbox {
    behaviors: HashMap<String, PayloadBehavior>,
}

#[async_trait]
impl Sandbox for StubSandbox {
    async fn run(
        &self,
        image_tag: &str,
        _input_dir: &Path,
        output_dir: &Path,
        _limits: &SandboxLimits,
    ) -> Result<RunReport, SandboxError> {
        let behavior = self
            .behaviors
            .get(image_tag)
            .cloned()
            .ok_or_else(|| SandboxError::LaunchFailed(format!("unknown image {image_tag}")))?;

        let exit_code = match behavior {
            PayloadBehavior::Crash(code) => code,
            PayloadBehavior::Honest => {
                write_features(output_dir, &["addr-a", "addr-b", "addr-c"]);
                write_patterns(
                    output_dir,
                    &[
                        "gt-1,cycle,\"addr-a,addr-b\",",
                        "novel-1,layering_path,\"addr-b,addr-c\",",
                    ],
                );
                std::fs::write(
                    output_dir.join("timings.json"),
                    r#"{"feature_generation_seconds": 10.0, "pattern_detection_seconds": 20.0}"#,
                )
                .unwrap();
                0
            }
            PayloadBehavior::Fabricate => {
                write_features(output_dir, &["addr-a", "addr-c"]);
                // addr-c -> addr-a never happened on chain.
                write_patterns(output_dir, &["fake-1,cycle,\"addr-c,addr-a\","]);
                0
            }
        };

        // Wall time larger than any claimed phase time, so the claimed
        // timings survive the untrusted-timings clamp.
        Ok(RunReport {
            exit_code,
            wall_seconds: 25.0,
            timed_out: false,
            tail_log: String::new(),
        })
    }
}

// ---------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------

fn write_features(dir: &Path, addresses: &[&str]) {
    let mut rows = vec![
        "address,degree_in,degree_out,total_amount_in,total_amount_out,tx_count,unique_counterparties,mean_transfer_amount,activity_span_seconds".to_string(),
    ];
    for address in addresses {
        rows.push(format!("{address},1,1,10.0,10.0,2,2,5.0,600"));
    }
    std::fs::write(dir.join("features.csv"), rows.join("\n")).unwrap();
}

fn write_patterns(dir: &Path, rows: &[&str]) {
    let mut lines = vec!["pattern_id,pattern_type,address_path,hop_timestamps".to_string()];
    lines.extend(rows.iter().map(|r| r.to_string()));
    std::fs::write(dir.join("patterns.csv"), lines.join("\n")).unwrap();
}

/// Lay out one dataset under `{root}/torus/{TEST_DATE}/24h/`.
fn write_dataset(root: &Path) {
    let dir = root.join("torus").join(TEST_DATE).join("24h");
    std::fs::create_dir_all(&dir).unwrap();

    std::fs::write(
        dir.join("transfers.csv"),
        "from_address,to_address,asset,amount,block_time\n\
         addr-a,addr-b,tor,5.0,100\n\
         addr-b,addr-c,tor,2.0,200\n",
    )
    .unwrap();
    std::fs::write(dir.join("address_labels.csv"), "address,label\naddr-a,exchange\n").unwrap();
    std::fs::write(dir.join("asset_prices.csv"), "asset,price_usd\ntor,1.25\n").unwrap();
    std::fs::write(dir.join("assets.csv"), "asset,decimals\ntor,9\n").unwrap();
    std::fs::write(
        dir.join("ground_truth.csv"),
        "pattern_id,pattern_type,address\ngt-1,cycle,addr-a\ngt-1,cycle,addr-b\n",
    )
    .unwrap();
}

fn test_config() -> TournamentConfig {
    TournamentConfig {
        submission_duration_seconds: 1,
        epoch_count: 2,
        epoch_duration_seconds: 1,
        networks: vec!["torus".to_string()],
        schedule_mode: ScheduleMode::Manual,
        feature_time_cap_seconds: 300.0,
        pattern_time_cap_seconds: 600.0,
        baseline_feature_time_seconds: 30.0,
        baseline_pattern_time_seconds: 120.0,
        memory_limit_bytes: 1024 * 1024 * 1024,
        cpu_cores: 1.0,
        process_limit: 64,
        run_timeout_seconds: 30,
        baseline_score: 0.5,
        // Both epochs read the same pinned dataset date.
        pin_test_date: Some(TEST_DATE.parse::<NaiveDate>().unwrap()),
    }
}

struct Harness {
    orchestrator: Arc<Orchestrator>,
    worker: Worker,
    store: TournamentStore,
    _data_dir: tempfile::TempDir,
    _work_dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let data_dir = tempfile::tempdir().unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    write_dataset(data_dir.path());

    let alice = ParticipantId::new("alice");
    let bob = ParticipantId::new("bob");
    let carol = ParticipantId::new("carol");
    let commit = |c: char| c.to_string().repeat(40);
    let claim = |c: char| SubmissionClaim {
        repository_url: "https://git.example/x/analyzer".to_string(),
        commit_hash: commit(c),
    };

    let protocol = StubProtocol {
        claims: vec![
            (alice.clone(), claim('a')),
            (bob.clone(), claim('b')),
            (carol.clone(), claim('c')),
        ],
    };

    let mut behaviors = HashMap::new();
    behaviors.insert(image_tag(&alice, &commit('a')), PayloadBehavior::Honest);
    behaviors.insert(image_tag(&bob, &commit('b')), PayloadBehavior::Crash(3));
    behaviors.insert(image_tag(&carol, &commit('c')), PayloadBehavior::Fabricate);

    let backend: Arc<dyn StoreBackend> = Arc::new(MemoryBackend::new());
    let store = TournamentStore::new(backend.clone());
    let queue = JobQueue::new(backend);
    let processor = Arc::new(SubmissionProcessor::new(
        Arc::new(protocol),
        Arc::new(StubBuilder),
    ));

    let orchestrator = Arc::new(
        Orchestrator::new(
            store.clone(),
            queue,
            processor,
            Arc::new(StubSandbox { behaviors }),
            DatasetLayout::new(PathBuf::from(data_dir.path())),
            WorkLayout::new(PathBuf::from(work_dir.path())),
            Arc::new(agora_engine::LogWeightSink),
            test_config(),
        )
        .with_collect_poll(1),
    );
    let worker = Worker::new(orchestrator.clone());

    Harness {
        orchestrator,
        worker,
        store,
        _data_dir: data_dir,
        _work_dir: work_dir,
    }
}

/// Drain the queue repeatedly (jobs schedule each other into the future)
/// until the tournament reaches a terminal status.
async fn run_to_completion(harness: &Harness) -> agora_types::Tournament {
    for _ in 0..120 {
        harness.worker.drain().await.unwrap();
        if let Some(t) = harness
            .store
            .backend()
            .list_tournaments()
            .await
            .unwrap()
            .into_iter()
            .next()
        {
            if matches!(
                t.status,
                TournamentStatus::Completed | TournamentStatus::Failed
            ) {
                return t;
            }
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    panic!("tournament did not reach a terminal status");
}

// ---------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_full_tournament_lifecycle() {
    let h = harness();
    h.orchestrator.trigger_tournament(1).await.unwrap();

    let tournament = run_to_completion(&h).await;
    assert_eq!(tournament.status, TournamentStatus::Completed);
    assert_eq!(tournament.epoch_number, 1);
    assert_eq!(tournament.total_submissions, 3);
    assert!(tournament.weights_set_at.is_some());
    // 2 epochs x (alice + carol); bob's crash in epoch 0 still records a
    // run per epoch because disqualification happens at aggregation.
    assert_eq!(tournament.total_runs, 6);

    let results = h.store.list_results(&tournament.id).await.unwrap();
    assert_eq!(results.len(), 3);

    // alice wins with both gates passed.
    let alice = &results[0];
    assert_eq!(alice.participant_id.as_str(), "alice");
    assert_eq!(alice.rank, 1);
    assert!(alice.is_winner);
    assert!(alice.beat_baseline);
    assert!(!alice.disqualified);
    // fp=0.75, sr=1, pp=1, nd=0 (cap floor(1/2)=0), pp2=6/7.
    let expected = 0.10 * 0.75 + 0.30 * 1.0 + 0.25 * 1.0 + 0.25 * 0.0 + 0.10 * (6.0 / 7.0);
    assert!((alice.final_score - expected).abs() < 1e-9);
    assert_eq!(alice.total_synthetic_found, 2); // one per epoch
    assert_eq!(alice.total_novelty_valid, 2);

    // carol reported only a fabricated pattern: no valid patterns, so she
    // earns the feature-performance sliver and nothing else.
    let carol = &results[1];
    assert_eq!(carol.participant_id.as_str(), "carol");
    assert!(!carol.disqualified);
    assert!(carol.final_score > 0.0);
    assert!(carol.final_score < 0.1);
    assert_eq!(carol.total_novelty_invalid, 2);

    // bob crashed: strict disqualification.
    let bob = &results[2];
    assert_eq!(bob.participant_id.as_str(), "bob");
    assert!(bob.disqualified);
    assert_eq!(bob.final_score, 0.0);
    assert!(!bob.is_winner);

    // Exactly one winner.
    assert_eq!(results.iter().filter(|r| r.is_winner).count(), 1);

    // Submission rows reflect the outcome.
    let submissions = h.store.list_submissions(&tournament.id).await.unwrap();
    let by_name: HashMap<&str, SubmissionStatus> = submissions
        .iter()
        .map(|s| (s.participant_id.as_str(), s.status))
        .collect();
    assert_eq!(by_name["alice"], SubmissionStatus::Validated);
    assert_eq!(by_name["carol"], SubmissionStatus::Validated);
    assert_eq!(by_name["bob"], SubmissionStatus::Disqualified);

    // Weight vector: normalized over non-negative scores, bob at zero.
    let weights = normalize_weights(&results);
    let total: f64 = weights.iter().map(|(_, w)| w).sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert_eq!(weights.iter().find(|(p, _)| p.as_str() == "bob").unwrap().1, 0.0);
}

#[tokio::test]
async fn test_runs_recorded_per_epoch_with_statuses() {
    let h = harness();
    h.orchestrator.trigger_tournament(1).await.unwrap();
    let tournament = run_to_completion(&h).await;

    for submission in h.store.list_submissions(&tournament.id).await.unwrap() {
        let runs = h.store.runs_for_submission(&submission.id).await.unwrap();
        assert_eq!(runs.len(), 2, "{} should have one run per epoch", submission.participant_id);
        assert_eq!(runs[0].epoch_number, 0);
        assert_eq!(runs[1].epoch_number, 1);

        match submission.participant_id.as_str() {
            "bob" => {
                assert!(runs.iter().all(|r| r.status == RunStatus::Failed));
                assert!(runs.iter().all(|r| r.exit_code == Some(3)));
            }
            _ => {
                assert!(runs.iter().all(|r| r.status == RunStatus::Completed));
                assert!(runs.iter().all(|r| r.features_valid == Some(true)));
            }
        }
    }
}

#[tokio::test]
async fn test_redelivered_epoch_job_is_idempotent() {
    let h = harness();
    h.orchestrator.trigger_tournament(1).await.unwrap();
    let tournament = run_to_completion(&h).await;

    let stats_before = h.store.backend().stats().await.unwrap();

    // Simulate an at-least-once redelivery of an already-processed epoch:
    // the handler must leave the store unchanged.
    h.orchestrator
        .queue()
        .enqueue_now(agora_store::JobKind::RunEpoch {
            tournament_id: tournament.id,
            epoch_index: 0,
        })
        .await
        .unwrap();
    h.worker.drain().await.unwrap();

    let stats_after = h.store.backend().stats().await.unwrap();
    assert_eq!(stats_before.run_count, stats_after.run_count);
    assert_eq!(stats_before.result_count, stats_after.result_count);

    let reloaded = h.store.get_tournament(&tournament.id).await.unwrap();
    assert_eq!(reloaded.status, TournamentStatus::Completed);
}

#[tokio::test]
async fn test_second_tournament_rejected_while_live() {
    let h = harness();
    h.orchestrator.trigger_tournament(1).await.unwrap();
    // Process the start job only.
    h.worker.drain().await.unwrap();

    let live = h.store.active_tournament().await.unwrap().unwrap();
    assert_eq!(live.status, TournamentStatus::Collecting);

    // A second start while one is live is skipped, not an error.
    h.orchestrator.trigger_tournament(2).await.unwrap();
    h.worker.drain().await.unwrap();
    assert!(h
        .store
        .backend()
        .get_tournament_by_epoch(2)
        .await
        .unwrap()
        .is_none());

    let tournament = run_to_completion(&h).await;
    assert_eq!(tournament.epoch_number, 1);
}
