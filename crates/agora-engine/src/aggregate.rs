use agora_types::{
    EvaluationRun, RunScores, Submission, Tournament, TournamentResult,
};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tracing::info;

/// Aggregate a tournament's runs into per-participant results.
///
/// Disqualification is strict: any failed or timed-out run, or any run with
/// invalid features, zeroes the participant's final score regardless of how
/// the other runs went. Submissions that never produced a run (failed
/// builds) get no result row.
pub fn aggregate_results(
    tournament: &Tournament,
    rows: &[(Submission, Vec<EvaluationRun>)],
    now: DateTime<Utc>,
) -> Vec<TournamentResult> {
    let mut ranked: Vec<(TournamentResult, DateTime<Utc>)> = rows
        .iter()
        .filter(|(_, runs)| !runs.is_empty())
        .map(|(submission, runs)| {
            (
                aggregate_submission(tournament, submission, runs, now),
                submission.submitted_at,
            )
        })
        .collect();

    rank(&mut ranked, tournament.config.baseline_score);
    let results: Vec<TournamentResult> = ranked.into_iter().map(|(result, _)| result).collect();

    info!(
        tournament_id = %tournament.id,
        participants = results.len(),
        disqualified = results.iter().filter(|r| r.disqualified).count(),
        "results aggregated"
    );
    results
}

fn aggregate_submission(
    tournament: &Tournament,
    submission: &Submission,
    runs: &[EvaluationRun],
    now: DateTime<Utc>,
) -> TournamentResult {
    let run_count = runs.len() as u32;

    let disqualification_reason = runs.iter().find_map(|run| {
        if run.status.disqualifies() {
            Some(format!("epoch {} run {}", run.epoch_number, run.status))
        } else if run.features_valid == Some(false) {
            Some(format!("epoch {} invalid features", run.epoch_number))
        } else {
            None
        }
    });
    let disqualified = disqualification_reason.is_some();

    let mean_duration_seconds = mean(runs.iter().filter_map(|r| r.duration_seconds));

    let (mean_scores, final_score) = if disqualified {
        (RunScores::default(), 0.0)
    } else {
        let scores = RunScores {
            feature_performance: mean_of(runs, |s| s.feature_performance),
            synthetic_recall: mean_of(runs, |s| s.synthetic_recall),
            pattern_precision: mean_of(runs, |s| s.pattern_precision),
            novelty_discovery: mean_of(runs, |s| s.novelty_discovery),
            pattern_performance: mean_of(runs, |s| s.pattern_performance),
            final_score: mean_of(runs, |s| s.final_score),
        };
        (scores, scores.final_score)
    };

    TournamentResult {
        tournament_id: tournament.id,
        participant_id: submission.participant_id.clone(),
        submission_id: submission.id,
        mean_scores,
        mean_duration_seconds,
        total_runs: run_count,
        total_patterns_reported: runs.iter().map(|r| r.counts.patterns_reported).sum(),
        total_synthetic_found: runs.iter().map(|r| r.counts.synthetic_found).sum(),
        total_novelty_valid: runs.iter().map(|r| r.counts.novelty_valid).sum(),
        total_novelty_invalid: runs.iter().map(|r| r.counts.novelty_invalid).sum(),
        final_score,
        rank: 0,
        beat_baseline: false,
        is_winner: false,
        disqualified,
        disqualification_reason,
        calculated_at: now,
    }
}

/// Rank by final score descending; ties break to the lower mean execution
/// time, then to the earlier submission time. Winner and baseline flags are
/// set here.
fn rank(results: &mut [(TournamentResult, DateTime<Utc>)], baseline_score: f64) {
    results.sort_by(|(a, a_submitted), (b, b_submitted)| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                a.mean_duration_seconds
                    .partial_cmp(&b.mean_duration_seconds)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a_submitted.cmp(b_submitted))
    });

    for (index, (result, _)) in results.iter_mut().enumerate() {
        result.rank = index as u32 + 1;
        result.beat_baseline = result.final_score > baseline_score;
        result.is_winner = index == 0 && result.final_score > 0.0;
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let collected: Vec<f64> = values.collect();
    if collected.is_empty() {
        0.0
    } else {
        collected.iter().sum::<f64>() / collected.len() as f64
    }
}

fn mean_of(runs: &[EvaluationRun], pick: impl Fn(&RunScores) -> f64) -> f64 {
    mean(runs.iter().filter_map(|r| r.scores.as_ref().map(&pick)))
}
