use crate::error::{EngineError, Result};
use agora_types::{ParticipantId, TournamentId, TournamentResult};
use async_trait::async_trait;
use tracing::info;

/// Normalize final scores into the emitted weight vector: non-negative
/// weights summing to 1. All-zero scores produce a uniform-zero vector — the
/// incentive layer reads that as "no one earned anything", never as an even
/// split.
pub fn normalize_weights(results: &[TournamentResult]) -> Vec<(ParticipantId, f64)> {
    let total: f64 = results.iter().map(|r| r.final_score.max(0.0)).sum();
    results
        .iter()
        .map(|r| {
            let weight = if total > 0.0 {
                r.final_score.max(0.0) / total
            } else {
                0.0
            };
            (r.participant_id.clone(), weight)
        })
        .collect()
}

/// Boundary to the on-chain weight-setting layer. The engine hands over the
/// final vector; transport and signing live outside the core.
#[async_trait]
pub trait WeightSink: Send + Sync {
    async fn emit(
        &self,
        tournament_id: &TournamentId,
        weights: &[(ParticipantId, f64)],
    ) -> Result<()>;
}

/// Default sink: logs the vector as one structured line. Deployments replace
/// this with the chain adapter.
#[derive(Debug, Default)]
pub struct LogWeightSink;

#[async_trait]
impl WeightSink for LogWeightSink {
    async fn emit(
        &self,
        tournament_id: &TournamentId,
        weights: &[(ParticipantId, f64)],
    ) -> Result<()> {
        let rendered = serde_json::to_string(
            &weights
                .iter()
                .map(|(p, w)| (p.as_str(), *w))
                .collect::<Vec<_>>(),
        )
        .map_err(|e| EngineError::WeightEmission(e.to_string()))?;
        info!(
            tournament_id = %tournament_id,
            participants = weights.len(),
            weights = %rendered,
            "⚖️ weight vector emitted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_types::SubmissionId;
    use chrono::Utc;

    fn result(name: &str, score: f64) -> TournamentResult {
        let tournament = TournamentId::for_epoch(1);
        let participant = ParticipantId::new(name);
        TournamentResult {
            tournament_id: tournament,
            participant_id: participant.clone(),
            submission_id: SubmissionId::for_participant(&tournament, &participant),
            mean_scores: Default::default(),
            mean_duration_seconds: 0.0,
            total_runs: 0,
            total_patterns_reported: 0,
            total_synthetic_found: 0,
            total_novelty_valid: 0,
            total_novelty_invalid: 0,
            final_score: score,
            rank: 0,
            beat_baseline: false,
            is_winner: false,
            disqualified: false,
            disqualification_reason: None,
            calculated_at: Utc::now(),
        }
    }

    #[test]
    fn test_weights_sum_to_one() {
        let weights = normalize_weights(&[result("a", 0.8), result("b", 0.4), result("c", 0.2)]);
        let sum: f64 = weights.iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((weights[0].1 - 0.8 / 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_all_zero_scores_give_zero_vector() {
        let weights = normalize_weights(&[result("a", 0.0), result("b", 0.0)]);
        assert!(weights.iter().all(|(_, w)| *w == 0.0));
    }

    #[test]
    fn test_weights_non_negative() {
        // Scores are clamped upstream, but the vector must stay sane even if
        // a negative sneaks in.
        let weights = normalize_weights(&[result("a", -0.5), result("b", 0.5)]);
        assert!(weights.iter().all(|(_, w)| *w >= 0.0));
        assert_eq!(weights[0].1, 0.0);
        assert_eq!(weights[1].1, 1.0);
    }
}
