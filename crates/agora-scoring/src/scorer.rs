use crate::artifacts::ReportedPattern;
use crate::flow::FlowVerifier;
use agora_dataset::GroundTruth;
use agora_types::{RunCounts, RunScores};
use std::collections::HashSet;
use tracing::info;

/// Final-score weights over the five sub-scores.
const WEIGHT_FEATURE_PERFORMANCE: f64 = 0.10;
const WEIGHT_SYNTHETIC_RECALL: f64 = 0.30;
const WEIGHT_PATTERN_PRECISION: f64 = 0.25;
const WEIGHT_NOVELTY_DISCOVERY: f64 = 0.25;
const WEIGHT_PATTERN_PERFORMANCE: f64 = 0.10;

/// Novelty credit is capped at this fraction of the synthetic count.
const NOVELTY_CAP_RATIO: f64 = 0.5;

/// Scoring parameters taken from the tournament configuration snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ScoreParams {
    pub baseline_feature_time_seconds: f64,
    pub baseline_pattern_time_seconds: f64,
    pub feature_time_cap_seconds: f64,
    pub pattern_time_cap_seconds: f64,
}

/// Per-run timing measurements fed into the performance sub-scores.
#[derive(Debug, Clone, Copy)]
pub struct MeasuredTimes {
    pub feature_seconds: f64,
    pub pattern_seconds: f64,
}

pub struct Scorer {
    params: ScoreParams,
}

impl Scorer {
    pub fn new(params: ScoreParams) -> Self {
        Self { params }
    }

    /// Partition reported patterns by flow verification and ground-truth
    /// identity. Exact integer counts; duplicate pattern ids only count once
    /// toward the valid categories, repeats classify as invalid.
    pub fn classify(
        verifier: &FlowVerifier<'_>,
        patterns: &[ReportedPattern],
        ground_truth: &GroundTruth,
    ) -> RunCounts {
        let mut counts = RunCounts {
            patterns_reported: patterns.len() as u32,
            synthetic_expected: ground_truth.expected_count(),
            ..Default::default()
        };

        let mut seen_ids: HashSet<&str> = HashSet::new();
        for pattern in patterns {
            if !verifier.flows_exist(pattern) {
                counts.novelty_invalid += 1;
                continue;
            }
            if !seen_ids.insert(&pattern.pattern_id) {
                counts.novelty_invalid += 1;
                continue;
            }
            if ground_truth.contains(&pattern.pattern_id) {
                counts.synthetic_found += 1;
            } else {
                counts.novelty_valid += 1;
            }
        }

        debug_assert!(counts.synthetic_found <= counts.synthetic_expected);
        debug_assert_eq!(
            counts.patterns_reported,
            counts.synthetic_found + counts.novelty_valid + counts.novelty_invalid
        );
        counts
    }

    /// `clip(r/(1+r), 0, 1)` with `r = baseline / measured`; zero at or past
    /// the hard cap, full marks for instantaneous work.
    fn performance_score(measured: f64, baseline: f64, cap: f64) -> f64 {
        if measured >= cap {
            return 0.0;
        }
        if measured <= 0.0 {
            return 1.0;
        }
        let ratio = baseline / measured;
        (ratio / (1.0 + ratio)).clamp(0.0, 1.0)
    }

    fn synthetic_recall(counts: &RunCounts) -> f64 {
        if counts.synthetic_expected == 0 {
            return 1.0;
        }
        counts.synthetic_found as f64 / counts.synthetic_expected as f64
    }

    fn pattern_precision(counts: &RunCounts) -> f64 {
        if counts.patterns_reported == 0 {
            return 0.0;
        }
        (counts.synthetic_found + counts.novelty_valid) as f64 / counts.patterns_reported as f64
    }

    fn novelty_discovery(counts: &RunCounts) -> f64 {
        let cap = (counts.synthetic_expected as f64 * NOVELTY_CAP_RATIO).floor();
        if cap == 0.0 {
            return 0.0;
        }
        (counts.novelty_valid as f64).min(cap) / cap
    }

    /// Compute the five sub-scores and the gated final score.
    ///
    /// Gate cascade: invalid features score zero outright; a run with no
    /// valid patterns at all earns only the feature-performance sliver;
    /// otherwise the weighted sum applies. Output is clamped to [0, 1] and
    /// deterministic for identical inputs.
    pub fn score(&self, features_valid: bool, counts: &RunCounts, times: &MeasuredTimes) -> RunScores {
        if !features_valid {
            return RunScores::default();
        }

        let feature_performance = Self::performance_score(
            times.feature_seconds,
            self.params.baseline_feature_time_seconds,
            self.params.feature_time_cap_seconds,
        );
        let pattern_performance = Self::performance_score(
            times.pattern_seconds,
            self.params.baseline_pattern_time_seconds,
            self.params.pattern_time_cap_seconds,
        );
        let synthetic_recall = Self::synthetic_recall(counts);
        let pattern_precision = Self::pattern_precision(counts);
        let novelty_discovery = Self::novelty_discovery(counts);

        let final_score = if counts.synthetic_found + counts.novelty_valid == 0 {
            WEIGHT_FEATURE_PERFORMANCE * feature_performance
        } else {
            WEIGHT_FEATURE_PERFORMANCE * feature_performance
                + WEIGHT_SYNTHETIC_RECALL * synthetic_recall
                + WEIGHT_PATTERN_PRECISION * pattern_precision
                + WEIGHT_NOVELTY_DISCOVERY * novelty_discovery
                + WEIGHT_PATTERN_PERFORMANCE * pattern_performance
        };

        let scores = RunScores {
            feature_performance,
            synthetic_recall,
            pattern_precision,
            novelty_discovery,
            pattern_performance,
            final_score: final_score.clamp(0.0, 1.0),
        };

        info!(
            synthetic_found = counts.synthetic_found,
            synthetic_expected = counts.synthetic_expected,
            novelty_valid = counts.novelty_valid,
            novelty_invalid = counts.novelty_invalid,
            final_score = scores.final_score,
            "🎯 run scored"
        );
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PatternType;
    use agora_dataset::{GroundTruthRow, TransferIndex, TransferRow};

    fn params() -> ScoreParams {
        ScoreParams {
            baseline_feature_time_seconds: 15.0,
            baseline_pattern_time_seconds: 50.0,
            feature_time_cap_seconds: 300.0,
            pattern_time_cap_seconds: 600.0,
        }
    }

    fn counts(
        patterns_reported: u32,
        synthetic_found: u32,
        synthetic_expected: u32,
        novelty_valid: u32,
        novelty_invalid: u32,
    ) -> RunCounts {
        RunCounts {
            patterns_reported,
            synthetic_found,
            synthetic_expected,
            novelty_valid,
            novelty_invalid,
        }
    }

    /// E=150, found=142, novelty=25, invalid=13, R=180, 12.3s against a
    /// 15.0s feature baseline, 45.2s against a 50.0s pattern baseline.
    #[test]
    fn test_reference_scenario() {
        let scorer = Scorer::new(params());
        let scores = scorer.score(
            true,
            &counts(180, 142, 150, 25, 13),
            &MeasuredTimes {
                feature_seconds: 12.3,
                pattern_seconds: 45.2,
            },
        );

        assert!((scores.feature_performance - 0.549).abs() < 0.001);
        assert!((scores.synthetic_recall - 0.9467).abs() < 0.001);
        assert!((scores.pattern_precision - 0.9278).abs() < 0.001);
        assert!((scores.novelty_discovery - 25.0 / 75.0).abs() < 0.0001);
        assert!((scores.pattern_performance - 0.5252).abs() < 0.001);
        assert!((scores.final_score - 0.707).abs() < 0.001);
    }

    #[test]
    fn test_invalid_features_scores_zero() {
        let scorer = Scorer::new(params());
        let scores = scorer.score(
            false,
            &counts(180, 142, 150, 25, 13),
            &MeasuredTimes {
                feature_seconds: 1.0,
                pattern_seconds: 1.0,
            },
        );
        assert_eq!(scores.final_score, 0.0);
        assert_eq!(scores.synthetic_recall, 0.0);
    }

    #[test]
    fn test_no_valid_patterns_earns_feature_sliver_only() {
        let scorer = Scorer::new(params());
        let scores = scorer.score(
            true,
            &counts(10, 0, 150, 0, 10),
            &MeasuredTimes {
                feature_seconds: 12.3,
                pattern_seconds: 45.2,
            },
        );
        assert!((scores.final_score - 0.10 * scores.feature_performance).abs() < 1e-12);
    }

    #[test]
    fn test_zero_reported_boundaries() {
        let scorer = Scorer::new(params());
        let scores = scorer.score(
            true,
            &counts(0, 0, 150, 0, 0),
            &MeasuredTimes {
                feature_seconds: 10.0,
                pattern_seconds: 10.0,
            },
        );
        assert_eq!(scores.pattern_precision, 0.0);
        assert_eq!(scores.novelty_discovery, 0.0);
        assert!((scores.final_score - 0.10 * scores.feature_performance).abs() < 1e-12);
    }

    #[test]
    fn test_zero_expected_boundaries() {
        let scorer = Scorer::new(params());
        // E = 0: recall defined as 1, novelty cap floor(0 * 0.5) = 0 so
        // discovery is 0.
        let scores = scorer.score(
            true,
            &counts(5, 0, 0, 5, 0),
            &MeasuredTimes {
                feature_seconds: 10.0,
                pattern_seconds: 10.0,
            },
        );
        assert_eq!(scores.synthetic_recall, 1.0);
        assert_eq!(scores.novelty_discovery, 0.0);
        assert_eq!(scores.pattern_precision, 1.0);
    }

    #[test]
    fn test_time_at_cap_zeroes_performance() {
        let scorer = Scorer::new(params());
        let scores = scorer.score(
            true,
            &counts(10, 5, 10, 2, 3),
            &MeasuredTimes {
                feature_seconds: 300.0,
                pattern_seconds: 600.0,
            },
        );
        assert_eq!(scores.feature_performance, 0.0);
        assert_eq!(scores.pattern_performance, 0.0);
    }

    #[test]
    fn test_novelty_capped_at_half_expected() {
        let scorer = Scorer::new(params());
        // 100 valid novelties against E=10: cap is 5, score saturates at 1.
        let scores = scorer.score(
            true,
            &counts(110, 10, 10, 100, 0),
            &MeasuredTimes {
                feature_seconds: 10.0,
                pattern_seconds: 10.0,
            },
        );
        assert_eq!(scores.novelty_discovery, 1.0);
    }

    #[test]
    fn test_score_in_unit_interval_and_deterministic() {
        let scorer = Scorer::new(params());
        let c = counts(180, 142, 150, 25, 13);
        let t = MeasuredTimes {
            feature_seconds: 12.3,
            pattern_seconds: 45.2,
        };
        let a = scorer.score(true, &c, &t);
        let b = scorer.score(true, &c, &t);
        // Bit-identical on identical inputs.
        assert_eq!(a, b);
        assert!((0.0..=1.0).contains(&a.final_score));
    }

    fn reported(id: &str, path: &[&str]) -> ReportedPattern {
        ReportedPattern {
            pattern_id: id.to_string(),
            pattern_type: Some(PatternType::Cycle),
            address_path: path.iter().map(|s| s.to_string()).collect(),
            hop_timestamps: None,
            structurally_valid: true,
        }
    }

    #[test]
    fn test_classification_partitions() {
        let index = TransferIndex::from_rows([
            TransferRow {
                from_address: "a".into(),
                to_address: "b".into(),
                asset: String::new(),
                amount: 0.0,
                block_time: 1,
            },
            TransferRow {
                from_address: "b".into(),
                to_address: "c".into(),
                asset: String::new(),
                amount: 0.0,
                block_time: 2,
            },
        ]);
        let verifier = FlowVerifier::new(&index);
        let ground_truth = GroundTruth::from_rows([GroundTruthRow {
            pattern_id: "gt-1".into(),
            pattern_type: "cycle".into(),
            address: "a".into(),
        }]);

        let patterns = vec![
            reported("gt-1", &["a", "b"]),   // synthetic, flows ok
            reported("nov-1", &["b", "c"]),  // novelty, flows ok
            reported("fake", &["c", "a"]),   // flows missing -> invalid
            reported("nov-1", &["a", "b"]),  // duplicate id -> invalid
        ];

        let counts = Scorer::classify(&verifier, &patterns, &ground_truth);
        assert_eq!(counts.patterns_reported, 4);
        assert_eq!(counts.synthetic_found, 1);
        assert_eq!(counts.synthetic_expected, 1);
        assert_eq!(counts.novelty_valid, 1);
        assert_eq!(counts.novelty_invalid, 2);
        assert_eq!(
            counts.patterns_reported,
            counts.synthetic_found + counts.novelty_valid + counts.novelty_invalid
        );
    }
}
