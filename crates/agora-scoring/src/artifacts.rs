use crate::error::{Result, ScoringError};
use crate::schema::PatternType;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// One pattern row as reported by the payload, after parsing.
/// `structurally_valid` is false when the row violates the declared pattern
/// schema (unknown type, short path, unknown address, inconsistent
/// timestamps); such rows can never verify and classify as invalid.
#[derive(Debug, Clone)]
pub struct ReportedPattern {
    pub pattern_id: String,
    pub pattern_type: Option<PatternType>,
    pub address_path: Vec<String>,
    pub hop_timestamps: Option<Vec<i64>>,
    pub structurally_valid: bool,
}

/// Optional per-phase timings emitted by the payload as `timings.json`.
/// These split the host-measured wall clock into the feature and pattern
/// phases; each claim is clamped to the measured wall time because payload
/// timings are untrusted.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PayloadTimings {
    pub feature_generation_seconds: f64,
    pub pattern_detection_seconds: f64,
}

pub const TIMINGS_FILE: &str = "timings.json";

impl PayloadTimings {
    /// Read `timings.json` from the output directory. A missing or
    /// unreadable file falls back to attributing the whole wall clock to
    /// both phases, the conservative choice for the performance sub-scores.
    pub fn read(output_dir: &Path, wall_seconds: f64) -> Self {
        let fallback = Self {
            feature_generation_seconds: wall_seconds,
            pattern_detection_seconds: wall_seconds,
        };
        let path = output_dir.join(TIMINGS_FILE);
        let Ok(text) = std::fs::read_to_string(&path) else {
            return fallback;
        };
        match serde_json::from_str::<PayloadTimings>(&text) {
            Ok(claimed) => claimed.clamped(wall_seconds),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring malformed timings");
                fallback
            }
        }
    }

    fn clamped(self, wall_seconds: f64) -> Self {
        let clamp = |v: f64| {
            if v.is_finite() && v > 0.0 {
                v.min(wall_seconds)
            } else {
                wall_seconds
            }
        };
        Self {
            feature_generation_seconds: clamp(self.feature_generation_seconds),
            pattern_detection_seconds: clamp(self.pattern_detection_seconds),
        }
    }
}

/// Split a comma-joined list cell. Empty cells yield an empty list.
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn csv_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    if !path.is_file() {
        return Err(ScoringError::ArtifactMissing(path.to_path_buf()));
    }
    csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|source| ScoringError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(split_list(" a , b "), vec!["a", "b"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_timings_fallback_when_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let timings = PayloadTimings::read(tmp.path(), 42.0);
        assert_eq!(timings.feature_generation_seconds, 42.0);
        assert_eq!(timings.pattern_detection_seconds, 42.0);
    }

    #[test]
    fn test_timings_clamped_to_wall_clock() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(TIMINGS_FILE),
            r#"{"feature_generation_seconds": 5.0, "pattern_detection_seconds": 1000.0}"#,
        )
        .unwrap();

        let timings = PayloadTimings::read(tmp.path(), 60.0);
        assert_eq!(timings.feature_generation_seconds, 5.0);
        // Claimed more time than the run took: clamp.
        assert_eq!(timings.pattern_detection_seconds, 60.0);
    }

    #[test]
    fn test_timings_reject_nonsense_values() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(TIMINGS_FILE),
            r#"{"feature_generation_seconds": -3.0, "pattern_detection_seconds": 2.0}"#,
        )
        .unwrap();

        let timings = PayloadTimings::read(tmp.path(), 60.0);
        assert_eq!(timings.feature_generation_seconds, 60.0);
        assert_eq!(timings.pattern_detection_seconds, 2.0);
    }
}
