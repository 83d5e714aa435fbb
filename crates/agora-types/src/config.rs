use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be >= 1, got {value}")]
    OutOfRange { field: &'static str, value: i64 },

    #[error("networks must contain at least one label")]
    NoNetworks,

    #[error("network label may not be empty")]
    EmptyNetwork,

    #[error("baseline_score must be within [0, 1], got {0}")]
    BaselineOutOfRange(f64),

    #[error("{field} must be a positive duration, got {value}")]
    NonPositiveDuration { field: &'static str, value: f64 },
}

/// How tournament starts are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    /// Tournaments start only on the administrative trigger.
    Manual,
    /// A new tournament starts at 00:00 UTC each day with the next epoch
    /// number, unless one is already live.
    Daily,
}

impl Default for ScheduleMode {
    fn default() -> Self {
        Self::Manual
    }
}

/// Tournament configuration record. A snapshot is persisted with each
/// tournament, so mid-flight config changes never affect a live cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TournamentConfig {
    /// Length of the submission-collection window.
    pub submission_duration_seconds: u64,
    /// Number of testing epochs.
    pub epoch_count: u64,
    /// Wall-clock budget per epoch.
    pub epoch_duration_seconds: u64,
    /// Per-epoch dataset selector; the last entry repeats when
    /// `epoch_count` exceeds its length.
    pub networks: Vec<String>,
    #[serde(default)]
    pub schedule_mode: ScheduleMode,

    /// Measured feature time at or beyond this cap forces a zero
    /// feature-performance sub-score.
    pub feature_time_cap_seconds: f64,
    pub pattern_time_cap_seconds: f64,
    /// Reference times the performance sub-scores are measured against.
    pub baseline_feature_time_seconds: f64,
    pub baseline_pattern_time_seconds: f64,

    /// Sandbox limits, enforced by the host.
    pub memory_limit_bytes: u64,
    pub cpu_cores: f64,
    pub process_limit: u32,
    /// Container wall-clock timeout per run.
    pub run_timeout_seconds: u64,

    /// Final scores above this mark `beat_baseline`.
    pub baseline_score: f64,

    /// Pin every epoch to a fixed dataset date instead of
    /// `started_at.date + epoch_index` days. Dev deployments use this for
    /// reproducibility.
    #[serde(default)]
    pub pin_test_date: Option<NaiveDate>,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            submission_duration_seconds: 3600,
            epoch_count: 5,
            epoch_duration_seconds: 7200,
            networks: vec!["torus".to_string()],
            schedule_mode: ScheduleMode::Manual,
            feature_time_cap_seconds: 300.0,
            pattern_time_cap_seconds: 600.0,
            baseline_feature_time_seconds: 30.0,
            baseline_pattern_time_seconds: 120.0,
            memory_limit_bytes: 8 * 1024 * 1024 * 1024,
            cpu_cores: 2.0,
            process_limit: 256,
            run_timeout_seconds: 900,
            baseline_score: 0.5,
            pin_test_date: None,
        }
    }
}

impl TournamentConfig {
    /// Validate every option. Invalid configuration is fatal: the engine
    /// refuses to start a tournament with it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn at_least_one(field: &'static str, value: u64) -> Result<(), ConfigError> {
            if value < 1 {
                return Err(ConfigError::OutOfRange {
                    field,
                    value: value as i64,
                });
            }
            Ok(())
        }

        at_least_one("submission_duration_seconds", self.submission_duration_seconds)?;
        at_least_one("epoch_count", self.epoch_count)?;
        at_least_one("epoch_duration_seconds", self.epoch_duration_seconds)?;
        at_least_one("run_timeout_seconds", self.run_timeout_seconds)?;
        at_least_one("memory_limit_bytes", self.memory_limit_bytes)?;
        at_least_one("process_limit", self.process_limit as u64)?;

        if self.networks.is_empty() {
            return Err(ConfigError::NoNetworks);
        }
        if self.networks.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::EmptyNetwork);
        }

        for (field, value) in [
            ("feature_time_cap_seconds", self.feature_time_cap_seconds),
            ("pattern_time_cap_seconds", self.pattern_time_cap_seconds),
            (
                "baseline_feature_time_seconds",
                self.baseline_feature_time_seconds,
            ),
            (
                "baseline_pattern_time_seconds",
                self.baseline_pattern_time_seconds,
            ),
            ("cpu_cores", self.cpu_cores),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositiveDuration { field, value });
            }
        }

        if !(0.0..=1.0).contains(&self.baseline_score) {
            return Err(ConfigError::BaselineOutOfRange(self.baseline_score));
        }

        Ok(())
    }

    /// Dataset network for an epoch index; the last entry repeats for
    /// overflow epochs.
    pub fn network_for_epoch(&self, epoch_index: u64) -> &str {
        let idx = (epoch_index as usize).min(self.networks.len() - 1);
        &self.networks[idx]
    }

    /// Dataset date for an epoch index: tournament start date plus the epoch
    /// offset, unless pinned.
    pub fn test_date_for_epoch(&self, started: NaiveDate, epoch_index: u64) -> NaiveDate {
        match self.pin_test_date {
            Some(pinned) => pinned,
            None => started + chrono::Days::new(epoch_index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        TournamentConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_zero_durations() {
        let mut config = TournamentConfig::default();
        config.epoch_count = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "epoch_count", .. })
        ));

        let mut config = TournamentConfig::default();
        config.submission_duration_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_networks() {
        let mut config = TournamentConfig::default();
        config.networks = vec![];
        assert!(matches!(config.validate(), Err(ConfigError::NoNetworks)));

        config.networks = vec!["torus".into(), "  ".into()];
        assert!(matches!(config.validate(), Err(ConfigError::EmptyNetwork)));
    }

    #[test]
    fn test_rejects_baseline_out_of_range() {
        let mut config = TournamentConfig::default();
        config.baseline_score = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BaselineOutOfRange(_))
        ));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let value = serde_json::json!({
            "submission_duration_seconds": 60,
            "epoch_count": 3,
            "epoch_duration_seconds": 120,
            "networks": ["torus"],
            "feature_time_cap_seconds": 300.0,
            "pattern_time_cap_seconds": 600.0,
            "baseline_feature_time_seconds": 30.0,
            "baseline_pattern_time_seconds": 120.0,
            "memory_limit_bytes": 1024,
            "cpu_cores": 1.0,
            "process_limit": 64,
            "run_timeout_seconds": 300,
            "baseline_score": 0.5,
            "mystery_knob": 9,
        });
        let parsed: Result<TournamentConfig, _> = serde_json::from_value(value);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_network_selection_repeats_last() {
        let mut config = TournamentConfig::default();
        config.networks = vec!["a".into(), "b".into(), "c".into()];
        config.epoch_count = 5;

        let picked: Vec<&str> = (0..5).map(|e| config.network_for_epoch(e)).collect();
        assert_eq!(picked, vec!["a", "b", "c", "c", "c"]);
    }

    #[test]
    fn test_test_date_offsets_from_start() {
        let config = TournamentConfig::default();
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(
            config.test_date_for_epoch(start, 0),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
        );
        assert_eq!(
            config.test_date_for_epoch(start, 3),
            NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()
        );
    }

    #[test]
    fn test_pinned_test_date_wins() {
        let mut config = TournamentConfig::default();
        let pinned = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        config.pin_test_date = Some(pinned);
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(config.test_date_for_epoch(start, 4), pinned);
    }
}
