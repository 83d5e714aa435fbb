use agora_types::TournamentConfig;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Full node configuration: the tournament options plus node-local wiring.
/// Loaded from TOML, then overridden by `AGORA_*` environment variables;
/// unknown keys are rejected, invalid values are fatal at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    #[serde(default)]
    pub tournament: TournamentConfig,
    #[serde(default)]
    pub node: NodeSettings,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSettings {
    /// Root of the read-only dataset tree.
    pub data_root: PathBuf,
    /// Writable working area for run inputs/outputs and build workspaces.
    pub work_root: PathBuf,
    /// "memory" or "rocksdb".
    pub store_backend: String,
    pub store_path: PathBuf,
    pub docker_bin: String,
    pub collect_poll_seconds: u64,
    pub build_timeout_seconds: u64,
    /// Optional dev adapter: peers and claims read from a JSON file in
    /// place of the external submission protocol.
    #[serde(default)]
    pub peers_file: Option<PathBuf>,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("./data/datasets"),
            work_root: PathBuf::from("./data/work"),
            store_backend: "memory".to_string(),
            store_path: PathBuf::from("./data/store"),
            docker_bin: "docker".to_string(),
            collect_poll_seconds: 30,
            build_timeout_seconds: 600,
            peers_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            tournament: TournamentConfig::default(),
            node: NodeSettings::default(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load from an optional TOML file, apply environment overrides, and
    /// validate. Any problem here refuses startup.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => Self::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.tournament
            .validate()
            .context("invalid tournament configuration")?;
        match self.node.store_backend.as_str() {
            "memory" | "rocksdb" => {}
            other => bail!("unknown store backend '{other}' (expected memory or rocksdb)"),
        }
        if self.node.collect_poll_seconds < 1 {
            bail!("collect_poll_seconds must be >= 1");
        }
        if self.node.build_timeout_seconds < 1 {
            bail!("build_timeout_seconds must be >= 1");
        }
        Ok(())
    }

    /// Every tournament option is environment-settable with the `AGORA_`
    /// prefix; node wiring options too.
    fn apply_env_overrides(&mut self) -> Result<()> {
        fn set<T: std::str::FromStr>(target: &mut T, key: &str) -> Result<()>
        where
            T::Err: std::fmt::Display,
        {
            if let Ok(raw) = env::var(key) {
                *target = raw
                    .parse()
                    .map_err(|e| anyhow::anyhow!("invalid {key}={raw}: {e}"))?;
            }
            Ok(())
        }

        let t = &mut self.tournament;
        set(&mut t.submission_duration_seconds, "AGORA_SUBMISSION_DURATION_SECONDS")?;
        set(&mut t.epoch_count, "AGORA_EPOCH_COUNT")?;
        set(&mut t.epoch_duration_seconds, "AGORA_EPOCH_DURATION_SECONDS")?;
        set(&mut t.feature_time_cap_seconds, "AGORA_FEATURE_TIME_CAP_SECONDS")?;
        set(&mut t.pattern_time_cap_seconds, "AGORA_PATTERN_TIME_CAP_SECONDS")?;
        set(
            &mut t.baseline_feature_time_seconds,
            "AGORA_BASELINE_FEATURE_TIME_SECONDS",
        )?;
        set(
            &mut t.baseline_pattern_time_seconds,
            "AGORA_BASELINE_PATTERN_TIME_SECONDS",
        )?;
        set(&mut t.memory_limit_bytes, "AGORA_MEMORY_LIMIT_BYTES")?;
        set(&mut t.cpu_cores, "AGORA_CPU_CORES")?;
        set(&mut t.process_limit, "AGORA_PROCESS_LIMIT")?;
        set(&mut t.run_timeout_seconds, "AGORA_RUN_TIMEOUT_SECONDS")?;
        set(&mut t.baseline_score, "AGORA_BASELINE_SCORE")?;

        if let Ok(raw) = env::var("AGORA_NETWORKS") {
            t.networks = raw
                .split(',')
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
        }
        if let Ok(raw) = env::var("AGORA_SCHEDULE_MODE") {
            t.schedule_mode = match raw.as_str() {
                "manual" => agora_types::ScheduleMode::Manual,
                "daily" => agora_types::ScheduleMode::Daily,
                other => bail!("invalid AGORA_SCHEDULE_MODE={other}"),
            };
        }
        if let Ok(raw) = env::var("AGORA_PIN_TEST_DATE") {
            t.pin_test_date = Some(
                raw.parse()
                    .map_err(|e| anyhow::anyhow!("invalid AGORA_PIN_TEST_DATE={raw}: {e}"))?,
            );
        }

        let n = &mut self.node;
        if let Ok(raw) = env::var("AGORA_DATA_ROOT") {
            n.data_root = PathBuf::from(raw);
        }
        if let Ok(raw) = env::var("AGORA_WORK_ROOT") {
            n.work_root = PathBuf::from(raw);
        }
        if let Ok(raw) = env::var("AGORA_STORE_BACKEND") {
            n.store_backend = raw;
        }
        if let Ok(raw) = env::var("AGORA_STORE_PATH") {
            n.store_path = PathBuf::from(raw);
        }
        set(&mut n.collect_poll_seconds, "AGORA_COLLECT_POLL_SECONDS")?;
        set(&mut n.build_timeout_seconds, "AGORA_BUILD_TIMEOUT_SECONDS")?;

        set(&mut self.api.port, "AGORA_API_PORT")?;
        if let Ok(raw) = env::var("AGORA_LOG_LEVEL") {
            self.logging.level = raw;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        NodeConfig::default().validate().unwrap();
    }

    #[test]
    fn test_load_from_toml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("agora.toml");
        std::fs::write(
            &path,
            r#"
            [tournament]
            submission_duration_seconds = 60
            epoch_count = 3
            epoch_duration_seconds = 120
            networks = ["torus", "bittensor"]
            schedule_mode = "daily"
            feature_time_cap_seconds = 300.0
            pattern_time_cap_seconds = 600.0
            baseline_feature_time_seconds = 30.0
            baseline_pattern_time_seconds = 120.0
            memory_limit_bytes = 1073741824
            cpu_cores = 2.0
            process_limit = 128
            run_timeout_seconds = 600
            baseline_score = 0.4

            [node]
            data_root = "/srv/datasets"
            work_root = "/srv/work"
            store_backend = "memory"
            store_path = "/srv/store"
            docker_bin = "docker"
            collect_poll_seconds = 15
            build_timeout_seconds = 300
            "#,
        )
        .unwrap();

        let config = NodeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.tournament.epoch_count, 3);
        assert_eq!(config.tournament.networks.len(), 2);
        assert_eq!(
            config.tournament.schedule_mode,
            agora_types::ScheduleMode::Daily
        );
        assert_eq!(config.node.collect_poll_seconds, 15);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("agora.toml");
        std::fs::write(&path, "[node]\nmystery_knob = 1\n").unwrap();
        assert!(NodeConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_invalid_values_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("agora.toml");
        std::fs::write(
            &path,
            "[tournament]\nsubmission_duration_seconds = 0\nepoch_count = 1\nepoch_duration_seconds = 1\nnetworks = [\"torus\"]\nfeature_time_cap_seconds = 300.0\npattern_time_cap_seconds = 600.0\nbaseline_feature_time_seconds = 30.0\nbaseline_pattern_time_seconds = 120.0\nmemory_limit_bytes = 1\ncpu_cores = 1.0\nprocess_limit = 1\nrun_timeout_seconds = 1\nbaseline_score = 0.5\n",
        )
        .unwrap();
        assert!(NodeConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut config = NodeConfig::default();
        config.node.store_backend = "postgres".to_string();
        assert!(config.validate().is_err());
    }
}
