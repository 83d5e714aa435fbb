use crate::error::{DatasetError, Result};
use agora_types::{ParticipantId, TournamentId};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default dataset window label.
pub const DEFAULT_WINDOW: &str = "24h";

pub const TRANSFERS_FILE: &str = "transfers.csv";
pub const ADDRESS_LABELS_FILE: &str = "address_labels.csv";
pub const ASSET_PRICES_FILE: &str = "asset_prices.csv";
pub const ASSETS_FILE: &str = "assets.csv";
pub const GROUND_TRUTH_FILE: &str = "ground_truth.csv";

pub const FEATURES_FILE: &str = "features.csv";
pub const PATTERNS_FILE: &str = "patterns.csv";

/// Artifacts staged into a run's input directory. Ground truth is validator
/// state and never crosses the sandbox boundary.
const STAGED_ARTIFACTS: [&str; 4] = [
    TRANSFERS_FILE,
    ADDRESS_LABELS_FILE,
    ASSET_PRICES_FILE,
    ASSETS_FILE,
];

/// Resolves dataset directories under a fixed root. The engine never writes
/// below this root.
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
    window: String,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            window: DEFAULT_WINDOW.to_string(),
        }
    }

    pub fn with_window(root: impl Into<PathBuf>, window: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            window: window.into(),
        }
    }

    /// `{root}/{network}/{YYYY-MM-DD}/{window}`
    pub fn dataset_dir(&self, network: &str, test_date: NaiveDate) -> PathBuf {
        self.root
            .join(network)
            .join(test_date.format("%Y-%m-%d").to_string())
            .join(&self.window)
    }

    /// Resolve the dataset directory, erroring when it does not exist.
    pub fn resolve(&self, network: &str, test_date: NaiveDate) -> Result<PathBuf> {
        let dir = self.dataset_dir(network, test_date);
        if !dir.is_dir() {
            return Err(DatasetError::NotFound(dir));
        }
        Ok(dir)
    }

    pub fn transfers_path(&self, dataset_dir: &Path) -> PathBuf {
        dataset_dir.join(TRANSFERS_FILE)
    }

    pub fn ground_truth_path(&self, dataset_dir: &Path) -> PathBuf {
        dataset_dir.join(GROUND_TRUTH_FILE)
    }

    /// Copy the payload-visible artifacts into `input_dir`, which is created
    /// if needed. Ground truth is deliberately excluded.
    pub fn stage_run_input(&self, dataset_dir: &Path, input_dir: &Path) -> Result<()> {
        fs::create_dir_all(input_dir)?;
        for name in STAGED_ARTIFACTS {
            let src = dataset_dir.join(name);
            if !src.is_file() {
                return Err(DatasetError::ArtifactMissing(src));
            }
            fs::copy(&src, input_dir.join(name))?;
        }
        debug!(
            dataset = %dataset_dir.display(),
            input = %input_dir.display(),
            "staged run input"
        );
        Ok(())
    }
}

/// Per-run input and output directories.
#[derive(Debug, Clone)]
pub struct RunDirs {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Writable working area: `{work_root}/{tournament}/{epoch}/{participant}/`.
#[derive(Debug, Clone)]
pub struct WorkLayout {
    root: PathBuf,
}

impl WorkLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn run_dir(
        &self,
        tournament: &TournamentId,
        epoch_index: u64,
        participant: &ParticipantId,
    ) -> PathBuf {
        self.root
            .join(tournament.to_hex())
            .join(epoch_index.to_string())
            .join(participant.as_str())
    }

    /// Create a fresh `input/` + `output/` pair for a run. The output
    /// directory starts empty per the sandbox I/O contract, so any leftover
    /// directory from an interrupted attempt is removed first.
    pub fn prepare_run_dirs(
        &self,
        tournament: &TournamentId,
        epoch_index: u64,
        participant: &ParticipantId,
    ) -> Result<RunDirs> {
        let base = self.run_dir(tournament, epoch_index, participant);
        if base.exists() {
            fs::remove_dir_all(&base)?;
        }
        let input = base.join("input");
        let output = base.join("output");
        fs::create_dir_all(&input)?;
        fs::create_dir_all(&output)?;
        Ok(RunDirs { input, output })
    }

    pub fn cleanup_run(
        &self,
        tournament: &TournamentId,
        epoch_index: u64,
        participant: &ParticipantId,
    ) -> Result<()> {
        let base = self.run_dir(tournament, epoch_index, participant);
        if base.exists() {
            fs::remove_dir_all(&base)?;
        }
        Ok(())
    }
}
