use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScoringError>;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("output artifact missing: {0}")]
    ArtifactMissing(PathBuf),

    #[error("csv error reading {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
