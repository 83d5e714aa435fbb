use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset directory not found: {0}")]
    NotFound(PathBuf),

    #[error("dataset artifact missing: {0}")]
    ArtifactMissing(PathBuf),

    #[error("malformed row in {path}: {reason}")]
    MalformedRow { path: PathBuf, reason: String },

    #[error("csv error reading {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
