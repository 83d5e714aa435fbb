use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SandboxError>;

#[derive(Debug, Error)]
pub enum SandboxError {
    /// The container could not be started at all: missing image, container
    /// runtime unavailable, or the isolation policy could not be applied.
    /// Distinct from a run that started and failed.
    #[error("sandbox launch failed: {0}")]
    LaunchFailed(String),

    #[error("failed to write seccomp profile to {path}: {source}")]
    PolicyWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input directory not found: {0}")]
    InputMissing(PathBuf),

    #[error("output directory not found: {0}")]
    OutputMissing(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
