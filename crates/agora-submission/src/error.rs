use thiserror::Error;

pub type Result<T> = std::result::Result<T, SubmissionError>;

/// Classified submission failures. Each maps to a one-word error code stored
/// on the submission row; every variant marks the submission failed and the
/// tournament continues.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("peer query failed: {0}")]
    CollectFailed(String),

    #[error("malformed commit hash: {0}")]
    BadCommitHash(String),

    #[error("clone failed: {0}")]
    CloneFailed(String),

    #[error("checkout failed: {0}")]
    CheckoutFailed(String),

    #[error("source scan rejected submission: {0}")]
    ScanRejected(String),

    #[error("image build failed: {0}")]
    BuildFailed(String),

    #[error("image build timed out after {0}s")]
    BuildTimeout(u64),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SubmissionError {
    /// Short stable code persisted with the submission.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CollectFailed(_) => "collect_failed",
            Self::BadCommitHash(_) => "bad_commit_hash",
            Self::CloneFailed(_) => "clone_failed",
            Self::CheckoutFailed(_) => "checkout_failed",
            Self::ScanRejected(_) => "scan_rejected",
            Self::BuildFailed(_) => "build_failed",
            Self::BuildTimeout(_) => "build_timeout",
            Self::Io(_) => "io_error",
        }
    }
}
