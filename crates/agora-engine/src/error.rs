use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] agora_store::StoreError),

    #[error("sandbox error: {0}")]
    Sandbox(#[from] agora_sandbox::SandboxError),

    #[error("submission error: {0}")]
    Submission(#[from] agora_submission::SubmissionError),

    #[error("scoring error: {0}")]
    Scoring(#[from] agora_scoring::ScoringError),

    #[error("dataset error: {0}")]
    Dataset(#[from] agora_dataset::DatasetError),

    #[error("configuration invalid: {0}")]
    Config(#[from] agora_types::ConfigError),

    #[error("phase exceeded its wall-clock budget: {0}")]
    PhaseTimeout(String),

    #[error("shutdown requested")]
    Shutdown,

    #[error("weight emission failed: {0}")]
    WeightEmission(String),
}
