/*!
# Agora Submission

Everything between a peer's `(repository_url, commit_hash)` answer and an
addressable, scanned container image.

The peer transport itself is outside the engine; `SubmissionProtocol` is the
seam it plugs into. The build pipeline — shallow fetch at the exact commit,
static source scan, image build, deterministic tag — is the only part of the
engine with network access. Everything downstream runs offline.
*/

pub mod builder;
pub mod error;
pub mod processor;
pub mod protocol;
pub mod scanner;

pub use builder::{GitDockerBuilder, ImageBuilder};
pub use error::SubmissionError;
pub use processor::SubmissionProcessor;
pub use protocol::{SubmissionClaim, SubmissionProtocol};
pub use scanner::{ScanViolation, SourceScanner};
