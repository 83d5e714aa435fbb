/*!
# Agora Types

Core entity types for the Agora validator-side tournament engine.

A tournament is one complete evaluation cycle: submissions are collected from
participants, built into container images, executed against known-answer
datasets across a series of epochs, scored, and aggregated into a final
ranking that feeds the external incentive layer.

## Module Structure

- **id**: Content-derived 32-byte identifiers
- **status**: Lifecycle enums and the transition graphs enforced by the store
- **entities**: Persistent records (Tournament, Submission, EvaluationRun, TournamentResult)
- **config**: The tournament configuration record and its validation
*/

pub mod config;
pub mod entities;
pub mod id;
pub mod status;

pub use config::{ConfigError, ScheduleMode, TournamentConfig};
pub use entities::{
    EvaluationRun, RunCounts, RunScores, Submission, Tournament, TournamentResult,
};
pub use id::{ParticipantId, RunId, SubmissionId, TournamentId};
pub use status::{LifecycleState, RunStatus, SubmissionStatus, TournamentStatus};
