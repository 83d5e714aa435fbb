/*!
# Agora Scoring

The scoring pipeline for one evaluation run, in three stages:

1. **Output validation** (`validator`): parse the two artifacts the payload
   must produce and apply the feature-schema hard gate.
2. **Flow verification** (`flow`): trace every claimed pattern path against
   the dataset's transfer table. This is the anti-cheat backbone: because
   every hop is checked against a table the validator controls, fabricated
   patterns are detectable no matter how plausible they look.
3. **Scoring** (`scorer`): classify patterns against ground truth, compute
   the five weighted sub-scores, and apply the three-gate final cascade.

All score arithmetic is IEEE-754 double; pattern counts are exact integers.
Scoring is deterministic: identical inputs produce bit-identical scores.
*/

pub mod artifacts;
pub mod error;
pub mod flow;
pub mod schema;
pub mod scorer;
pub mod validator;

pub use artifacts::{PayloadTimings, ReportedPattern};
pub use error::ScoringError;
pub use flow::FlowVerifier;
pub use schema::{ColumnKind, FeatureSchema, PatternType};
pub use scorer::{MeasuredTimes, ScoreParams, Scorer};
pub use validator::{OutputValidator, ValidationOutcome};
