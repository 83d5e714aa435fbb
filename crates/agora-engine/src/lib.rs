/*!
# Agora Engine

The control core of the validator: a single logical supervisor that drives
each tournament through collecting, testing, and evaluating, sequences the
sandboxed evaluations, aggregates runs into the final ranking, and emits the
weight vector to the incentive layer.

The phase machine is queue-driven: every transition enqueues the next durable
job, and long waits (submission window, inter-epoch gaps) are scheduled jobs
rather than in-process sleeps, so a restarted engine resumes mid-tournament
from the last persisted state. Job bodies are idempotent — content-derived
job ids and `(submission_id, epoch_number)` run keys make redelivery safe.

Within a tournament, evaluations are strictly sequential by contract: it
equalizes resource contention so timing measurements stay comparable.
*/

pub mod aggregate;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod scheduler;
pub mod weights;
pub mod worker;

pub use error::EngineError;
pub use orchestrator::Orchestrator;
pub use scheduler::DailyScheduler;
pub use weights::{normalize_weights, LogWeightSink, WeightSink};
pub use worker::Worker;
