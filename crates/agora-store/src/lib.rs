/*!
# Agora Store

Persistent, transactional state for tournaments: the four entity tables
(tournaments, submissions, evaluation runs, tournament results) plus the
durable job queue that drives the orchestrator.

Layering follows the storage crate of the teacher stack: a `StoreBackend`
trait with an in-memory backend for tests/dev and a RocksDB backend behind
the `rocksdb` feature, wrapped by `TournamentStore`, which owns every
invariant the spec pins to the store layer:

- epoch numbers are unique across tournaments;
- at most one tournament is in a non-terminal status;
- status transitions follow the lifecycle graphs;
- `(submission_id, epoch_number)` identifies at most one run;
- `(tournament_id, participant_id)` identifies at most one result;
- ranking writes commit atomically, all-or-nothing.
*/

pub mod backend;
pub mod error;
pub mod memory;
pub mod queue;
#[cfg(feature = "rocksdb")]
pub mod rocks;
pub mod store;

pub use backend::{StoreBackend, StoreStats};
pub use error::StoreError;
pub use memory::MemoryBackend;
pub use queue::{Job, JobId, JobKind, JobQueue, JobStatus};
#[cfg(feature = "rocksdb")]
pub use rocks::RocksBackend;
pub use store::TournamentStore;
