use crate::backend::{StoreBackend, StoreStats};
use crate::error::{Result, StoreError};
use crate::queue::{Job, JobId};
use agora_types::{
    EvaluationRun, RunId, Submission, SubmissionId, Tournament, TournamentId, TournamentResult,
};
use async_trait::async_trait;
use rocksdb::{Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// RocksDB-backed store. Entities are serde_json values under prefixed keys;
/// the secondary index keys make the by-tournament and by-submission listings
/// prefix scans.
pub struct RocksBackend {
    db: Arc<DB>,
}

impl RocksBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_max_background_jobs(2);

        let db = DB::open(&opts, path)
            .map_err(|e| StoreError::Backend(format!("failed to open RocksDB: {e}")))?;
        info!("🗄️ rocksdb store opened");
        Ok(Self { db: Arc::new(db) })
    }

    fn tournament_key(id: &TournamentId) -> Vec<u8> {
        format!("trn:{id}").into_bytes()
    }

    fn epoch_index_key(epoch_number: u64) -> Vec<u8> {
        format!("trn_epoch:{epoch_number:020}").into_bytes()
    }

    fn submission_key(id: &SubmissionId) -> Vec<u8> {
        format!("sub:{id}").into_bytes()
    }

    fn submission_index_key(tournament: &TournamentId, id: &SubmissionId) -> Vec<u8> {
        format!("sub_by_trn:{tournament}:{id}").into_bytes()
    }

    fn run_key(id: &RunId) -> Vec<u8> {
        format!("run:{id}").into_bytes()
    }

    fn run_index_key(submission: &SubmissionId, id: &RunId) -> Vec<u8> {
        format!("run_by_sub:{submission}:{id}").into_bytes()
    }

    fn result_key(tournament: &TournamentId, participant: &str) -> Vec<u8> {
        format!("res:{tournament}:{participant}").into_bytes()
    }

    fn job_key(id: &JobId) -> Vec<u8> {
        format!("job:{id}").into_bytes()
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self
            .db
            .get(key)
            .map_err(|e| StoreError::Backend(e.to_string()))?
        {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: serde::Serialize>(&self, key: &[u8], value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.db
            .put(key, bytes)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self
            .db
            .get(key)
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .is_some())
    }

    fn scan_prefix<T: serde::de::DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        let mut found = Vec::new();
        for entry in self.db.prefix_iterator(prefix.as_bytes()) {
            let (key, value) = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            found.push(serde_json::from_slice(&value)?);
        }
        Ok(found)
    }

    /// Resolve secondary-index values (primary keys stored as the value) and
    /// fetch each referenced entity.
    fn scan_index(&self, prefix: &str) -> Result<Vec<Vec<u8>>> {
        let mut keys = Vec::new();
        for entry in self.db.prefix_iterator(prefix.as_bytes()) {
            let (key, value) = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            keys.push(value.to_vec());
        }
        Ok(keys)
    }

    fn count_prefix(&self, prefix: &str) -> Result<usize> {
        let mut count = 0;
        for entry in self.db.prefix_iterator(prefix.as_bytes()) {
            let (key, _) = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait]
impl StoreBackend for RocksBackend {
    async fn put_tournament(&self, tournament: &Tournament) -> Result<()> {
        let key = Self::tournament_key(&tournament.id);
        if self.exists(&key)? {
            return Err(StoreError::AlreadyExists(format!(
                "tournament {}",
                tournament.id
            )));
        }
        let mut batch = WriteBatch::default();
        batch.put(&key, serde_json::to_vec(tournament)?);
        batch.put(
            Self::epoch_index_key(tournament.epoch_number),
            Self::tournament_key(&tournament.id),
        );
        self.db
            .write(batch)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn update_tournament(&self, tournament: &Tournament) -> Result<()> {
        let key = Self::tournament_key(&tournament.id);
        if !self.exists(&key)? {
            return Err(StoreError::NotFound(format!("tournament {}", tournament.id)));
        }
        self.put_json(&key, tournament)
    }

    async fn get_tournament(&self, id: &TournamentId) -> Result<Option<Tournament>> {
        self.get_json(&Self::tournament_key(id))
    }

    async fn get_tournament_by_epoch(&self, epoch_number: u64) -> Result<Option<Tournament>> {
        match self
            .db
            .get(Self::epoch_index_key(epoch_number))
            .map_err(|e| StoreError::Backend(e.to_string()))?
        {
            Some(primary) => self.get_json(&primary),
            None => Ok(None),
        }
    }

    async fn list_tournaments(&self) -> Result<Vec<Tournament>> {
        let mut all: Vec<Tournament> = self.scan_prefix("trn:")?;
        all.sort_by_key(|t| t.epoch_number);
        Ok(all)
    }

    async fn put_submission(&self, submission: &Submission) -> Result<()> {
        let key = Self::submission_key(&submission.id);
        if self.exists(&key)? {
            return Err(StoreError::AlreadyExists(format!(
                "submission {}",
                submission.id
            )));
        }
        let mut batch = WriteBatch::default();
        batch.put(&key, serde_json::to_vec(submission)?);
        batch.put(
            Self::submission_index_key(&submission.tournament_id, &submission.id),
            &key,
        );
        self.db
            .write(batch)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn update_submission(&self, submission: &Submission) -> Result<()> {
        let key = Self::submission_key(&submission.id);
        if !self.exists(&key)? {
            return Err(StoreError::NotFound(format!("submission {}", submission.id)));
        }
        self.put_json(&key, submission)
    }

    async fn get_submission(&self, id: &SubmissionId) -> Result<Option<Submission>> {
        self.get_json(&Self::submission_key(id))
    }

    async fn list_submissions(&self, tournament: &TournamentId) -> Result<Vec<Submission>> {
        let mut found = Vec::new();
        for primary in self.scan_index(&format!("sub_by_trn:{tournament}:"))? {
            if let Some(submission) = self.get_json::<Submission>(&primary)? {
                found.push(submission);
            }
        }
        found.sort_by_key(|s| s.id);
        Ok(found)
    }

    async fn put_run(&self, run: &EvaluationRun) -> Result<()> {
        let key = Self::run_key(&run.id);
        if self.exists(&key)? {
            return Err(StoreError::AlreadyExists(format!("run {}", run.id)));
        }
        let mut batch = WriteBatch::default();
        batch.put(&key, serde_json::to_vec(run)?);
        batch.put(Self::run_index_key(&run.submission_id, &run.id), &key);
        self.db
            .write(batch)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn update_run(&self, run: &EvaluationRun) -> Result<()> {
        let key = Self::run_key(&run.id);
        if !self.exists(&key)? {
            return Err(StoreError::NotFound(format!("run {}", run.id)));
        }
        self.put_json(&key, run)
    }

    async fn get_run(&self, id: &RunId) -> Result<Option<EvaluationRun>> {
        self.get_json(&Self::run_key(id))
    }

    async fn list_runs_by_submission(
        &self,
        submission: &SubmissionId,
    ) -> Result<Vec<EvaluationRun>> {
        let mut found = Vec::new();
        for primary in self.scan_index(&format!("run_by_sub:{submission}:"))? {
            if let Some(run) = self.get_json::<EvaluationRun>(&primary)? {
                found.push(run);
            }
        }
        found.sort_by_key(|r| r.epoch_number);
        Ok(found)
    }

    async fn put_results(
        &self,
        tournament: &TournamentId,
        results: &[TournamentResult],
    ) -> Result<()> {
        // One WriteBatch: the ranking replacement is all-or-nothing.
        let mut batch = WriteBatch::default();
        let prefix = format!("res:{tournament}:");
        for entry in self.db.prefix_iterator(prefix.as_bytes()) {
            let (key, _) = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            batch.delete(key);
        }
        for result in results {
            batch.put(
                Self::result_key(tournament, result.participant_id.as_str()),
                serde_json::to_vec(result)?,
            );
        }
        self.db
            .write(batch)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn list_results(&self, tournament: &TournamentId) -> Result<Vec<TournamentResult>> {
        let mut found: Vec<TournamentResult> = self.scan_prefix(&format!("res:{tournament}:"))?;
        found.sort_by_key(|r| r.rank);
        Ok(found)
    }

    async fn put_job(&self, job: &Job) -> Result<()> {
        let key = Self::job_key(&job.id);
        if self.exists(&key)? {
            return Err(StoreError::AlreadyExists(format!("job {}", job.id)));
        }
        self.put_json(&key, job)
    }

    async fn update_job(&self, job: &Job) -> Result<()> {
        let key = Self::job_key(&job.id);
        if !self.exists(&key)? {
            return Err(StoreError::job_not_found(&job.id));
        }
        self.put_json(&key, job)
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>> {
        self.get_json(&Self::job_key(id))
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.scan_prefix("job:")
    }

    async fn delete_job(&self, id: &JobId) -> Result<()> {
        self.db
            .delete(Self::job_key(id))
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            tournament_count: self.count_prefix("trn:")?,
            submission_count: self.count_prefix("sub:")?,
            run_count: self.count_prefix("run:")?,
            result_count: self.count_prefix("res:")?,
            job_count: self.count_prefix("job:")?,
        })
    }
}
