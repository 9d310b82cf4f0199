//! Streaming job bookkeeping and result files.
//!
//! Each streaming run is a job identified by a random hex id. Its rows are
//! appended to `<results_dir>/<job_id>.jsonl`, one JSON object per line, and
//! its progress is tracked in the [`JobStore`] for out-of-band polling.
//!
//! Retention: when a job is created, result files and finished progress
//! entries older than the configured retention are removed.

use std::collections::HashMap;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::config::VerifierConfig;
use crate::error::{Error, Result};
use crate::types::Row;

const RESULT_EXTENSION: &str = "jsonl";

/// Lifecycle state of a streaming job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Rows are being validated
    Running,
    /// Every row was validated and written
    Done,
    /// Writing the result file failed
    Failed,
    /// The consumer went away before the end
    Cancelled,
}

/// Progress of one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobProgress {
    /// Rows to validate
    pub total: usize,
    /// Rows validated so far
    pub current: usize,
    /// Last progress message
    pub message: String,
    /// Lifecycle state
    pub status: JobStatus,
    /// Failure detail for failed jobs
    pub error: Option<String>,
    #[serde(skip)]
    updated_at: SystemTime,
}

impl JobProgress {
    fn new(total: usize) -> Self {
        Self {
            total,
            current: 0,
            message: "Starting…".to_string(),
            status: JobStatus::Running,
            error: None,
            updated_at: SystemTime::now(),
        }
    }

    /// Whether the job reached a final state.
    pub fn is_finished(&self) -> bool {
        self.status != JobStatus::Running
    }
}

/// Store of job progress and result files.
#[derive(Debug)]
pub struct JobStore {
    results_dir: PathBuf,
    retention: Duration,
    jobs: Mutex<HashMap<String, JobProgress>>,
}

impl JobStore {
    /// Create a store writing into `results_dir`.
    pub fn new(results_dir: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            results_dir: results_dir.into(),
            retention,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Create a store from the verifier configuration.
    pub fn from_config(config: &VerifierConfig) -> Self {
        Self::new(config.results_dir.clone(), config.job_retention)
    }

    /// Directory holding result files.
    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Register a new job of `total` rows and return its id.
    ///
    /// Expired jobs are evicted first.
    pub fn create(&self, total: usize) -> Result<String> {
        std::fs::create_dir_all(&self.results_dir).map_err(|e| {
            Error::job_file_error(
                "-",
                format!("Failed to create {}: {e}", self.results_dir.display()),
            )
        })?;

        match self.evict_expired() {
            Ok(0) => {}
            Ok(evicted) => tracing::info!(evicted, "evicted expired jobs"),
            Err(e) => tracing::warn!(error = %e, "job eviction failed"),
        }

        let job_id = uuid::Uuid::new_v4().simple().to_string();
        self.jobs.lock().insert(job_id.clone(), JobProgress::new(total));
        Ok(job_id)
    }

    /// Record that `current` rows are done.
    pub fn update(&self, job_id: &str, current: usize, message: impl Into<String>) {
        if let Some(progress) = self.jobs.lock().get_mut(job_id) {
            progress.current = current;
            progress.message = message.into();
            progress.updated_at = SystemTime::now();
        }
    }

    /// Mark the job as done.
    pub fn complete(&self, job_id: &str) {
        self.finish(job_id, JobStatus::Done, None);
    }

    /// Mark the job as failed.
    pub fn fail(&self, job_id: &str, message: impl Into<String>) {
        self.finish(job_id, JobStatus::Failed, Some(message.into()));
    }

    /// Mark the job as cancelled.
    pub fn cancel(&self, job_id: &str) {
        self.finish(job_id, JobStatus::Cancelled, None);
    }

    fn finish(&self, job_id: &str, status: JobStatus, error: Option<String>) {
        if let Some(progress) = self.jobs.lock().get_mut(job_id) {
            progress.status = status;
            progress.error = error;
            progress.updated_at = SystemTime::now();
        }
    }

    /// Current progress of a job, if it is known to this store.
    pub fn progress(&self, job_id: &str) -> Option<JobProgress> {
        self.jobs.lock().get(job_id).cloned()
    }

    /// Number of jobs tracked in memory.
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Check if no job is tracked.
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Path of a job's result file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the id could escape the results
    /// directory.
    pub fn result_path(&self, job_id: &str) -> Result<PathBuf> {
        if !is_valid_job_id(job_id) {
            return Err(Error::invalid_request(format!("Invalid job_id: {job_id:?}")));
        }
        Ok(self
            .results_dir
            .join(format!("{job_id}.{RESULT_EXTENSION}")))
    }

    /// Open a job's result file for the append-only writer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobFileError`] if the file cannot be opened; the job
    /// is marked failed.
    pub async fn open_writer(&self, job_id: &str) -> Result<JobWriter> {
        let path = self.result_path(job_id)?;
        let opened = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await;

        match opened {
            Ok(file) => Ok(JobWriter::new(job_id, file)),
            Err(e) => {
                let message = format!("Failed to open {}: {e}", path.display());
                self.fail(job_id, message.clone());
                Err(Error::job_file_error(job_id, message))
            }
        }
    }

    /// Open a job's result file for sequential reading.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobNotFound`] if no result file exists.
    pub fn open_reader(&self, job_id: &str) -> Result<BufReader<std::fs::File>> {
        let path = self.result_path(job_id)?;
        match std::fs::File::open(&path) {
            Ok(file) => Ok(BufReader::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::job_not_found(job_id))
            }
            Err(e) => Err(Error::job_file_error(
                job_id,
                format!("Failed to open {}: {e}", path.display()),
            )),
        }
    }

    /// Remove result files and finished entries older than the retention.
    ///
    /// Running jobs are never evicted from memory. Returns the number of
    /// result files removed.
    pub fn evict_expired(&self) -> Result<usize> {
        let now = SystemTime::now();
        let expired = |at: SystemTime| {
            now.duration_since(at)
                .map(|age| age > self.retention)
                .unwrap_or(false)
        };

        self.jobs
            .lock()
            .retain(|_, progress| !progress.is_finished() || !expired(progress.updated_at));

        if !self.results_dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in std::fs::read_dir(&self.results_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RESULT_EXTENSION) {
                continue;
            }

            let running = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|id| self.progress(id))
                .is_some_and(|p| !p.is_finished());
            if running {
                continue;
            }

            let modified = std::fs::metadata(&path)?.modified()?;
            if expired(modified) {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }

        Ok(removed)
    }
}

/// Append-only writer for a job's result file.
pub struct JobWriter {
    job_id: String,
    file: Box<dyn AsyncWrite + Send + Unpin>,
    rows: usize,
}

impl JobWriter {
    /// Create a writer appending JSON lines to `sink`.
    pub fn new(job_id: impl Into<String>, sink: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            job_id: job_id.into(),
            file: Box::new(sink),
            rows: 0,
        }
    }

    /// Append one record as a JSON line and flush it to the file.
    pub async fn append(&mut self, record: &Row) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        self.file
            .write_all(&line)
            .await
            .map_err(|e| Error::job_file_error(&self.job_id, format!("Failed to append row: {e}")))?;
        self.file
            .flush()
            .await
            .map_err(|e| Error::job_file_error(&self.job_id, format!("Failed to flush: {e}")))?;

        self.rows += 1;
        Ok(())
    }

    /// Rows appended through this writer.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Job this writer belongs to.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl std::fmt::Debug for JobWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobWriter")
            .field("job_id", &self.job_id)
            .field("rows", &self.rows)
            .finish_non_exhaustive()
    }
}

/// Check that a job id is safe to use as a file stem.
pub fn is_valid_job_id(job_id: &str) -> bool {
    !job_id.is_empty()
        && job_id.len() <= 64
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
