//! Batch orchestration: preview, synchronous verify and streaming jobs.
//!
//! Every entry point reads the source once and classifies the selected
//! columns once, before any row is validated; the same classification is
//! applied to all rows.
//!
//! A streaming job runs on its own task and reports through a bounded
//! channel. Events always come in this order:
//!
//! ```text
//! Started -> (Progress -> RowWritten) x rows -> Done | Failed
//! ```
//!
//! Each row's full record is written to the job file and dropped; only the
//! counters and the capped sample lists live for the whole run. When the
//! receiver is dropped the task stops at its next send and the job is marked
//! cancelled.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::classifier;
use crate::config::VerifierConfig;
use crate::error::{Error, Result};
use crate::geocoder::Geocoder;
use crate::jobs::{JobStore, JobWriter};
use crate::table::Table;
use crate::types::{ColumnType, Row, ValidationResult};
use crate::validator::RowValidator;

/// Leading rows of a source, without validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    /// Column names in source order
    pub columns: Vec<String>,
    /// Leading rows
    pub preview: Vec<Row>,
    /// Total number of rows
    pub total_rows: usize,
}

/// Aggregate outcome of a verification run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerifySummary {
    /// Rows validated
    pub checked: usize,
    /// Rows accepted
    pub valid: usize,
    /// Rows rejected
    pub invalid: usize,
    /// First accepted rows
    pub valid_samples: Vec<Row>,
    /// First rejected rows
    pub invalid_samples: Vec<Row>,
}

/// Counters plus capped samples per outcome class.
#[derive(Debug, Clone)]
struct Outcomes {
    limit: usize,
    summary: VerifySummary,
}

impl Outcomes {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            summary: VerifySummary::default(),
        }
    }

    fn record(&mut self, valid: bool, sample: Row) {
        let summary = &mut self.summary;
        summary.checked += 1;
        let (count, samples) = if valid {
            (&mut summary.valid, &mut summary.valid_samples)
        } else {
            (&mut summary.invalid, &mut summary.invalid_samples)
        };
        *count += 1;
        if samples.len() < self.limit {
            samples.push(sample);
        }
    }

    fn into_summary(self) -> VerifySummary {
        self.summary
    }
}

/// Event emitted by a streaming job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The job exists and its result file is open
    Started {
        /// Job identifier
        job_id: String,
    },
    /// A row was validated and is about to be written
    Progress {
        /// 1-based index of the row
        current: usize,
        /// Rows in the job
        total: usize,
        /// Human-readable progress line
        message: String,
    },
    /// The row announced by the previous progress event is on disk
    RowWritten {
        /// 1-based index of the row
        current: usize,
    },
    /// All rows were validated
    Done {
        /// Job identifier
        job_id: String,
        /// Final counts and samples
        #[serde(flatten)]
        summary: VerifySummary,
    },
    /// The job stopped because its result file could not be written
    #[serde(rename = "error")]
    Failed {
        /// Job identifier
        job_id: String,
        /// Failure detail
        message: String,
    },
}

impl StreamEvent {
    /// JSON form sent to clients; internal events have none.
    pub fn to_wire(&self) -> Option<Value> {
        match self {
            StreamEvent::RowWritten { .. } => None,
            event => serde_json::to_value(event).ok(),
        }
    }

    /// Whether no event follows this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Failed { .. })
    }
}

/// Receiving end of a streaming job.
#[derive(Debug)]
pub struct JobStream {
    job_id: String,
    events: mpsc::Receiver<StreamEvent>,
}

impl JobStream {
    /// Identifier of the job.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Wait for the next event; `None` once the job has finished.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Consume as a [`Stream`] of events.
    pub fn into_stream(self) -> Pin<Box<dyn Stream<Item = StreamEvent> + Send>> {
        Box::pin(futures::stream::unfold(self.events, |mut events| async move {
            events.recv().await.map(|event| (event, events))
        }))
    }
}

/// Drives row validation over whole tables.
#[derive(Clone)]
pub struct BatchOrchestrator {
    validator: RowValidator,
    jobs: Arc<JobStore>,
    config: Arc<VerifierConfig>,
}

impl BatchOrchestrator {
    /// Create an orchestrator validating with `geocoder` and keeping jobs
    /// in `jobs`.
    pub fn new(geocoder: Arc<dyn Geocoder>, jobs: Arc<JobStore>, config: VerifierConfig) -> Self {
        Self {
            validator: RowValidator::new(geocoder),
            jobs,
            config: Arc::new(config),
        }
    }

    /// Job store used for streaming runs.
    pub fn jobs(&self) -> &Arc<JobStore> {
        &self.jobs
    }

    /// Configuration in use.
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Read the leading rows of a source without validating anything.
    pub async fn preview(&self, path: impl AsRef<Path>) -> Result<Preview> {
        let table = load_table(path.as_ref()).await?;
        Ok(Preview {
            columns: table.columns().to_vec(),
            preview: table.head(self.config.preview_rows).to_vec(),
            total_rows: table.len(),
        })
    }

    /// Classify each selected column of a table.
    ///
    /// A column selected more than once is classified once, at its first
    /// position.
    pub fn classify_columns(
        &self,
        table: &Table,
        columns: &[String],
    ) -> Result<Vec<(String, ColumnType)>> {
        if columns.is_empty() {
            return Err(Error::invalid_request("No columns selected"));
        }
        table.require_columns(columns)?;

        let mut seen = HashSet::new();
        let column_types: Vec<(String, ColumnType)> = columns
            .iter()
            .filter(|column| seen.insert(column.as_str()))
            .map(|column| {
                let values = table.column_text(column);
                let column_type =
                    classifier::classify_with_sample(values, self.config.classify_sample);
                (column.clone(), column_type)
            })
            .collect();

        tracing::info!(?column_types, "columns classified");
        Ok(column_types)
    }

    /// Validate every row and return counts with capped samples.
    ///
    /// Samples carry the selected columns plus `valid`, `score` and
    /// `normalized_address`.
    pub async fn verify(&self, path: impl AsRef<Path>, columns: &[String]) -> Result<VerifySummary> {
        let table = load_table(path.as_ref()).await?;
        let column_types = self.classify_columns(&table, columns)?;
        let mut outcomes = Outcomes::new(self.config.sample_limit);

        for row in table.rows() {
            let result = self.validator.validate(row, &column_types).await;
            outcomes.record(result.valid, verify_sample(row, &column_types, &result));
        }

        let summary = outcomes.into_summary();
        tracing::info!(
            checked = summary.checked,
            valid = summary.valid,
            invalid = summary.invalid,
            "verification finished"
        );
        Ok(summary)
    }

    /// Start a streaming job.
    ///
    /// Request and source errors are returned before the job exists. If the
    /// job file cannot be opened the error is returned and the job is marked
    /// failed. Once a [`JobStream`] is returned, failures are reported as a
    /// [`StreamEvent::Failed`] event.
    pub async fn stream(&self, path: impl AsRef<Path>, columns: &[String]) -> Result<JobStream> {
        let table = load_table(path.as_ref()).await?;
        let column_types = self.classify_columns(&table, columns)?;

        let jobs = self.jobs.clone();
        let total = table.len();
        let job_id = tokio::task::spawn_blocking(move || jobs.create(total))
            .await
            .map_err(|e| Error::from(std::io::Error::other(e)))??;
        let writer = self.jobs.open_writer(&job_id).await?;

        let (job, events) = self.streaming_job(&job_id, column_types);

        tracing::info!(%job_id, rows = table.len(), "streaming job started");
        tokio::spawn(job.run(table, writer));

        Ok(JobStream { job_id, events })
    }

    fn streaming_job(
        &self,
        job_id: &str,
        column_types: Vec<(String, ColumnType)>,
    ) -> (StreamingJob, mpsc::Receiver<StreamEvent>) {
        let (sender, events) = mpsc::channel(self.config.channel_capacity.max(1));
        let job = StreamingJob {
            job_id: job_id.to_string(),
            validator: self.validator.clone(),
            jobs: self.jobs.clone(),
            sample_limit: self.config.sample_limit,
            column_types,
            sender,
        };
        (job, events)
    }
}

/// The consumer dropped the receiver.
struct Disconnected;

struct StreamingJob {
    job_id: String,
    validator: RowValidator,
    jobs: Arc<JobStore>,
    sample_limit: usize,
    column_types: Vec<(String, ColumnType)>,
    sender: mpsc::Sender<StreamEvent>,
}

impl StreamingJob {
    async fn run(self, table: Table, writer: JobWriter) {
        match self.process(&table, writer).await {
            Ok(()) => {}
            Err(Disconnected) => {
                tracing::warn!(job_id = %self.job_id, "consumer disconnected, job cancelled");
                self.jobs.cancel(&self.job_id);
            }
        }
    }

    async fn emit(&self, event: StreamEvent) -> std::result::Result<(), Disconnected> {
        self.sender.send(event).await.map_err(|_| Disconnected)
    }

    async fn process(
        &self,
        table: &Table,
        mut writer: JobWriter,
    ) -> std::result::Result<(), Disconnected> {
        let total = table.len();
        let mut outcomes = Outcomes::new(self.sample_limit);

        self.emit(StreamEvent::Started {
            job_id: self.job_id.clone(),
        })
        .await?;

        for (index, row) in table.rows().iter().enumerate() {
            let current = index + 1;
            let result = self.validator.validate(row, &self.column_types).await;

            let message = format!("Validated {current} / {total}");
            self.jobs.update(&self.job_id, current, message.clone());
            self.emit(StreamEvent::Progress {
                current,
                total,
                message,
            })
            .await?;

            let mut record = row.clone();
            result.merge_into(&mut record);
            if let Err(e) = writer.append(&record).await {
                tracing::error!(job_id = %self.job_id, error = %e, "job file write failed");
                self.jobs.fail(&self.job_id, e.to_string());
                return self
                    .emit(StreamEvent::Failed {
                        job_id: self.job_id.clone(),
                        message: e.to_string(),
                    })
                    .await;
            }
            self.emit(StreamEvent::RowWritten { current }).await?;

            outcomes.record(result.valid, record);
        }

        let summary = outcomes.into_summary();
        tracing::info!(
            job_id = %self.job_id,
            checked = summary.checked,
            valid = summary.valid,
            invalid = summary.invalid,
            "streaming job finished"
        );
        self.jobs.complete(&self.job_id);
        self.emit(StreamEvent::Done {
            job_id: self.job_id.clone(),
            summary,
        })
        .await
    }
}

fn verify_sample(
    row: &Row,
    column_types: &[(String, ColumnType)],
    result: &ValidationResult,
) -> Row {
    let mut sample: Row = column_types
        .iter()
        .map(|(column, _)| {
            let value = row.get(column).cloned().unwrap_or(Value::Null);
            (column.clone(), value)
        })
        .collect();
    sample.insert("valid".to_string(), result.valid.into());
    sample.insert("score".to_string(), result.score.into());
    sample.insert(
        "normalized_address".to_string(),
        result.address.clone().into(),
    );
    sample
}

async fn load_table(path: &Path) -> Result<Table> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || Table::read(path))
        .await
        .map_err(|e| Error::source_error(format!("Reader task failed: {e}")))?
}
