//! # adresse-check
//!
//! Batch verification of French postal addresses held in spreadsheets.
//!
//! Given a CSV or workbook whose columns hold fragments of an address (house
//! number, street, postcode, city, or free text), the crate infers which
//! column holds which fragment, builds candidate address strings, submits
//! them to a BAN-style geocoding service and labels each row as a valid or
//! invalid postal address with a confidence score.
//!
//! ## Features
//!
//! - **Column Classification**: Infers column roles from sampled values
//! - **Candidate Building**: Ordered, deduplicated address strings per row
//! - **Geocoder Client**: Async BAN client; service failures never fail a job
//! - **Streaming Jobs**: Push-based progress events with results persisted per row
//! - **CSV Export**: Labelled download of a finished job
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use adresse_check::AddressVerifier;
//!
//! # async fn run() -> adresse_check::Result<()> {
//! let verifier = AddressVerifier::new()?;
//!
//! let columns = vec!["Adresse".to_string(), "Code postal".to_string()];
//! let summary = verifier.verify("clients.xlsx", &columns).await?;
//! println!("{} valid / {} checked", summary.valid, summary.checked);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(rust_2018_idioms)]

use std::path::Path;
use std::sync::Arc;

pub mod candidates;
pub mod classifier;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod geocoder;
pub mod jobs;
pub mod normalizer;
pub mod orchestrator;
pub mod stats;
pub mod table;
pub mod types;
pub mod validator;

// Re-export main API
pub use config::{VerifierConfig, VerifierConfigBuilder};
pub use error::{Error, Result};
pub use export::Export;
pub use geocoder::{BanClient, Geocoder, LookupOutcome};
pub use jobs::{JobProgress, JobStatus, JobStore};
pub use orchestrator::{BatchOrchestrator, JobStream, Preview, StreamEvent, VerifySummary};
pub use stats::{LookupStats, LookupStatsSnapshot};
pub use table::Table;
pub use types::*;

/// Main entry point for address verification.
///
/// Owns the geocoder, the job store and the configuration, and exposes the
/// preview, verify, stream and export operations.
///
/// # Examples
///
/// ```rust,no_run
/// use adresse_check::{AddressVerifier, StreamEvent};
///
/// # async fn run() -> adresse_check::Result<()> {
/// let verifier = AddressVerifier::new()?;
/// let columns = vec!["Ville".to_string()];
///
/// let mut job = verifier.stream("clients.csv", &columns).await?;
/// while let Some(event) = job.recv().await {
///     if let StreamEvent::Progress { message, .. } = event {
///         println!("{message}");
///     }
/// }
///
/// let export = verifier.export(job.job_id(), "csv").await?;
/// println!("{}", export.path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AddressVerifier {
    orchestrator: BatchOrchestrator,
    stats: Option<Arc<LookupStats>>,
}

impl AddressVerifier {
    /// Create a verifier with default configuration and the BAN client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GeocoderError`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_config(VerifierConfig::default())
    }

    /// Create a verifier with custom configuration and the BAN client.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use std::time::Duration;
    /// use adresse_check::{AddressVerifier, VerifierConfig};
    ///
    /// let config = VerifierConfig::builder()
    ///     .geocoder_url("http://localhost:7878/search/")
    ///     .request_timeout(Duration::from_secs(1))
    ///     .build();
    ///
    /// let verifier = AddressVerifier::with_config(config)?;
    /// # Ok::<(), adresse_check::Error>(())
    /// ```
    pub fn with_config(config: VerifierConfig) -> Result<Self> {
        let client = BanClient::new(&config)?;
        let stats = client.stats().clone();
        let mut verifier = Self::with_geocoder(config, Arc::new(client));
        verifier.stats = Some(stats);
        Ok(verifier)
    }

    /// Create a verifier backed by any [`Geocoder`].
    pub fn with_geocoder(config: VerifierConfig, geocoder: Arc<dyn Geocoder>) -> Self {
        let jobs = Arc::new(JobStore::from_config(&config));
        Self {
            orchestrator: BatchOrchestrator::new(geocoder, jobs, config),
            stats: None,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &VerifierConfig {
        self.orchestrator.config()
    }

    /// Get the job store.
    pub fn jobs(&self) -> &Arc<JobStore> {
        self.orchestrator.jobs()
    }

    /// Lookup counters of the BAN client, if one is in use.
    pub fn lookup_stats(&self) -> Option<LookupStatsSnapshot> {
        self.stats.as_ref().map(|stats| stats.snapshot())
    }

    /// Read the leading rows of a source.
    pub async fn preview(&self, path: impl AsRef<Path>) -> Result<Preview> {
        self.orchestrator.preview(path).await
    }

    /// Validate every row of a source and return counts with samples.
    pub async fn verify(&self, path: impl AsRef<Path>, columns: &[String]) -> Result<VerifySummary> {
        self.orchestrator.verify(path, columns).await
    }

    /// Start a streaming job over a source.
    pub async fn stream(&self, path: impl AsRef<Path>, columns: &[String]) -> Result<JobStream> {
        self.orchestrator.stream(path, columns).await
    }

    /// Export a job's results.
    pub async fn export(&self, job_id: &str, format: &str) -> Result<Export> {
        let jobs = self.jobs().clone();
        let job_id = job_id.to_string();
        let format = format.to_string();
        tokio::task::spawn_blocking(move || export::export(&jobs, &job_id, &format))
            .await
            .map_err(|e| Error::from(std::io::Error::other(e)))?
    }

    /// Current progress of a job.
    pub fn progress(&self, job_id: &str) -> Option<JobProgress> {
        self.jobs().progress(job_id)
    }
}

impl std::fmt::Debug for AddressVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressVerifier")
            .field("config", self.config())
            .field("jobs", &self.jobs().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::geocoder::testing::ScriptedGeocoder;

    fn verifier(dir: &Path) -> AddressVerifier {
        let config = VerifierConfig::builder()
            .results_dir(dir.join("results"))
            .build();
        let geocoder = ScriptedGeocoder::new().matched(
            "12 rue de Paris 75001 Paris",
            0.95,
            true,
            "12 Rue de Paris 75001 Paris",
        );
        AddressVerifier::with_geocoder(config, Arc::new(geocoder))
    }

    #[test]
    fn test_config_defaults() {
        let config = VerifierConfig::default();
        assert_eq!(config.preview_rows, 50);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_ban_client_exposes_stats() {
        let verifier = AddressVerifier::new().unwrap();
        let stats = verifier.lookup_stats().unwrap();
        assert_eq!(stats.requests, 0);
    }

    #[tokio::test]
    async fn test_stream_then_export() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("clients.csv");
        std::fs::write(&source, "num;voie;cp;ville\n12;rue de Paris;75001;Paris\n").unwrap();
        let verifier = verifier(dir.path());
        assert!(verifier.lookup_stats().is_none());

        let columns = ["num", "voie", "cp", "ville"].map(String::from);
        let mut job = verifier.stream(&source, &columns).await.unwrap();
        let mut last = None;
        while let Some(event) = job.recv().await {
            last = Some(event);
        }
        assert!(last.unwrap().is_terminal());
        assert_eq!(verifier.progress(job.job_id()).unwrap().status, JobStatus::Done);

        let export = verifier.export(job.job_id(), "csv").await.unwrap();
        let text = std::fs::read_to_string(&export.path).unwrap();
        assert!(text.starts_with('\u{feff}'));
        assert!(text.contains("Adresse valide"));
        assert!(text.contains("12 Rue de Paris 75001 Paris"));
        std::fs::remove_file(&export.path).unwrap();
    }
}
