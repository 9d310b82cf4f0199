//! Verifier configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default BAN search endpoint.
pub const DEFAULT_GEOCODER_URL: &str = "https://api-adresse.data.gouv.fr/search/";

/// Environment variable overriding the geocoder endpoint.
pub const GEOCODER_URL_ENV: &str = "ADRESSE_CHECK_GEOCODER_URL";

/// Environment variable overriding the job results directory.
pub const RESULTS_DIR_ENV: &str = "ADRESSE_CHECK_RESULTS_DIR";

/// Configuration for the verification engine.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Geocoder search endpoint
    pub geocoder_url: String,

    /// Per-request timeout for geocoder lookups
    pub request_timeout: Duration,

    /// Minimum score for a match to be accepted
    pub accept_threshold: f64,

    /// Directory holding per-job result files
    pub results_dir: PathBuf,

    /// Number of leading rows returned by preview
    pub preview_rows: usize,

    /// Maximum samples kept per outcome class
    pub sample_limit: usize,

    /// Number of non-empty values inspected per column by the classifier
    pub classify_sample: usize,

    /// How long job results are kept before eviction
    pub job_retention: Duration,

    /// Capacity of the streaming event channel
    pub channel_capacity: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            geocoder_url: default_geocoder_url(),
            request_timeout: Duration::from_secs(3),
            accept_threshold: 0.8,
            results_dir: default_results_dir(),
            preview_rows: 50,
            sample_limit: 20,
            classify_sample: crate::classifier::DEFAULT_SAMPLE_SIZE,
            job_retention: Duration::from_secs(24 * 60 * 60),
            channel_capacity: 64,
        }
    }
}

impl VerifierConfig {
    /// Create a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use adresse_check::VerifierConfig;
    ///
    /// let config = VerifierConfig::builder()
    ///     .request_timeout(Duration::from_secs(5))
    ///     .results_dir("/tmp/adresse-check")
    ///     .build();
    /// assert_eq!(config.preview_rows, 50);
    /// ```
    pub fn builder() -> VerifierConfigBuilder {
        VerifierConfigBuilder::new()
    }
}

/// Builder for VerifierConfig.
#[derive(Debug, Clone)]
pub struct VerifierConfigBuilder {
    config: VerifierConfig,
}

impl VerifierConfigBuilder {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self {
            config: VerifierConfig::default(),
        }
    }

    /// Set the geocoder search endpoint.
    pub fn geocoder_url(mut self, url: impl Into<String>) -> Self {
        self.config.geocoder_url = url.into();
        self
    }

    /// Set the per-request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the acceptance threshold.
    pub fn accept_threshold(mut self, threshold: f64) -> Self {
        self.config.accept_threshold = threshold;
        self
    }

    /// Set a custom results directory.
    pub fn results_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.results_dir = dir.into();
        self
    }

    /// Set the number of preview rows.
    pub fn preview_rows(mut self, rows: usize) -> Self {
        self.config.preview_rows = rows;
        self
    }

    /// Set the per-class sample limit.
    pub fn sample_limit(mut self, limit: usize) -> Self {
        self.config.sample_limit = limit;
        self
    }

    /// Set the classifier sample size.
    pub fn classify_sample(mut self, size: usize) -> Self {
        self.config.classify_sample = size;
        self
    }

    /// Set the job retention period.
    pub fn job_retention(mut self, retention: Duration) -> Self {
        self.config.job_retention = retention;
        self
    }

    /// Set the streaming channel capacity (at least 1).
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity.max(1);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> VerifierConfig {
        self.config
    }
}

impl Default for VerifierConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the geocoder endpoint, honouring the environment override.
pub fn default_geocoder_url() -> String {
    match std::env::var(GEOCODER_URL_ENV) {
        Ok(url) if !url.trim().is_empty() => url,
        _ => DEFAULT_GEOCODER_URL.to_string(),
    }
}

/// Get the default directory for job result files.
pub fn default_results_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(RESULTS_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    std::env::temp_dir().join("module_results")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = VerifierConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.accept_threshold, 0.8);
        assert_eq!(config.preview_rows, 50);
        assert_eq!(config.sample_limit, 20);
        assert_eq!(config.classify_sample, 20);
        assert!(!config.results_dir.as_os_str().is_empty());
    }

    #[test]
    fn test_builder_overrides() {
        let config = VerifierConfig::builder()
            .geocoder_url("http://localhost:7878/search/")
            .sample_limit(5)
            .channel_capacity(0)
            .results_dir("/tmp/results")
            .build();

        assert_eq!(config.geocoder_url, "http://localhost:7878/search/");
        assert_eq!(config.sample_limit, 5);
        assert_eq!(config.channel_capacity, 1);
        assert_eq!(config.results_dir, PathBuf::from("/tmp/results"));
    }
}
