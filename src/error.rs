//! Error types and handling for adresse-check.

/// Result type alias for verification operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for verification operations.
///
/// Geocoder failures during a lookup never show up here: they are absorbed
/// into a "no match" for the candidate being tried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request itself is malformed (unknown action, unsupported format, ...)
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Error message
        message: String,
    },

    /// No result file exists for the requested job
    #[error("Job not found or expired: {job_id}")]
    JobNotFound {
        /// Requested job identifier
        job_id: String,
    },

    /// A selected column is not present in the source
    #[error("Unknown column: {column}")]
    UnknownColumn {
        /// Column name as supplied by the caller
        column: String,
    },

    /// The tabular source could not be opened or decoded
    #[error("Source error: {message}")]
    SourceError {
        /// Error message
        message: String,
    },

    /// Reading or appending a job result file failed
    #[error("Job file error for {job_id}: {message}")]
    JobFileError {
        /// Job whose file failed
        job_id: String,
        /// Error message
        message: String,
    },

    /// The geocoder client could not be constructed
    #[error("Geocoder error: {message}")]
    GeocoderError {
        /// Error message
        message: String,
    },

    /// I/O errors
    #[error("I/O error: {source}")]
    IoError {
        /// Source error
        #[from]
        source: std::io::Error,
    },

    /// JSON encoding or decoding errors
    #[error("JSON error: {source}")]
    JsonError {
        /// Source error
        #[from]
        source: serde_json::Error,
    },

    /// CSV encoding or decoding errors
    #[error("CSV error: {source}")]
    CsvError {
        /// Source error
        #[from]
        source: csv::Error,
    },
}

impl Error {
    /// Create a new invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a new job not found error
    pub fn job_not_found(job_id: impl Into<String>) -> Self {
        Self::JobNotFound {
            job_id: job_id.into(),
        }
    }

    /// Create a new unknown column error
    pub fn unknown_column(column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            column: column.into(),
        }
    }

    /// Create a new source error
    pub fn source_error(message: impl Into<String>) -> Self {
        Self::SourceError {
            message: message.into(),
        }
    }

    /// Create a new job file error
    pub fn job_file_error(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JobFileError {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    /// Create a new geocoder error
    pub fn geocoder_error(message: impl Into<String>) -> Self {
        Self::GeocoderError {
            message: message.into(),
        }
    }

    /// Whether this error was caused by the caller's request rather than by
    /// the engine or its environment.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest { .. } | Self::JobNotFound { .. } | Self::UnknownColumn { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_errors() {
        assert!(Error::invalid_request("Unknown action: foo").is_request_error());
        assert!(Error::job_not_found("abc").is_request_error());
        assert!(Error::unknown_column("Ville").is_request_error());
        assert!(!Error::job_file_error("abc", "disk full").is_request_error());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::job_not_found("abc").to_string(),
            "Job not found or expired: abc"
        );
        assert_eq!(
            Error::invalid_request("Unsupported format").to_string(),
            "Invalid request: Unsupported format"
        );
    }
}
