//! Error types for tns-submit
//!
//! Every failure in the submission flow maps to one of these kinds. Only the
//! reply poll loop retries (on 404); everything else is terminal.

use serde_json::Value;
use thiserror::Error;

/// Submission error type
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Missing or blank credentials, submission never attempted
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Report failed validation before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network or HTTP failure on any call
    #[error("Transport error: {0}")]
    Transport(String),

    /// Registry rejected the report (400 on reply, or no recognized feedback)
    #[error("Registry rejected submission: {message}")]
    RegistryRejection { message: String, feedback: Value },

    /// Reply poll loop exhausted without a 200 or 400
    #[error("Registry did not process report {report_id} after {attempts} attempts")]
    SubmissionTimeout { report_id: i64, attempts: u32 },

    /// Reading a spectrum file from disk failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SubmissionError {
    /// Feedback payload attached to a rejection, if any
    pub fn feedback(&self) -> Option<&Value> {
        match self {
            SubmissionError::RegistryRejection { feedback, .. } => Some(feedback),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SubmissionError {
    fn from(err: reqwest::Error) -> Self {
        SubmissionError::Transport(err.to_string())
    }
}

/// Result type for submission operations
pub type SubmissionResult<T> = Result<T, SubmissionError>;
