//! Result handed back to the host application

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SubmissionError;

/// Uniform result of a submission, whichever path was taken
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub success: bool,
    /// Registry name assigned or confirmed for the object
    pub canonical_name: Option<String>,
    /// One-line summary suitable for showing to the user
    pub message: String,
    /// Registry report id, kept for manual follow-up
    pub report_id: Option<i64>,
    /// Raw feedback payload for diagnostics
    pub raw_feedback: Option<Value>,
}

impl SubmissionOutcome {
    pub fn confirmed(name: Option<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            canonical_name: name,
            message: message.into(),
            report_id: None,
            raw_feedback: None,
        }
    }

    pub fn failed(error: &SubmissionError) -> Self {
        let report_id = match error {
            SubmissionError::SubmissionTimeout { report_id, .. } => Some(*report_id),
            _ => None,
        };
        Self {
            success: false,
            canonical_name: None,
            message: error.to_string(),
            report_id,
            raw_feedback: error.feedback().cloned(),
        }
    }

    pub fn with_report_id(mut self, report_id: i64) -> Self {
        self.report_id = Some(report_id);
        self
    }

    pub fn with_feedback(mut self, feedback: Value) -> Self {
        self.raw_feedback = Some(feedback);
        self
    }

    /// The name the target should be renamed to, if it changed
    ///
    /// When this returns `Some`, the caller updates the target's primary
    /// name and keeps `current` as an alias.
    pub fn renamed_from(&self, current: &str) -> Option<&str> {
        if !self.success {
            return None;
        }
        self.canonical_name
            .as_deref()
            .filter(|name| !name.is_empty() && *name != current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renamed_from() {
        let outcome = SubmissionOutcome::confirmed(Some("AT2025xyz".to_string()), "ok");
        assert_eq!(outcome.renamed_from("ZTF25abc"), Some("AT2025xyz"));
        assert_eq!(outcome.renamed_from("AT2025xyz"), None);

        let nameless = SubmissionOutcome::confirmed(None, "ok");
        assert_eq!(nameless.renamed_from("ZTF25abc"), None);
    }

    #[test]
    fn test_failed_carries_timeout_report_id() {
        let err = SubmissionError::SubmissionTimeout {
            report_id: 555,
            attempts: 10,
        };
        let outcome = SubmissionOutcome::failed(&err);
        assert!(!outcome.success);
        assert_eq!(outcome.report_id, Some(555));
        assert!(outcome.message.contains("555"));
        assert_eq!(outcome.renamed_from("anything"), None);
    }

    #[test]
    fn test_failed_carries_feedback() {
        let err = SubmissionError::RegistryRejection {
            message: "bad".to_string(),
            feedback: serde_json::json!({"at_report": []}),
        };
        let outcome = SubmissionOutcome::failed(&err);
        assert_eq!(outcome.raw_feedback, Some(serde_json::json!({"at_report": []})));
    }
}
