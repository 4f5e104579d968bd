//! tns-submit library interface
//!
//! Submits transient discoveries and spectroscopic classifications to the
//! transient name registry, directly through its bulk-report API or through
//! a relay service, and reports back the registry name.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::config::SubmitSettings;
pub use crate::error::{SubmissionError, SubmissionResult};
pub use crate::models::{Report, ReportRequest, SubmissionOutcome};
pub use crate::services::SubmissionOrchestrator;
