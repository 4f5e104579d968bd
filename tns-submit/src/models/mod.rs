//! Data models for report submission
//!
//! Everything here is created per request and owned by the submission call
//! that uses it, except the reference value identifiers which mirror the
//! registry's option lists.

pub mod files;
pub mod outcome;
pub mod report;
pub mod values;

pub use files::{FileKind, FileOrigin, SpectrumFiles, UploadedFile};
pub use outcome::SubmissionOutcome;
pub use report::{
    ClassificationReport, DiscoveryPhotometry, DiscoveryReport, NonDetection, NonDetectionInput,
    Report, ReportRequest, SpectrumRecord,
};
pub use values::{ValueCategory, ValueId};
