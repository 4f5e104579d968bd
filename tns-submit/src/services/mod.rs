//! Submission services
//!
//! Leaves first: reference values and measurement mapping, the two document
//! builders, the registry and relay clients with file upload and reply
//! polling, and the orchestrator that ties them together.

pub mod file_upload;
pub mod measurement_mapping;
pub mod orchestrator;
pub mod reference_values;
pub mod registry_client;
pub mod relay_client;
pub mod relay_report;
pub mod reply_poller;
pub mod report_builder;

pub use file_upload::{FileUploadStage, LogicalFile, UploadSlot, UploadedNames};
pub use measurement_mapping::MeasurementMapping;
pub use orchestrator::{SubmissionOrchestrator, SubmissionStage};
pub use reference_values::{ReferenceValue, ReferenceValueCache, ValueSnapshot, ValuesSource};
pub use registry_client::RegistryClient;
pub use relay_client::RelayClient;
pub use reply_poller::{FeedbackCode, PollDecision, PollPolicy, RegistryReply, ReplyPoller};
