//! Submission orchestrator
//!
//! Top-level entry point for the host application. Picks the direct
//! registry path or the relay path from configuration and runs the
//! build → upload → submit → poll sequence, returning one uniform
//! [`SubmissionOutcome`] whatever happened.
//!
//! Stages: `BUILDING → (UPLOADING) → SUBMITTED → POLLING → {CONFIRMED |
//! REJECTED | TIMED_OUT}`. Only polling retries.

use std::fmt;
use std::sync::Arc;

use crate::config::SubmitSettings;
use crate::error::{SubmissionError, SubmissionResult};
use crate::models::{
    ClassificationReport, DiscoveryReport, Report, ReportRequest, SubmissionOutcome,
    UploadedFile, ValueId,
};
use crate::services::file_upload::FileUploadStage;
use crate::services::measurement_mapping::{self, default_authors};
use crate::services::reference_values::{ReferenceValue, ReferenceValueCache};
use crate::services::registry_client::RegistryClient;
use crate::services::relay_client::RelayClient;
use crate::services::{relay_report, report_builder};

/// Submission progress, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    Building,
    Uploading,
    Submitted,
    Polling,
    Confirmed,
    Rejected,
    TimedOut,
}

impl SubmissionStage {
    fn for_error(error: &SubmissionError) -> Option<Self> {
        match error {
            SubmissionError::RegistryRejection { .. } => Some(Self::Rejected),
            SubmissionError::SubmissionTimeout { .. } => Some(Self::TimedOut),
            _ => None,
        }
    }
}

impl fmt::Display for SubmissionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Building => "BUILDING",
            Self::Uploading => "UPLOADING",
            Self::Submitted => "SUBMITTED",
            Self::Polling => "POLLING",
            Self::Confirmed => "CONFIRMED",
            Self::Rejected => "REJECTED",
            Self::TimedOut => "TIMED_OUT",
        };
        f.write_str(s)
    }
}

/// Runs submissions against the registry or the relay
pub struct SubmissionOrchestrator {
    settings: SubmitSettings,
    values: Arc<ReferenceValueCache>,
    registry: Arc<RegistryClient>,
    relay: Option<RelayClient>,
}

impl SubmissionOrchestrator {
    pub fn new(
        settings: SubmitSettings,
        values: Arc<ReferenceValueCache>,
        registry: Arc<RegistryClient>,
        relay: Option<RelayClient>,
    ) -> Self {
        Self {
            settings,
            values,
            registry,
            relay,
        }
    }

    /// Wire up clients and the value cache from resolved settings
    ///
    /// Incomplete credentials do not fail here; the value cache works
    /// without them and submissions report a configuration error.
    pub fn from_settings(settings: SubmitSettings) -> SubmissionResult<Self> {
        let registry = Arc::new(RegistryClient::from_settings(
            &settings.registry,
            settings.polling,
        )?);
        let values = Arc::new(ReferenceValueCache::new(registry.clone()));

        let relay = match &settings.relay {
            Some(relay) if relay.enable && relay.base_url.is_some() && relay.api_key.is_some() => {
                Some(RelayClient::from_settings(relay, settings.registry.timeouts)?)
            }
            _ => None,
        };

        Ok(Self::new(settings, values, registry, relay))
    }

    pub fn values(&self) -> &Arc<ReferenceValueCache> {
        &self.values
    }

    /// Reporting groups the configured bot may report for
    pub async fn reporting_group_choices(&self) -> Vec<ReferenceValue> {
        self.values
            .reporting_group_choices(&self.settings.registry.group_names)
            .await
    }

    /// Registry filter id for a local bandpass, using the active mode's mapping
    pub async fn resolve_filter(&self, bandpass: &str) -> Option<ValueId> {
        measurement_mapping::resolve_filter(&self.values, self.settings.active_mapping(), bandpass)
            .await
    }

    /// Registry instrument id for a local instrument or telescope
    pub async fn resolve_instrument(
        &self,
        instrument: Option<&str>,
        telescope: Option<&str>,
    ) -> Option<ValueId> {
        measurement_mapping::resolve_instrument(
            &self.values,
            self.settings.active_mapping(),
            instrument,
            telescope,
        )
        .await
    }

    /// Submit a report, folding every failure into the outcome
    pub async fn submit_report(&self, request: &ReportRequest) -> SubmissionOutcome {
        match self.try_submit_report(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                match SubmissionStage::for_error(&e) {
                    Some(stage) => tracing::error!(
                        object = %request.report.object_name(),
                        stage = %stage,
                        "Submission failed: {}",
                        e
                    ),
                    None => tracing::error!(
                        object = %request.report.object_name(),
                        "Submission failed: {}",
                        e
                    ),
                }
                SubmissionOutcome::failed(&e)
            }
        }
    }

    /// Submit a report, returning the first failure as an error
    pub async fn try_submit_report(&self, request: &ReportRequest) -> SubmissionResult<SubmissionOutcome> {
        self.settings.validate_for_submission()?;

        let report = self.with_default_authors(&request.report);
        let submitter = request.submitter.as_deref();

        match (&self.relay, &report) {
            (Some(relay), Report::Discovery(discovery)) => {
                self.relay_discovery(relay, discovery, submitter).await
            }
            (Some(relay), Report::Classification(classification)) => {
                self.relay_classification(relay, classification, submitter).await
            }
            (None, _) if self.settings.submit_through_relay() => Err(SubmissionError::Configuration(
                "Relay submission enabled but no relay client is configured".to_string(),
            )),
            (None, Report::Discovery(discovery)) => self.direct_discovery(discovery).await,
            (None, Report::Classification(classification)) => {
                self.direct_classification(classification).await
            }
        }
    }

    fn with_default_authors(&self, report: &Report) -> Report {
        let configured = self.settings.default_authors();
        let mut report = report.clone();
        match &mut report {
            Report::Discovery(r) => r.reporter = default_authors(&r.reporter, configured),
            Report::Classification(r) => r.classifier = default_authors(&r.classifier, configured),
        }
        report
    }

    fn log_stage(&self, object: &str, stage: SubmissionStage) {
        tracing::debug!(object = %object, stage = %stage, "Submission stage");
    }

    async fn direct_discovery(&self, report: &DiscoveryReport) -> SubmissionResult<SubmissionOutcome> {
        self.log_stage(&report.object_name, SubmissionStage::Building);
        let document = report_builder::build_discovery(report)?;

        self.submit_and_poll(&report.object_name, &document).await
    }

    async fn direct_classification(
        &self,
        report: &ClassificationReport,
    ) -> SubmissionResult<SubmissionOutcome> {
        self.log_stage(&report.object_name, SubmissionStage::Building);
        report.validate()?;

        self.log_stage(&report.object_name, SubmissionStage::Uploading);
        let uploaded = FileUploadStage::new(&self.registry)
            .upload(&report.files)
            .await?;

        let document = report_builder::build_classification(report, &uploaded)?;
        self.submit_and_poll(&report.object_name, &document).await
    }

    async fn submit_and_poll(
        &self,
        object: &str,
        document: &serde_json::Value,
    ) -> SubmissionResult<SubmissionOutcome> {
        let report_id = self.registry.submit(document).await?;
        self.log_stage(object, SubmissionStage::Submitted);

        self.log_stage(object, SubmissionStage::Polling);
        let reply = self.registry.poll_reply(report_id).await?;

        tracing::info!(
            object = %object,
            report_id = report_id,
            stage = %SubmissionStage::Confirmed,
            registry_name = %reply.object_name,
            "Submission confirmed"
        );

        let message = reply.message();
        Ok(SubmissionOutcome::confirmed(Some(reply.object_name), message)
            .with_report_id(report_id)
            .with_feedback(reply.feedback))
    }

    async fn relay_discovery(
        &self,
        relay: &RelayClient,
        report: &DiscoveryReport,
        submitter: Option<&str>,
    ) -> SubmissionResult<SubmissionOutcome> {
        self.log_stage(&report.object_name, SubmissionStage::Building);
        let values = self.values.snapshot().await;
        let message = relay_report::build_relay_discovery(report, submitter, &values)?;

        let name = relay.submit(&message, &[]).await?;
        Ok(relay_outcome(&report.object_name, name))
    }

    async fn relay_classification(
        &self,
        relay: &RelayClient,
        report: &ClassificationReport,
        submitter: Option<&str>,
    ) -> SubmissionResult<SubmissionOutcome> {
        self.log_stage(&report.object_name, SubmissionStage::Building);
        let values = self.values.snapshot().await;
        let message = relay_report::build_relay_classification(report, submitter, &values)?;

        let files: Vec<&UploadedFile> = report.files.iter().collect();
        let name = relay.submit(&message, &files).await?;
        Ok(relay_outcome(&report.object_name, name))
    }
}

fn relay_outcome(object: &str, name: Option<String>) -> SubmissionOutcome {
    match name {
        Some(name) => {
            tracing::info!(object = %object, registry_name = %name, "Relay forwarded report");
            let message = format!("Report for {} forwarded through relay as {}", object, name);
            SubmissionOutcome::confirmed(Some(name), message)
        }
        None => {
            tracing::warn!(object = %object, "Relay accepted report without a registry name");
            SubmissionOutcome::confirmed(
                None,
                format!("Report for {} forwarded through relay", object),
            )
        }
    }
}
