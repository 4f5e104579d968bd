//! Relay submission against the fake relay

mod helpers;

use chrono::{TimeZone, Utc};
use serde_json::json;
use std::io::Write;
use tns_submit::models::{
    ClassificationReport, DiscoveryPhotometry, DiscoveryReport, FileOrigin, NonDetectionInput,
    Report, ReportRequest, SpectrumFiles, SpectrumRecord, UploadedFile, ValueId,
};
use tns_submit::SubmissionOrchestrator;

use helpers::{relay_settings, FakeServices};

const RELAY_PATH: &str = "/api/v0/submit_message/";

fn relay_accepted(citation: &str) -> serde_json::Value {
    json!({
        "uuid": "0b8c6f5e-2a1d-4c3b-9e8f-7a6b5c4d3e2f",
        "data": {"references": [
            {"source": "hermes", "citation": "ignored"},
            {"source": "tns_object", "citation": citation}
        ]}
    })
}

fn discovery_request(reporter: &str) -> ReportRequest {
    ReportRequest {
        submitter: Some("observer@example.org".to_string()),
        report: Report::Discovery(DiscoveryReport {
            object_name: "ZTF25abcdefg".to_string(),
            ra: 150.0,
            dec: 20.0,
            reporting_group: ValueId::from("66"),
            discovery_data_source: ValueId::from("48"),
            reporter: reporter.to_string(),
            discovery_date: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
            at_type: ValueId::from(1u32),
            discovery_remarks: None,
            photometry: DiscoveryPhotometry {
                observation_date: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
                flux: 19.2,
                flux_error: None,
                flux_units: ValueId::from("1"),
                filter: ValueId::from("22"),
                instrument: ValueId::from("172"),
                limiting_flux: None,
                exposure_time: None,
                observer: None,
                remarks: None,
            },
            non_detection: NonDetectionInput {
                archive: Some(ValueId::from("2")),
                archival_remarks: Some("Not in SDSS".to_string()),
                ..Default::default()
            },
        }),
    }
}

#[tokio::test]
async fn test_relay_discovery_posts_json() {
    let fake = FakeServices::new();
    let root = fake.spawn().await;
    fake.set_relay_response(200, relay_accepted("2025xyz"));

    let orchestrator = SubmissionOrchestrator::from_settings(relay_settings(&root)).unwrap();
    let outcome = orchestrator.submit_report(&discovery_request("")).await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.canonical_name.as_deref(), Some("2025xyz"));

    let sent = fake.requests_to(RELAY_PATH);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].authorization.as_deref(), Some("Token relay-key"));
    assert!(sent[0].files.is_empty());

    let message = sent[0].json.as_ref().expect("discovery is sent as JSON");
    assert_eq!(message["topic"], "hermes.discovery");
    assert_eq!(message["submitter"], "observer@example.org");
    // Blank reporter falls back to the relay default authors
    assert_eq!(message["authors"], "Relay Team");
    let target = &message["data"]["targets"][0];
    assert_eq!(target["discovery_info"]["reporting_group"], "SAGUARO");
    assert_eq!(target["discovery_info"]["nondetection_source"], "SDSS");
    assert_eq!(message["data"]["photometry"][0]["bandpass"], "r-Sloan");

    // The registry is never contacted directly
    assert!(fake.requests_to("/api/bulk-report").is_empty());
}

#[tokio::test]
async fn test_relay_classification_posts_multipart() {
    let fake = FakeServices::new();
    let root = fake.spawn().await;
    fake.set_relay_response(200, relay_accepted("2025xyz"));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spec.ascii");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(b"4000 1.0\n")
        .unwrap();

    let request = ReportRequest {
        submitter: None,
        report: Report::Classification(ClassificationReport {
            object_name: "AT2025xyz".to_string(),
            ra: Some(150.0),
            dec: Some(20.0),
            classifier: "A. Classifier".to_string(),
            classification: ValueId::from("3"),
            redshift: None,
            reporting_group: ValueId::from("66"),
            remarks: None,
            spectrum: SpectrumRecord {
                observation_date: Utc.with_ymd_and_hms(2025, 1, 5, 6, 7, 8).unwrap(),
                instrument: ValueId::from("172"),
                exposure_time: None,
                observer: "Robot".to_string(),
                reducer: None,
                spectrum_type: ValueId::from(0u32),
                remarks: None,
            },
            files: SpectrumFiles {
                ascii: Some(UploadedFile::from_path(FileOrigin::DataProduct { id: 3 }, &path)),
                ..Default::default()
            },
        }),
    };

    let orchestrator = SubmissionOrchestrator::from_settings(relay_settings(&root)).unwrap();
    let outcome = orchestrator.submit_report(&request).await;

    assert!(outcome.success, "{}", outcome.message);

    let sent = fake.requests_to(RELAY_PATH);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].json.is_none());
    assert_eq!(sent[0].files.len(), 1);
    assert_eq!(sent[0].files[0].field, "files");
    assert_eq!(sent[0].files[0].file_name, "spec.ascii");
    assert_eq!(sent[0].files[0].content_type, "text/plain");

    let message = sent[0].json_field("data");
    assert_eq!(message["topic"], "hermes.classification");
    assert_eq!(message["authors"], "A. Classifier");
    let spectroscopy = &message["data"]["spectroscopy"][0];
    assert_eq!(spectroscopy["classification"], "SN Ia");
    assert_eq!(spectroscopy["spec_type"], "Object");

    assert!(fake.requests_to("/api/file-upload").is_empty());
}

#[tokio::test]
async fn test_relay_error_reports_response_body() {
    let fake = FakeServices::new();
    let root = fake.spawn().await;
    fake.set_relay_response(400, json!({"title": ["This field is required."]}));

    let orchestrator = SubmissionOrchestrator::from_settings(relay_settings(&root)).unwrap();
    let outcome = orchestrator.submit_report(&discovery_request("A. Observer")).await;

    assert!(!outcome.success);
    assert!(outcome.canonical_name.is_none());
    assert!(outcome.message.contains("This field is required."));
}

#[tokio::test]
async fn test_relay_without_object_reference_has_no_name() {
    let fake = FakeServices::new();
    let root = fake.spawn().await;
    fake.set_relay_response(200, json!({"uuid": "0b8c6f5e-2a1d-4c3b-9e8f-7a6b5c4d3e2f"}));

    let orchestrator = SubmissionOrchestrator::from_settings(relay_settings(&root)).unwrap();
    let outcome = orchestrator.submit_report(&discovery_request("A. Observer")).await;

    assert!(outcome.success);
    assert_eq!(outcome.renamed_from("ZTF25abcdefg"), None);
}

#[tokio::test]
async fn test_relay_missing_key_is_configuration_failure() {
    let fake = FakeServices::new();
    let root = fake.spawn().await;

    let mut settings = relay_settings(&root);
    if let Some(relay) = settings.relay.as_mut() {
        relay.api_key = None;
    }
    let orchestrator = SubmissionOrchestrator::from_settings(settings).unwrap();
    let outcome = orchestrator.submit_report(&discovery_request("A. Observer")).await;

    assert!(!outcome.success);
    assert!(outcome.message.starts_with("Configuration error"));
    assert!(fake.requests().is_empty());
}
