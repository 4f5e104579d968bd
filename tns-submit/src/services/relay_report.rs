//! Relay message documents
//!
//! The relay takes a flatter message than the registry: `targets`,
//! `photometry` and `spectroscopy` arrays, with human-readable labels where
//! the registry uses ids. Labels come from the reference value snapshot; an
//! id with no known label is sent as-is.

use serde_json::{json, Value};

use crate::error::SubmissionResult;
use crate::models::{
    ClassificationReport, DiscoveryReport, NonDetection, ValueCategory, ValueId,
};
use crate::services::reference_values::ValueSnapshot;

const DISCOVERY_TOPIC: &str = "hermes.discovery";
const CLASSIFICATION_TOPIC: &str = "hermes.classification";

fn label(values: &ValueSnapshot, category: ValueCategory, id: &ValueId) -> String {
    values
        .label(category, id)
        .map(str::to_string)
        .unwrap_or_else(|| id.to_string())
}

fn envelope(topic: &str, title: String, submitter: Option<&str>, authors: &str, data: Value) -> Value {
    json!({
        "topic": topic,
        "title": title,
        "submitter": submitter.unwrap_or_default(),
        "authors": authors,
        "submit_to_tns": true,
        "data": data,
    })
}

/// Build a relay message announcing a new transient
pub fn build_relay_discovery(
    report: &DiscoveryReport,
    submitter: Option<&str>,
    values: &ValueSnapshot,
) -> SubmissionResult<Value> {
    let non_detection = report.validate()?;
    let photometry = &report.photometry;
    let units = label(values, ValueCategory::Units, &photometry.flux_units);

    let mut target = json!({
        "name": report.object_name,
        "ra": report.ra,
        "dec": report.dec,
        "new_discovery": true,
        "discovery_info": {
            "reporting_group": label(values, ValueCategory::Groups, &report.reporting_group),
            "discovery_source": label(values, ValueCategory::Groups, &report.discovery_data_source),
            "transient_type": label(values, ValueCategory::AtTypes, &report.at_type),
            "date": report.discovery_date.to_rfc3339(),
        },
    });
    if let Some(remarks) = &report.discovery_remarks {
        target["comments"] = Value::String(remarks.clone());
    }

    let mut photometry_entries = vec![json!({
        "target_name": report.object_name,
        "date_obs": photometry.observation_date.to_rfc3339(),
        "instrument": label(values, ValueCategory::Instruments, &photometry.instrument),
        "bandpass": label(values, ValueCategory::Filters, &photometry.filter),
        "brightness": photometry.flux,
        "brightness_error": photometry.flux_error,
        "brightness_unit": units,
        "limiting_brightness": photometry.limiting_flux,
        "exposure_time": photometry.exposure_time,
        "observer": photometry.observer,
        "comments": photometry.remarks,
    })];

    match &non_detection {
        NonDetection::Archival {
            archive,
            archival_remarks,
            remarks,
        } => {
            target["discovery_info"]["nondetection_source"] =
                Value::String(label(values, ValueCategory::Archives, archive));
            target["discovery_info"]["nondetection_comments"] = json!(remarks
                .as_deref()
                .map(|r| format!("{} {}", archival_remarks, r))
                .unwrap_or_else(|| archival_remarks.clone()));
        }
        NonDetection::LastObserved {
            observation_date,
            limiting_flux,
            filter,
            instrument,
            remarks,
        } => {
            photometry_entries.push(json!({
                "target_name": report.object_name,
                "date_obs": observation_date.to_rfc3339(),
                "instrument": label(values, ValueCategory::Instruments, instrument),
                "bandpass": label(values, ValueCategory::Filters, filter),
                "limiting_brightness": limiting_flux,
                "limiting_brightness_unit": units,
                "comments": remarks,
            }));
        }
    }

    let data = json!({
        "targets": [target],
        "photometry": photometry_entries,
    });

    Ok(envelope(
        DISCOVERY_TOPIC,
        format!("Discovery report for {}", report.object_name),
        submitter,
        &report.reporter,
        data,
    ))
}

/// Build a relay message classifying an existing object
///
/// Spectrum files are referenced by name; the bytes travel as multipart
/// parts next to the message.
pub fn build_relay_classification(
    report: &ClassificationReport,
    submitter: Option<&str>,
    values: &ValueSnapshot,
) -> SubmissionResult<Value> {
    report.validate()?;
    let spectrum = &report.spectrum;
    let name = report.registry_object_name();

    let mut target = json!({
        "name": name,
        "new_discovery": false,
    });
    if let (Some(ra), Some(dec)) = (report.ra, report.dec) {
        target["ra"] = json!(ra);
        target["dec"] = json!(dec);
    }

    let file_info: Vec<Value> = report
        .files
        .iter()
        .map(|file| json!({ "name": file.file_name() }))
        .collect();

    let spectroscopy = json!({
        "target_name": name,
        "date_obs": spectrum.observation_date.to_rfc3339(),
        "instrument": label(values, ValueCategory::Instruments, &spectrum.instrument),
        "exposure_time": spectrum.exposure_time,
        "observer": spectrum.observer,
        "reducer": spectrum.reducer,
        "spec_type": label(values, ValueCategory::SpectraTypes, &spectrum.spectrum_type),
        "classification": label(values, ValueCategory::ObjectTypes, &report.classification),
        "redshift": report.redshift,
        "reporting_group": label(values, ValueCategory::Groups, &report.reporting_group),
        "comments": spectrum.remarks,
        "file_info": file_info,
    });

    let data = json!({
        "targets": [target],
        "spectroscopy": [spectroscopy],
    });

    Ok(envelope(
        CLASSIFICATION_TOPIC,
        format!("Classification report for {}", name),
        submitter,
        &report.classifier,
        data,
    ))
}
