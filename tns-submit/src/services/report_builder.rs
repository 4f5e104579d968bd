//! Registry bulk report documents
//!
//! Pure functions from the report model to the registry's nested schema.
//! Every list in the schema is an object keyed by a zero-based index string,
//! and timestamps use `YYYY-MM-DD HH:MM:SS` in UTC.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::error::SubmissionResult;
use crate::models::{ClassificationReport, DiscoveryReport, NonDetection, UploadedFile};
use crate::services::file_upload::{LogicalFile, UploadedNames};

pub const REGISTRY_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_registry_datetime(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(REGISTRY_DATETIME_FORMAT).to_string()
}

/// Wrap items into an index-keyed object (`{"0": .., "1": ..}`)
fn indexed(items: impl IntoIterator<Item = Value>) -> Value {
    let map: Map<String, Value> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| (index.to_string(), item))
        .collect();
    Value::Object(map)
}

fn non_detection_section(report: &DiscoveryReport, non_detection: &NonDetection) -> Value {
    match non_detection {
        NonDetection::Archival {
            archive,
            archival_remarks,
            remarks,
        } => json!({
            "archiveid": archive,
            "archival_remarks": archival_remarks,
            "comments": remarks,
        }),
        NonDetection::LastObserved {
            observation_date,
            limiting_flux,
            filter,
            instrument,
            remarks,
        } => json!({
            "obsdate": format_registry_datetime(observation_date),
            "limiting_flux": limiting_flux,
            "flux_units": report.photometry.flux_units,
            "filter_value": filter,
            "instrument_value": instrument,
            "comments": remarks,
        }),
    }
}

/// Build an `at_report` document for a new transient
///
/// Validates the non-detection before building; nothing is sent on failure.
pub fn build_discovery(report: &DiscoveryReport) -> SubmissionResult<Value> {
    let non_detection = report.validate()?;
    let photometry = &report.photometry;

    let detection = json!({
        "obsdate": format_registry_datetime(&photometry.observation_date),
        "flux": photometry.flux,
        "flux_error": photometry.flux_error,
        "flux_units": photometry.flux_units,
        "filter_value": photometry.filter,
        "instrument_value": photometry.instrument,
        "limiting_flux": photometry.limiting_flux,
        "exptime": photometry.exposure_time,
        "observer": photometry.observer,
        "comments": photometry.remarks,
    });

    let at_report = json!({
        "ra": {"value": report.ra},
        "dec": {"value": report.dec},
        "reporting_group_id": report.reporting_group,
        "discovery_data_source_id": report.discovery_data_source,
        "reporter": report.reporter,
        "discovery_datetime": format_registry_datetime(&report.discovery_date),
        "at_type": report.at_type,
        "internal_name": report.object_name,
        "remarks": report.discovery_remarks,
        "non_detection": non_detection_section(report, &non_detection),
        "photometry": {
            "photometry_group": indexed([detection]),
        },
    });

    Ok(json!({ "at_report": indexed([at_report]) }))
}

/// Server filename for a file, or its local name when it was not uploaded
fn registry_file_name(uploaded: &UploadedNames, logical: LogicalFile, file: &UploadedFile) -> String {
    uploaded
        .get(&logical)
        .cloned()
        .unwrap_or_else(|| file.file_name())
}

/// Build a `classification_report` document
pub fn build_classification(
    report: &ClassificationReport,
    uploaded: &UploadedNames,
) -> SubmissionResult<Value> {
    report.validate()?;
    let spectrum = &report.spectrum;

    let mut spectra_entry = json!({
        "obsdate": format_registry_datetime(&spectrum.observation_date),
        "instrumentid": spectrum.instrument,
        "exptime": spectrum.exposure_time,
        "observer": spectrum.observer,
        "reducer": spectrum.reducer,
        "spectypeid": spectrum.spectrum_type,
        "remarks": spectrum.remarks,
    });
    if let Some(ascii) = &report.files.ascii {
        spectra_entry["ascii_file"] =
            Value::String(registry_file_name(uploaded, LogicalFile::Ascii, ascii));
    }
    if let Some(fits) = &report.files.fits {
        spectra_entry["fits_file"] =
            Value::String(registry_file_name(uploaded, LogicalFile::Fits, fits));
    }

    let mut classification = json!({
        "name": report.registry_object_name(),
        "classifier": report.classifier,
        "objtypeid": report.classification,
        "redshift": report.redshift,
        "groupid": report.reporting_group,
        "remarks": report.remarks,
        "spectra": {
            "spectra-group": indexed([spectra_entry]),
        },
    });

    if !report.files.other.is_empty() {
        let related = report.files.other.iter().enumerate().map(|(i, file)| {
            json!({
                "related_file_name": registry_file_name(uploaded, LogicalFile::Other(i), file),
                "related_file_comments": "",
            })
        });
        classification["related_files"] = indexed(related);
    }

    Ok(json!({ "classification_report": indexed([classification]) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SubmissionError;
    use crate::models::{
        DiscoveryPhotometry, FileOrigin, NonDetectionInput, SpectrumFiles, SpectrumRecord,
        ValueId,
    };
    use chrono::TimeZone;

    fn discovery(non_detection: NonDetectionInput) -> DiscoveryReport {
        DiscoveryReport {
            object_name: "ZTF25abcdefg".to_string(),
            ra: 150.0,
            dec: 20.0,
            reporting_group: ValueId::from("66"),
            discovery_data_source: ValueId::from("48"),
            reporter: "A. Observer".to_string(),
            discovery_date: Utc.with_ymd_and_hms(2024, 3, 1, 12, 34, 56).unwrap(),
            at_type: ValueId::from(1u32),
            discovery_remarks: None,
            photometry: DiscoveryPhotometry {
                observation_date: Utc.with_ymd_and_hms(2024, 3, 1, 12, 34, 56).unwrap(),
                flux: 19.2,
                flux_error: Some(0.1),
                flux_units: ValueId::from("1"),
                filter: ValueId::from("22"),
                instrument: ValueId::from("172"),
                limiting_flux: None,
                exposure_time: Some(60.0),
                observer: Some("Robot".to_string()),
                remarks: None,
            },
            non_detection,
        }
    }

    fn last_observed() -> NonDetectionInput {
        NonDetectionInput {
            observation_date: Some(Utc.with_ymd_and_hms(2024, 2, 27, 3, 0, 0).unwrap()),
            limiting_flux: Some(21.0),
            filter: Some(ValueId::from("22")),
            instrument: Some(ValueId::from("172")),
            remarks: Some("deep".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_format_registry_datetime() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 34, 56).unwrap();
        assert_eq!(format_registry_datetime(&ts), "2024-03-01 12:34:56");
    }

    #[test]
    fn test_discovery_document_shape() {
        let doc = build_discovery(&discovery(last_observed())).unwrap();
        let at = &doc["at_report"]["0"];

        assert_eq!(at["ra"]["value"], 150.0);
        assert_eq!(at["dec"]["value"], 20.0);
        assert_eq!(at["reporting_group_id"], "66");
        assert_eq!(at["discovery_datetime"], "2024-03-01 12:34:56");
        assert_eq!(at["internal_name"], "ZTF25abcdefg");

        let phot = &at["photometry"]["photometry_group"]["0"];
        assert_eq!(phot["flux"], 19.2);
        assert_eq!(phot["filter_value"], "22");
        assert_eq!(phot["exptime"], 60.0);

        let nd = &at["non_detection"];
        assert_eq!(nd["obsdate"], "2024-02-27 03:00:00");
        assert_eq!(nd["limiting_flux"], 21.0);
        assert_eq!(nd["flux_units"], "1");
        assert!(nd.get("archiveid").is_none());
    }

    #[test]
    fn test_archival_non_detection_section() {
        let doc = build_discovery(&discovery(NonDetectionInput {
            archive: Some(ValueId::from("2")),
            archival_remarks: Some("Not in SDSS".to_string()),
            ..Default::default()
        }))
        .unwrap();
        let nd = &doc["at_report"]["0"]["non_detection"];

        assert_eq!(nd["archiveid"], "2");
        assert_eq!(nd["archival_remarks"], "Not in SDSS");
        assert!(nd.get("obsdate").is_none());
    }

    #[test]
    fn test_discovery_without_non_detection_fails() {
        let result = build_discovery(&discovery(NonDetectionInput::default()));
        assert!(matches!(result, Err(SubmissionError::Validation(_))));
    }

    fn classification(files: SpectrumFiles) -> ClassificationReport {
        ClassificationReport {
            object_name: "AT2024abc".to_string(),
            ra: None,
            dec: None,
            classifier: "A. Classifier".to_string(),
            classification: ValueId::from("3"),
            redshift: Some(0.02),
            reporting_group: ValueId::from("66"),
            remarks: None,
            spectrum: SpectrumRecord {
                observation_date: Utc.with_ymd_and_hms(2024, 3, 2, 5, 6, 7).unwrap(),
                instrument: ValueId::from("172"),
                exposure_time: Some(900.0),
                observer: "Robot".to_string(),
                reducer: None,
                spectrum_type: ValueId::from("1"),
                remarks: None,
            },
            files,
        }
    }

    #[test]
    fn test_classification_uses_uploaded_names() {
        let files = SpectrumFiles {
            ascii: Some(UploadedFile::from_path(FileOrigin::Override, "/tmp/spec.txt")),
            fits: Some(UploadedFile::from_path(FileOrigin::Override, "/tmp/spec.fits")),
            other: vec![UploadedFile::from_path(FileOrigin::Override, "/tmp/finder.png")],
        };
        let uploaded = UploadedNames::from([
            (LogicalFile::Ascii, "srv_spec.txt".to_string()),
            (LogicalFile::Fits, "srv_spec.fits".to_string()),
            (LogicalFile::Other(0), "srv_finder.png".to_string()),
        ]);

        let doc = build_classification(&classification(files), &uploaded).unwrap();
        let report = &doc["classification_report"]["0"];

        assert_eq!(report["name"], "2024abc");
        assert_eq!(report["objtypeid"], "3");
        let spectrum = &report["spectra"]["spectra-group"]["0"];
        assert_eq!(spectrum["obsdate"], "2024-03-02 05:06:07");
        assert_eq!(spectrum["ascii_file"], "srv_spec.txt");
        assert_eq!(spectrum["fits_file"], "srv_spec.fits");
        assert_eq!(report["related_files"]["0"]["related_file_name"], "srv_finder.png");
    }

    #[test]
    fn test_classification_falls_back_to_local_names() {
        let files = SpectrumFiles {
            ascii: Some(UploadedFile::from_path(FileOrigin::Override, "/tmp/spec.txt")),
            ..Default::default()
        };
        let doc = build_classification(&classification(files), &UploadedNames::new()).unwrap();
        let spectrum = &doc["classification_report"]["0"]["spectra"]["spectra-group"]["0"];

        assert_eq!(spectrum["ascii_file"], "spec.txt");
        assert!(spectrum.get("fits_file").is_none());
        assert!(doc["classification_report"]["0"].get("related_files").is_none());
    }

    #[test]
    fn test_classification_requires_ascii_file() {
        let result = build_classification(
            &classification(SpectrumFiles::default()),
            &UploadedNames::new(),
        );
        assert!(matches!(result, Err(SubmissionError::Validation(_))));
    }
}
