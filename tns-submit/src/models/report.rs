//! Report requests handed over by the host application
//!
//! A request arrives already populated with target metadata. The only
//! invariant checked here is the non-detection rule for discovery reports;
//! the registry validates the rest.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

use super::files::SpectrumFiles;
use super::values::ValueId;
use crate::error::{SubmissionError, SubmissionResult};

/// Parse a timestamp, reading one without an offset as UTC
///
/// Accepts RFC 3339 (`2024-03-01T12:34:56Z`, `...+02:00`) and naive
/// `2024-03-01T12:34:56` or `2024-03-01 12:34:56`, optionally with fractional
/// seconds.
pub fn parse_utc_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_utc_timestamp(&raw)
        .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw)))
}

fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_utc_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw))),
    }
}

/// A report plus the identity of the person submitting it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    /// Submitter contact (e-mail), forwarded to the relay
    #[serde(default)]
    pub submitter: Option<String>,
    pub report: Report,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Report {
    Discovery(DiscoveryReport),
    Classification(ClassificationReport),
}

impl Report {
    /// Name of the target as currently known to the host application
    pub fn object_name(&self) -> &str {
        match self {
            Report::Discovery(report) => &report.object_name,
            Report::Classification(report) => &report.object_name,
        }
    }
}

/// New transient (AT) report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    /// Internal name of the target, replaced by the registry name on success
    pub object_name: String,
    /// Right ascension in degrees
    pub ra: f64,
    /// Declination in degrees
    pub dec: f64,
    pub reporting_group: ValueId,
    pub discovery_data_source: ValueId,
    /// Free-text author list
    pub reporter: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub discovery_date: DateTime<Utc>,
    pub at_type: ValueId,
    #[serde(default)]
    pub discovery_remarks: Option<String>,
    pub photometry: DiscoveryPhotometry,
    #[serde(default)]
    pub non_detection: NonDetectionInput,
}

/// The detection that triggered the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryPhotometry {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub observation_date: DateTime<Utc>,
    pub flux: f64,
    #[serde(default)]
    pub flux_error: Option<f64>,
    pub flux_units: ValueId,
    pub filter: ValueId,
    pub instrument: ValueId,
    #[serde(default)]
    pub limiting_flux: Option<f64>,
    #[serde(default)]
    pub exposure_time: Option<f64>,
    #[serde(default)]
    pub observer: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
}

/// Non-detection fields as entered; exactly one complete set must be present
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NonDetectionInput {
    #[serde(default)]
    pub archive: Option<ValueId>,
    #[serde(default)]
    pub archival_remarks: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub observation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limiting_flux: Option<f64>,
    #[serde(default)]
    pub filter: Option<ValueId>,
    #[serde(default)]
    pub instrument: Option<ValueId>,
    /// Comments shared by either form
    #[serde(default)]
    pub remarks: Option<String>,
}

/// Validated non-detection evidence
#[derive(Debug, Clone, PartialEq)]
pub enum NonDetection {
    /// Object absent from an archival image
    Archival {
        archive: ValueId,
        archival_remarks: String,
        remarks: Option<String>,
    },
    /// Last observation that did not detect the object
    LastObserved {
        observation_date: DateTime<Utc>,
        limiting_flux: f64,
        filter: ValueId,
        instrument: ValueId,
        remarks: Option<String>,
    },
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl NonDetectionInput {
    fn archival(&self) -> Option<NonDetection> {
        let archive = self.archive.clone()?;
        let archival_remarks = non_blank(&self.archival_remarks)?.to_string();
        Some(NonDetection::Archival {
            archive,
            archival_remarks,
            remarks: self.remarks.clone(),
        })
    }

    fn last_observed(&self) -> Option<NonDetection> {
        Some(NonDetection::LastObserved {
            observation_date: self.observation_date?,
            limiting_flux: self.limiting_flux?,
            filter: self.filter.clone()?,
            instrument: self.instrument.clone()?,
            remarks: self.remarks.clone(),
        })
    }

    /// Resolve the entered fields into exactly one kind of non-detection
    pub fn validate(&self) -> SubmissionResult<NonDetection> {
        match (self.archival(), self.last_observed()) {
            (Some(archival), None) => Ok(archival),
            (None, Some(last_observed)) => Ok(last_observed),
            (Some(_), Some(_)) => Err(SubmissionError::Validation(
                "Provide either an archival non-detection or a last non-detection, not both"
                    .to_string(),
            )),
            (None, None) => Err(SubmissionError::Validation(
                "Non-detection required: set archive and archival remarks, or observation \
                 date, limiting flux, filter and instrument"
                    .to_string(),
            )),
        }
    }
}

impl DiscoveryReport {
    pub fn validate(&self) -> SubmissionResult<NonDetection> {
        self.non_detection.validate()
    }
}

/// Spectroscopic classification of an existing object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Target name; a leading `AT`/`SN` prefix is dropped when reporting
    pub object_name: String,
    #[serde(default)]
    pub ra: Option<f64>,
    #[serde(default)]
    pub dec: Option<f64>,
    pub classifier: String,
    pub classification: ValueId,
    #[serde(default)]
    pub redshift: Option<f64>,
    pub reporting_group: ValueId,
    #[serde(default)]
    pub remarks: Option<String>,
    pub spectrum: SpectrumRecord,
    #[serde(default)]
    pub files: SpectrumFiles,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrumRecord {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub observation_date: DateTime<Utc>,
    pub instrument: ValueId,
    #[serde(default)]
    pub exposure_time: Option<f64>,
    pub observer: String,
    #[serde(default)]
    pub reducer: Option<String>,
    pub spectrum_type: ValueId,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl ClassificationReport {
    /// Registry object name without its type prefix (`AT2024abc` -> `2024abc`)
    pub fn registry_object_name(&self) -> &str {
        let name = self.object_name.trim();
        for prefix in ["AT", "SN"] {
            if let Some(stripped) = name.strip_prefix(prefix) {
                return stripped.trim_start();
            }
        }
        name
    }

    pub fn validate(&self) -> SubmissionResult<()> {
        if self.registry_object_name().is_empty() {
            return Err(SubmissionError::Validation(
                "Classification requires an object name".to_string(),
            ));
        }
        if self.files.ascii.is_none() {
            return Err(SubmissionError::Validation(
                "Classification requires an ASCII spectrum file".to_string(),
            ));
        }
        Ok(())
    }
}
