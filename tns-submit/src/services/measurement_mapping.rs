//! Local measurement names to registry ids
//!
//! Observatories name their filters and instruments differently from the
//! registry. An optional table per submission mode maps local names to
//! registry labels, which are then looked up in the reverse value index.

use std::collections::HashMap;

use crate::models::{ValueCategory, ValueId};
use crate::services::reference_values::ReferenceValueCache;

/// Filter and instrument name tables for one submission mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasurementMapping {
    filters: HashMap<String, String>,
    instruments: HashMap<String, String>,
}

impl MeasurementMapping {
    pub fn new(filters: HashMap<String, String>, instruments: HashMap<String, String>) -> Self {
        Self {
            filters,
            instruments,
        }
    }

    /// Registry label for a local bandpass; unmapped names pass through
    pub fn map_filter<'a>(&'a self, bandpass: &'a str) -> &'a str {
        self.filters
            .get(bandpass)
            .map(String::as_str)
            .unwrap_or(bandpass)
    }

    /// Registry label for a local instrument or telescope; unmapped names pass through
    pub fn map_instrument<'a>(&'a self, instrument: &'a str) -> &'a str {
        self.instruments
            .get(instrument)
            .map(String::as_str)
            .unwrap_or(instrument)
    }
}

/// Registry filter id for a local bandpass name
pub async fn resolve_filter(
    values: &ReferenceValueCache,
    mapping: &MeasurementMapping,
    bandpass: &str,
) -> Option<ValueId> {
    let bandpass = bandpass.trim();
    if bandpass.is_empty() {
        return None;
    }
    values
        .get_reverse(ValueCategory::Filters, mapping.map_filter(bandpass))
        .await
}

/// Registry instrument id for a local instrument, falling back to the telescope
pub async fn resolve_instrument(
    values: &ReferenceValueCache,
    mapping: &MeasurementMapping,
    instrument: Option<&str>,
    telescope: Option<&str>,
) -> Option<ValueId> {
    let snapshot = values.snapshot().await;
    [instrument, telescope]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .find_map(|name| {
            snapshot
                .reverse(ValueCategory::Instruments, mapping.map_instrument(name))
                .cloned()
        })
}

/// Author string for a report: the requested one unless blank, else the configured default
pub fn default_authors(requested: &str, configured: Option<&str>) -> String {
    let requested = requested.trim();
    if !requested.is_empty() {
        return requested.to_string();
    }
    configured.map(str::trim).unwrap_or_default().to_string()
}
