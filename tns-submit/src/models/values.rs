//! Registry option identifiers and categories

use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier of one registry option (group, filter, instrument, ...)
///
/// List-shaped categories are identified by positional index, mapping-shaped
/// ones by their key, so the id is kept as the registry's string form.
/// Deserializing accepts either a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ValueId(String);

impl<'de> Deserialize<'de> for ValueId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ValueIdVisitor;

        impl<'de> de::Visitor<'de> for ValueIdVisitor {
            type Value = ValueId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a registry id as string or integer")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<ValueId, E> {
                Ok(ValueId::from(value))
            }

            fn visit_string<E: de::Error>(self, value: String) -> Result<ValueId, E> {
                Ok(ValueId(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<ValueId, E> {
                Ok(ValueId(value.to_string()))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<ValueId, E> {
                Ok(ValueId(value.to_string()))
            }
        }

        deserializer.deserialize_any(ValueIdVisitor)
    }
}

impl ValueId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u32> for ValueId {
    fn from(id: u32) -> Self {
        Self(id.to_string())
    }
}

impl From<usize> for ValueId {
    fn from(id: usize) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ValueId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ValueId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Option categories published by the registry values endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueCategory {
    Groups,
    Filters,
    Instruments,
    ObjectTypes,
    SpectraTypes,
    AtTypes,
    Archives,
    Units,
}

impl ValueCategory {
    pub const ALL: [ValueCategory; 8] = [
        ValueCategory::Groups,
        ValueCategory::Filters,
        ValueCategory::Instruments,
        ValueCategory::ObjectTypes,
        ValueCategory::SpectraTypes,
        ValueCategory::AtTypes,
        ValueCategory::Archives,
        ValueCategory::Units,
    ];

    /// Key used by the registry in the values payload
    pub fn key(self) -> &'static str {
        match self {
            Self::Groups => "groups",
            Self::Filters => "filters",
            Self::Instruments => "instruments",
            Self::ObjectTypes => "object_types",
            Self::SpectraTypes => "spectra_types",
            Self::AtTypes => "at_types",
            Self::Archives => "archives",
            Self::Units => "units",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

impl fmt::Display for ValueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
