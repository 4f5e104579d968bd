//! Spectrum files attached to classification reports

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SubmissionResult;

/// Where an attached file came from in the host application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileOrigin {
    /// Existing stored data product
    DataProduct { id: i64 },
    /// File uploaded ad hoc for this submission, overriding stored products
    Override,
}

/// File type, inferred from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Ascii,
    Fits,
}

impl FileKind {
    /// Infer the kind from a file name (`.ascii`/`.txt` or `.fits`/`.fits.fz`)
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".fits") || lower.ends_with(".fits.fz") {
            Some(Self::Fits)
        } else if lower.ends_with(".ascii") || lower.ends_with(".txt") {
            Some(Self::Ascii)
        } else {
            None
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Ascii => "text/plain",
            Self::Fits => "application/fits",
        }
    }
}

/// A file to send along with a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub origin: FileOrigin,
    /// Location of the file contents on disk
    pub path: PathBuf,
    /// Filename to present to the remote service (defaults to the path's basename)
    #[serde(default)]
    pub file_name: Option<String>,
}

impl UploadedFile {
    pub fn from_path(origin: FileOrigin, path: impl AsRef<Path>) -> Self {
        Self {
            origin,
            path: path.as_ref().to_path_buf(),
            file_name: None,
        }
    }

    /// Filename sent to the remote service
    pub fn file_name(&self) -> String {
        if let Some(name) = &self.file_name {
            return name.clone();
        }
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn kind(&self) -> Option<FileKind> {
        FileKind::from_file_name(&self.file_name())
    }

    /// MIME type; unknown extensions are sent as plain text
    pub fn content_type(&self) -> &'static str {
        self.kind().unwrap_or(FileKind::Ascii).content_type()
    }

    pub async fn read_contents(&self) -> SubmissionResult<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

/// Spectrum files of a classification report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpectrumFiles {
    #[serde(default)]
    pub ascii: Option<UploadedFile>,
    #[serde(default)]
    pub fits: Option<UploadedFile>,
    #[serde(default)]
    pub other: Vec<UploadedFile>,
}

impl SpectrumFiles {
    /// Sort stored data products into the ascii and fits slots by extension
    ///
    /// The first file of each kind takes the slot; the rest go to `other`.
    pub fn from_data_products(files: Vec<UploadedFile>) -> Self {
        let mut sorted = Self::default();
        for file in files {
            match file.kind() {
                Some(FileKind::Ascii) if sorted.ascii.is_none() => sorted.ascii = Some(file),
                Some(FileKind::Fits) if sorted.fits.is_none() => sorted.fits = Some(file),
                _ => sorted.other.push(file),
            }
        }
        sorted
    }

    pub fn is_empty(&self) -> bool {
        self.ascii.is_none() && self.fits.is_none() && self.other.is_empty()
    }

    /// Present files in upload order: ascii, fits, then others
    pub fn iter(&self) -> impl Iterator<Item = &UploadedFile> {
        self.ascii
            .iter()
            .chain(self.fits.iter())
            .chain(self.other.iter())
    }
}
