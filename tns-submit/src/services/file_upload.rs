//! Spectrum file upload ahead of a classification report
//!
//! Files go up in one multipart request with indexed slots `files[0]`,
//! `files[1]`, ... in the fixed order ascii, fits, others. The registry
//! answers with server filenames in the same order, which are mapped back to
//! the logical file they belong to.

use std::collections::HashMap;

use crate::error::{SubmissionError, SubmissionResult};
use crate::models::{SpectrumFiles, UploadedFile};
use crate::services::registry_client::RegistryClient;

/// Role of a file within a classification report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalFile {
    Ascii,
    Fits,
    /// Related file, by position in `SpectrumFiles::other`
    Other(usize),
}

/// Server-assigned filename per logical file
pub type UploadedNames = HashMap<LogicalFile, String>;

/// One multipart slot
#[derive(Debug, Clone)]
pub struct UploadSlot {
    pub field_name: String,
    pub logical: LogicalFile,
    pub file: UploadedFile,
}

/// Assign slots in upload order, skipping absent files
pub fn assign_slots(files: &SpectrumFiles) -> Vec<UploadSlot> {
    let present = files
        .ascii
        .iter()
        .map(|f| (LogicalFile::Ascii, f))
        .chain(files.fits.iter().map(|f| (LogicalFile::Fits, f)))
        .chain(
            files
                .other
                .iter()
                .enumerate()
                .map(|(i, f)| (LogicalFile::Other(i), f)),
        );

    present
        .enumerate()
        .map(|(index, (logical, file))| UploadSlot {
            field_name: format!("files[{}]", index),
            logical,
            file: file.clone(),
        })
        .collect()
}

/// Pair slots with the filenames the registry returned, by position
///
/// Every slot needs a server filename; a short list means the registry did
/// not store some of the files.
pub fn map_uploaded_names(
    slots: &[UploadSlot],
    names: &[String],
) -> SubmissionResult<UploadedNames> {
    if names.len() < slots.len() {
        let missing: Vec<&str> = slots[names.len()..]
            .iter()
            .map(|slot| slot.field_name.as_str())
            .collect();
        return Err(SubmissionError::Transport(format!(
            "Registry returned {} filenames for {} uploaded files (missing {})",
            names.len(),
            slots.len(),
            missing.join(", ")
        )));
    }

    Ok(slots
        .iter()
        .zip(names)
        .map(|(slot, name)| (slot.logical, name.clone()))
        .collect())
}

/// Upload stage bound to one registry client
pub struct FileUploadStage<'a> {
    client: &'a RegistryClient,
}

impl<'a> FileUploadStage<'a> {
    pub fn new(client: &'a RegistryClient) -> Self {
        Self { client }
    }

    /// Upload all present files and map every one to its server filename
    pub async fn upload(&self, files: &SpectrumFiles) -> SubmissionResult<UploadedNames> {
        let slots = assign_slots(files);
        if slots.is_empty() {
            return Ok(UploadedNames::new());
        }

        let names = self.client.upload_files(&slots).await?;
        if names.len() < slots.len() {
            tracing::warn!(
                sent = slots.len(),
                returned = names.len(),
                "Registry returned fewer filenames than files uploaded"
            );
        }
        map_uploaded_names(&slots, &names)
    }
}
