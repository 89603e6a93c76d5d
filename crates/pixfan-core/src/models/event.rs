//! Upload events
//!
//! [`ObjectFinalizedEvent`] is the wire shape the storage system emits when an
//! object finishes uploading (the GCS object resource). It is loosely typed:
//! anything may be missing. [`UploadEvent`] is the validated form the
//! dispatcher works with; converting one into the other is the only place
//! trigger metadata gets checked.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use utoipa::ToSchema;

use crate::constants::{FORMAT_SEPARATOR, METADATA_FORMATS_KEY, METADATA_NAME_KEY};
use crate::models::format::TargetFormat;

/// Object-finalized notification as delivered by the storage trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectFinalizedEvent {
    /// Key of the finalized object
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Custom object metadata; `name` and `formats` drive the fan-out
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    #[error("Event has no object name")]
    MissingSourceKey,

    #[error("Event metadata is missing 'name'")]
    MissingOutputName,

    #[error("Event metadata is missing 'formats'")]
    MissingFormats,

    #[error("Empty format token at position {position} in '{raw}'")]
    EmptyFormatToken { position: usize, raw: String },

    #[error("Unsupported format '{0}'")]
    UnknownFormat(String),

    #[error("Format '{0}' is listed more than once")]
    DuplicateFormat(TargetFormat),
}

/// A validated upload event: one source object, one output base name and a
/// non-empty, duplicate-free, ordered list of target formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEvent {
    source_key: String,
    bucket: Option<String>,
    output_name: String,
    formats: Vec<TargetFormat>,
}

impl UploadEvent {
    pub fn new(
        source_key: impl Into<String>,
        output_name: impl Into<String>,
        formats: &str,
    ) -> Result<Self, EventError> {
        let source_key = source_key.into();
        if source_key.trim().is_empty() {
            return Err(EventError::MissingSourceKey);
        }
        let output_name = output_name.into().trim().to_string();
        if output_name.is_empty() {
            return Err(EventError::MissingOutputName);
        }

        Ok(Self {
            source_key,
            bucket: None,
            output_name,
            formats: parse_format_list(formats)?,
        })
    }

    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn formats(&self) -> &[TargetFormat] {
        &self.formats
    }
}

impl TryFrom<ObjectFinalizedEvent> for UploadEvent {
    type Error = EventError;

    fn try_from(event: ObjectFinalizedEvent) -> Result<Self, Self::Error> {
        let output_name = event
            .metadata
            .get(METADATA_NAME_KEY)
            .ok_or(EventError::MissingOutputName)?;
        let formats = event
            .metadata
            .get(METADATA_FORMATS_KEY)
            .ok_or(EventError::MissingFormats)?;

        let mut upload = UploadEvent::new(event.name.clone(), output_name.as_str(), formats)?;
        upload.bucket = event.bucket;
        Ok(upload)
    }
}

/// Split a `formats` metadata value into an ordered list of formats.
///
/// Tokens are trimmed; empty, unknown and repeated tokens are rejected so a
/// bad event never reaches the queue.
pub fn parse_format_list(raw: &str) -> Result<Vec<TargetFormat>, EventError> {
    if raw.trim().is_empty() {
        return Err(EventError::MissingFormats);
    }

    let mut seen = HashSet::new();
    let mut formats = Vec::new();
    for (position, token) in raw.split(FORMAT_SEPARATOR).enumerate() {
        if token.trim().is_empty() {
            return Err(EventError::EmptyFormatToken {
                position,
                raw: raw.to_string(),
            });
        }
        let format = TargetFormat::parse(token).map_err(|e| EventError::UnknownFormat(e.0))?;
        if !seen.insert(format) {
            return Err(EventError::DuplicateFormat(format));
        }
        formats.push(format);
    }

    Ok(formats)
}
