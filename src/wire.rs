//! The stable wire form a library document round-trips through.
//! `spec.md` §6.3: templates serialize with a `templateType`
//! discriminator, camelCase identity/segment fields, and a document is
//! `{version, templates: [...]}`.

use crate::model::Template;
use serde::{Deserialize, Serialize};

/// The document-level schema version, distinct from a template's own
/// `version` field.
pub const WIRE_FORMAT_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryDocument {
    pub version: String,
    pub templates: Vec<Template>,
}

impl LibraryDocument {
    pub fn new(templates: Vec<Template>) -> Self {
        LibraryDocument {
            version: WIRE_FORMAT_VERSION.to_string(),
            templates,
        }
    }

    /// Serializes to the stable wire form (`spec.md` §6.3). Mirrors the
    /// teacher's own `ServerMessage::to_json` — serialization of an
    /// already-valid in-memory value is a logic bug if it ever fails,
    /// not an expected-input failure, so it panics rather than
    /// returning a `Diagnostic`.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("serialize library document")
    }

    /// Parses the stable wire form. Unlike `to_json`, the input here
    /// crosses a process boundary and can be malformed, so failure is
    /// reported rather than panicking.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
