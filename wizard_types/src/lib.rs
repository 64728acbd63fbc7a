//! Wizard Types - Level 1 Foundation Types
//!
//! Pure data structures shared by every service application form: field
//! values, attachment handles and the resume snapshot persisted across an
//! authentication redirect.
//!
//! ## Architecture Level: LEVEL 1 (Foundation)
//!
//! The root `service_wizard` crate depends on this crate; this crate depends
//! on nothing in the workspace.
//!
//! ## Critical Rules
//!
//! 1. **NO PROTOCOL LOGIC** - Only data structures, constructors and accessors
//! 2. **NO I/O** - Storage and transport belong to the root crate
//! 3. **SERIALIZABLE** - Everything that may be persisted supports serde
//! 4. **ATTACHMENTS NEVER SERIALIZE** - Binary handles cannot survive a redirect

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of a form field (e.g. `pan_number`, `mobile`).
pub type FieldName = String;

/// Name of a required document (e.g. `form16`, `address_proof`).
pub type DocName = String;

/// Field values keyed by field name. Ordered so that serialized forms are
/// deterministic.
pub type FieldValues = BTreeMap<FieldName, FieldValue>;

// ============================================================================
// FIELD VALUES
// ============================================================================

/// A single value entered into a wizard field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Free text (names, identifiers, addresses, amounts as typed)
    Text(String),
    /// Calendar date (date of birth, joining date)
    Date(NaiveDate),
    /// One option out of an enumerated set (assessment year, account type)
    Choice(String),
    /// Checkbox / toggle
    Flag(bool),
    /// Uploaded binary. Never serialized: a snapshot must filter these out.
    #[serde(skip)]
    Attachment(Attachment),
}

impl FieldValue {
    /// Convenience constructor for text values
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Convenience constructor for choice values
    pub fn choice(value: impl Into<String>) -> Self {
        Self::Choice(value.into())
    }

    /// Whether this value is a binary attachment handle
    pub fn is_attachment(&self) -> bool {
        matches!(self, Self::Attachment(_))
    }

    /// The attachment handle, if this value is one
    pub fn as_attachment(&self) -> Option<&Attachment> {
        match self {
            Self::Attachment(a) => Some(a),
            _ => None,
        }
    }

    /// Textual form used by validation rules and payload assembly.
    ///
    /// Attachments have no textual form.
    pub fn as_raw(&self) -> Option<String> {
        match self {
            Self::Text(s) | Self::Choice(s) => Some(s.clone()),
            Self::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Self::Flag(b) => Some(b.to_string()),
            Self::Attachment(_) => None,
        }
    }

    /// Kind label, used in logs and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Date(_) => "date",
            Self::Choice(_) => "choice",
            Self::Flag(_) => "flag",
            Self::Attachment(_) => "attachment",
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<Attachment> for FieldValue {
    fn from(value: Attachment) -> Self {
        Self::Attachment(value)
    }
}

// ============================================================================
// ATTACHMENTS
// ============================================================================

/// Opaque handle to an uploaded file.
///
/// The wizard inspects only name, size and MIME type; the bytes are passed
/// through to the submission sink untouched.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Original file name as chosen by the user
    pub name: String,
    /// MIME type reported by the upload widget
    pub mime_type: String,
    bytes: Vec<u8>,
}

impl Attachment {
    /// Create an attachment handle from raw upload data
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Raw content
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the handle and take the raw content
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.size())
            .finish()
    }
}

// ============================================================================
// RESUME SNAPSHOT
// ============================================================================

/// In-progress form state saved when the auth gate suspends the wizard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeSnapshot {
    /// Form this snapshot belongs to (e.g. `itr_filing`)
    pub form_identity: String,
    /// Step the user is resumed at after authenticating
    pub saved_step: u32,
    /// Non-attachment field values
    pub fields: FieldValues,
    /// When the snapshot was taken
    pub saved_at: DateTime<Utc>,
}

impl ResumeSnapshot {
    /// Build a snapshot, dropping every attachment value.
    pub fn new(form_identity: impl Into<String>, saved_step: u32, fields: &FieldValues) -> Self {
        Self {
            form_identity: form_identity.into(),
            saved_step,
            fields: persistable_fields(fields),
            saved_at: Utc::now(),
        }
    }
}

/// Copy of `fields` without attachment values.
pub fn persistable_fields(fields: &FieldValues) -> FieldValues {
    fields
        .iter()
        .filter(|(_, v)| !v.is_attachment())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
