//! Attachment checks: presence, size ceiling and MIME allow-list.

use wizard_types::Attachment;

/// Default ceiling for a single upload (5 MiB)
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;

/// MIME types accepted when none are configured
pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &["application/pdf", "image/jpeg", "image/png"];

/// Why an upload was refused. The previously stored attachment, if any, is
/// left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentRejection {
    #[error("{name} is empty")]
    Empty { name: String },

    #[error("{name} is {size} bytes; the limit is {limit} bytes")]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("{name} has unsupported type {mime_type}")]
    UnsupportedType { name: String, mime_type: String },

    /// Files may only be stored in a document slot of the form
    #[error("{name} is not a document of this form")]
    UnknownDocument { name: String },
}

/// Upload policy
#[derive(Debug, Clone)]
pub struct AttachmentPolicy {
    pub max_bytes: u64,
    pub allowed_mime_types: Vec<String>,
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl AttachmentPolicy {
    pub fn new(max_bytes: u64, allowed_mime_types: Vec<String>) -> Self {
        Self {
            max_bytes,
            allowed_mime_types,
        }
    }

    /// Check an upload against the policy
    pub fn check(&self, attachment: &Attachment) -> Result<(), AttachmentRejection> {
        if attachment.size() == 0 {
            return Err(AttachmentRejection::Empty {
                name: attachment.name.clone(),
            });
        }

        if attachment.size() > self.max_bytes {
            return Err(AttachmentRejection::TooLarge {
                name: attachment.name.clone(),
                size: attachment.size(),
                limit: self.max_bytes,
            });
        }

        // Compare on the essence only: "application/pdf; charset=binary" → "application/pdf"
        let essence = attachment
            .mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if !self
            .allowed_mime_types
            .iter()
            .any(|m| m.eq_ignore_ascii_case(&essence))
        {
            return Err(AttachmentRejection::UnsupportedType {
                name: attachment.name.clone(),
                mime_type: attachment.mime_type.clone(),
            });
        }

        Ok(())
    }
}
