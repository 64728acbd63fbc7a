//! User-facing notices raised by the wizard.

use crate::validation::AttachmentRejection;

/// A message the UI should show once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardNotice {
    /// Step advance or submit blocked by invalid fields
    FixErrors { step: u32, fields: Vec<String> },
    /// Submit blocked by missing documents
    MissingDocuments { documents: Vec<String> },
    /// Saved progress was unreadable; the form starts over
    ResumeCorrupted,
    /// Uploaded files do not survive the sign-in redirect
    DocumentsNotRestored { documents: Vec<String> },
    AttachmentRejected(AttachmentRejection),
    /// The sink did not accept the application; the user may retry
    SubmissionFailed { reason: String },
}

impl WizardNotice {
    /// Text for a toast or banner
    pub fn message(&self) -> String {
        match self {
            Self::FixErrors { step, fields } => format!(
                "Please fix the highlighted fields in step {} ({}).",
                step,
                fields.join(", ")
            ),
            Self::MissingDocuments { documents } => {
                format!("Please upload the required documents: {}.", documents.join(", "))
            }
            Self::ResumeCorrupted => {
                "We could not restore your saved progress. Please start again.".to_string()
            }
            Self::DocumentsNotRestored { documents } => format!(
                "Uploaded documents are not kept across sign-in. Please upload again if needed: {}.",
                documents.join(", ")
            ),
            Self::AttachmentRejected(rejection) => format!("File not accepted: {}.", rejection),
            Self::SubmissionFailed { reason } => {
                format!("Your application was not submitted: {}. You can try again.", reason)
            }
        }
    }
}
