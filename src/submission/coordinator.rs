//! Submission Coordinator
//!
//! Assembles the final payload and performs exactly one sink call per
//! submit. No retries: a failure goes back to the user, who may press
//! submit again.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use wizard_types::FieldValues;

use super::sink::{SinkError, SubmissionPayload, SubmissionSink};
use crate::validation::FieldValidator;

/// Three-way submission result, plus cancellation on teardown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    Accepted {
        reference_id: String,
    },
    Failed {
        reason: String,
        /// Server-side field errors, if the sink reported any
        field_errors: BTreeMap<String, String>,
    },
    /// The owning wizard was torn down before the sink answered
    Cancelled,
}

pub struct SubmissionCoordinator {
    sink: Arc<dyn SubmissionSink>,
}

impl SubmissionCoordinator {
    pub fn new(sink: Arc<dyn SubmissionSink>) -> Self {
        Self { sink }
    }

    /// Build the payload: normalized text for every value, raw bytes for
    /// every attachment
    pub fn assemble(
        form_identity: &str,
        fields: &FieldValues,
        validator: &FieldValidator,
        session_token: Option<String>,
    ) -> SubmissionPayload {
        let mut text = BTreeMap::new();
        let mut attachments = Vec::new();

        for (name, value) in fields {
            if let Some(attachment) = value.as_attachment() {
                attachments.push((name.clone(), attachment.clone()));
            } else if let Some(raw) = value.as_raw() {
                text.insert(name.clone(), validator.normalize(name, &raw));
            }
        }

        SubmissionPayload {
            form_identity: form_identity.to_string(),
            submission_id: Uuid::new_v4(),
            fields: text,
            attachments,
            session_token,
        }
    }

    /// Deliver `payload` once. Cancelling `cancel` abandons the call and
    /// yields [`SubmissionResult::Cancelled`].
    pub async fn submit(
        &self,
        payload: SubmissionPayload,
        cancel: CancellationToken,
    ) -> SubmissionResult {
        let form = payload.form_identity.clone();
        let submission_id = payload.submission_id;
        tracing::info!(
            form = %form,
            %submission_id,
            fields = payload.fields.len(),
            attachments = payload.attachments.len(),
            "Submitting application"
        );

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.sink.submit(payload) => Some(result),
        };

        match outcome {
            None => {
                tracing::warn!(form = %form, %submission_id, "Submission cancelled");
                SubmissionResult::Cancelled
            }
            Some(Ok(receipt)) => {
                tracing::info!(
                    form = %form,
                    %submission_id,
                    reference_id = %receipt.reference_id,
                    "Submission accepted"
                );
                SubmissionResult::Accepted {
                    reference_id: receipt.reference_id,
                }
            }
            Some(Err(err)) => {
                tracing::warn!(form = %form, %submission_id, error = %err, "Submission failed");
                match err {
                    SinkError::Transport(reason) => SubmissionResult::Failed {
                        reason,
                        field_errors: BTreeMap::new(),
                    },
                    SinkError::Rejected {
                        message,
                        field_errors,
                    } => SubmissionResult::Failed {
                        reason: message,
                        field_errors,
                    },
                }
            }
        }
    }
}
