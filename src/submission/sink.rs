//! Submission Sink
//!
//! The external service that durably records a completed application. The
//! wizard only distinguishes "accepted with a reference id" from "failed
//! with a message"; the HTTP implementation maps the wire shape onto that.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;
use uuid::Uuid;
use wizard_types::Attachment;

use crate::error::Result;

/// Everything the sink receives for one application
#[derive(Debug, Clone)]
pub struct SubmissionPayload {
    pub form_identity: String,
    /// Idempotency key for this submit attempt
    pub submission_id: Uuid,
    /// Normalized text values
    pub fields: BTreeMap<String, String>,
    /// Attachments keyed by field / document name
    pub attachments: Vec<(String, Attachment)>,
    /// Credential forwarded to the sink, if the session has one
    pub session_token: Option<String>,
}

/// Successful submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkReceipt {
    pub reference_id: String,
}

/// Why the sink did not accept a submission
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// Network failure, timeout or server fault
    #[error("submission could not be delivered: {0}")]
    Transport(String),

    /// The server looked at the application and refused it
    #[error("submission rejected: {message}")]
    Rejected {
        message: String,
        field_errors: BTreeMap<String, String>,
    },
}

/// Abstract submission sink
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    /// Deliver one application. Called once per submit attempt.
    async fn submit(&self, payload: SubmissionPayload) -> std::result::Result<SinkReceipt, SinkError>;
}

/// Multipart HTTP sink
pub struct HttpSubmissionSink {
    http: Client,
    endpoint: Url,
}

impl HttpSubmissionSink {
    /// Create a sink posting to `endpoint`
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, endpoint })
    }

    fn build_form(payload: &SubmissionPayload) -> std::result::Result<Form, SinkError> {
        let mut form = Form::new();
        for (name, value) in &payload.fields {
            form = form.text(name.clone(), value.clone());
        }
        for (name, attachment) in &payload.attachments {
            let part = Part::bytes(attachment.bytes().to_vec())
                .file_name(attachment.name.clone())
                .mime_str(&attachment.mime_type)
                .map_err(|e| {
                    SinkError::Transport(format!("invalid MIME type for {}: {}", name, e))
                })?;
            form = form.part(name.clone(), part);
        }
        Ok(form)
    }
}

#[async_trait]
impl SubmissionSink for HttpSubmissionSink {
    async fn submit(&self, payload: SubmissionPayload) -> std::result::Result<SinkReceipt, SinkError> {
        let form = Self::build_form(&payload)?;

        let mut request = self
            .http
            .post(self.endpoint.clone())
            .header("Accept", "application/json")
            .header("Idempotency-Key", payload.submission_id.to_string())
            .header("X-Form-Identity", payload.form_identity.as_str())
            .multipart(form);

        if let Some(token) = &payload.session_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        map_response(status, &body)
    }
}

/// Map a sink response onto the receipt / error split
fn map_response(status: StatusCode, body: &str) -> std::result::Result<SinkReceipt, SinkError> {
    let json: Option<Value> = serde_json::from_str(body).ok();

    if status.is_success() {
        let reference_id = json.as_ref().and_then(|v| {
            ["referenceId", "reference_id", "id"]
                .iter()
                .find_map(|k| match v.get(*k) {
                    Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    _ => None,
                })
        });
        return reference_id
            .map(|reference_id| SinkReceipt { reference_id })
            .ok_or_else(|| SinkError::Transport("response carried no reference id".into()));
    }

    if status.is_client_error() {
        let message = json
            .as_ref()
            .and_then(|v| v.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request rejected")
                    .to_string()
            });
        let field_errors = json
            .as_ref()
            .and_then(|v| v.get("errors"))
            .and_then(Value::as_object)
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|(field, msg)| {
                        let msg = match msg {
                            Value::String(s) => s.clone(),
                            Value::Array(items) => items.first()?.as_str()?.to_string(),
                            _ => return None,
                        };
                        Some((field.clone(), msg))
                    })
                    .collect()
            })
            .unwrap_or_default();
        return Err(SinkError::Rejected {
            message,
            field_errors,
        });
    }

    Err(SinkError::Transport(format!(
        "server error {}: {}",
        status,
        body.chars().take(200).collect::<String>()
    )))
}
