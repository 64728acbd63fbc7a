//! Crate-level error type.
//!
//! Only infrastructure failures are errors. Protocol outcomes such as a
//! denied step advance, an auth suspension or a refused submit are returned
//! as outcome enums by the wizard.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("unknown form: {0}")]
    UnknownForm(String),

    #[error("invalid form definition `{form}`: {reason}")]
    InvalidDefinition { form: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl WizardError {
    pub(crate) fn invalid_definition(form: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            form: form.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WizardError>;
