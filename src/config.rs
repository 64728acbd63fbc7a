//! Wizard configuration.
//!
//! Loaded once at startup from environment variables (and a `.env` file
//! when present).

use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use url::Url;

use crate::error::{Result, WizardError};
use crate::registry::FormRegistry;
use crate::resume::{FileStorage, MemoryStorage, ResumeStore, SessionStorage};
use crate::submission::HttpSubmissionSink;
use crate::validation::{AttachmentPolicy, DEFAULT_ALLOWED_MIME_TYPES, DEFAULT_MAX_ATTACHMENT_BYTES};

const DEFAULT_APP_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_LOGIN_PATH: &str = "/login";
const DEFAULT_SUBMISSION_PATH: &str = "/api/applications";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FORMS_DIR: &str = "forms";

static DEFAULT_ORIGIN: LazyLock<Url> =
    LazyLock::new(|| Url::parse(DEFAULT_APP_ORIGIN).expect("default app origin"));

#[derive(Debug, Clone)]
pub struct WizardConfig {
    pub submission_url: Url,
    pub login_url: Url,
    pub submission_timeout: Duration,
    pub forms_dir: PathBuf,
    /// File-backed resume storage root; in-memory when unset
    pub resume_dir: Option<PathBuf>,
    pub max_attachment_bytes: u64,
    pub allowed_mime_types: Vec<String>,
}

impl Default for WizardConfig {
    fn default() -> Self {
        let origin = &*DEFAULT_ORIGIN;
        Self {
            submission_url: origin
                .join(DEFAULT_SUBMISSION_PATH)
                .unwrap_or_else(|_| origin.clone()),
            login_url: origin
                .join(DEFAULT_LOGIN_PATH)
                .unwrap_or_else(|_| origin.clone()),
            submission_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            forms_dir: PathBuf::from(DEFAULT_FORMS_DIR),
            resume_dir: None,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl WizardConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let submission_url = var("WIZARD_SUBMISSION_URL")
            .ok_or_else(|| WizardError::Config("WIZARD_SUBMISSION_URL is not set".into()))?;
        let submission_url = Url::parse(&submission_url)?;

        let origin = Url::parse(
            &var("WIZARD_APP_ORIGIN").unwrap_or_else(|| DEFAULT_APP_ORIGIN.to_string()),
        )?;
        // Absolute login URLs win over the origin
        let login_url = origin.join(
            &var("WIZARD_LOGIN_URL").unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_string()),
        )?;

        let submission_timeout = Duration::from_secs(env_number(
            &var,
            "WIZARD_SUBMISSION_TIMEOUT_SECS",
            DEFAULT_TIMEOUT_SECS,
        )?);
        let max_attachment_bytes =
            env_number(&var, "WIZARD_MAX_ATTACHMENT_BYTES", DEFAULT_MAX_ATTACHMENT_BYTES)?;

        let allowed_mime_types = match var("WIZARD_ALLOWED_MIME_TYPES") {
            Some(list) => list
                .split(',')
                .map(|m| m.trim().to_ascii_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            None => defaults.allowed_mime_types,
        };

        Ok(Self {
            submission_url,
            login_url,
            submission_timeout,
            forms_dir: var("WIZARD_FORMS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.forms_dir),
            resume_dir: var("WIZARD_RESUME_DIR").map(PathBuf::from),
            max_attachment_bytes,
            allowed_mime_types,
        })
    }

    pub fn attachment_policy(&self) -> AttachmentPolicy {
        AttachmentPolicy::new(self.max_attachment_bytes, self.allowed_mime_types.clone())
    }

    /// Session storage for one browsing scope
    pub fn session_storage(&self, scope: &str) -> Result<Arc<dyn SessionStorage>> {
        let storage: Arc<dyn SessionStorage> = match &self.resume_dir {
            Some(dir) => Arc::new(FileStorage::new(dir, scope)?),
            None => Arc::new(MemoryStorage::new()),
        };
        Ok(storage)
    }

    pub fn resume_store(&self, storage: Arc<dyn SessionStorage>) -> ResumeStore {
        ResumeStore::new(storage)
    }

    pub fn submission_sink(&self) -> Result<HttpSubmissionSink> {
        HttpSubmissionSink::new(self.submission_url.clone(), self.submission_timeout)
    }

    pub fn load_forms(&self) -> Result<FormRegistry> {
        FormRegistry::load_from_dir(&self.forms_dir)
    }
}

fn env_number<F>(var: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| WizardError::Config(format!("{} must be a whole number, got {:?}", key, raw))),
        None => Ok(default),
    }
}
