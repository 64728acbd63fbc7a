//! Authentication collaborator.
//!
//! The wizard never authenticates anyone. It asks an injected
//! [`AuthContext`] whether a session exists and, when it does not, where to
//! send the user so that login returns them to the right page and step.

mod gate;

pub use gate::{AuthGate, GateDecision, Transition};

use std::sync::Arc;
use url::Url;

use crate::resume::SessionStorage;

/// Storage key holding the session credential
pub const DEFAULT_TOKEN_KEY: &str = "auth_token";

const REDIRECT_PARAM: &str = "redirect";
const STEP_PARAM: &str = "step";

/// Session status and login entry point, injected into the wizard
pub trait AuthContext: Send + Sync {
    /// Whether a usable session credential is present
    fn is_authenticated(&self) -> bool;

    /// Login URL that returns the user to `target` afterwards
    fn login_redirect(&self, target: &ReturnTarget) -> Url;

    /// Credential forwarded to the submission sink
    fn session_token(&self) -> Option<String> {
        None
    }
}

/// Where login should send the user back to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnTarget {
    /// Page path of the form (e.g. `/services/itr-filing`)
    pub path: String,
    /// Step to land on
    pub step: u32,
}

impl ReturnTarget {
    pub fn new(path: impl Into<String>, step: u32) -> Self {
        Self {
            path: path.into(),
            step,
        }
    }

    /// Append `redirect` and `step` query parameters to `login_url`
    pub fn apply_to(&self, login_url: &Url) -> Url {
        let mut url = login_url.clone();
        url.query_pairs_mut()
            .append_pair(REDIRECT_PARAM, &self.path)
            .append_pair(STEP_PARAM, &self.step.to_string());
        url
    }

    /// Recover the target from a login URL, as the login page does after a
    /// successful sign-in
    pub fn from_url(url: &Url) -> Option<Self> {
        let mut path = None;
        let mut step = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                REDIRECT_PARAM => path = Some(value.into_owned()),
                STEP_PARAM => step = value.parse::<u32>().ok(),
                _ => {}
            }
        }
        // Only same-site paths are honoured
        let path = path.filter(|p| p.starts_with('/') && !p.starts_with("//"))?;
        Some(Self::new(path, step.unwrap_or(1)))
    }
}

/// Reads the session credential from a string store, the way service pages
/// check their locally stored login token
pub struct StoredCredentialAuth {
    storage: Arc<dyn SessionStorage>,
    token_key: String,
    login_url: Url,
}

impl StoredCredentialAuth {
    pub fn new(storage: Arc<dyn SessionStorage>, login_url: Url) -> Self {
        Self {
            storage,
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            login_url,
        }
    }

    /// Use a different storage key for the credential
    pub fn with_token_key(mut self, key: impl Into<String>) -> Self {
        self.token_key = key.into();
        self
    }

    fn read_token(&self) -> Option<String> {
        match self.storage.get(&self.token_key) {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read session credential");
                None
            }
        }
    }
}

impl AuthContext for StoredCredentialAuth {
    fn is_authenticated(&self) -> bool {
        self.read_token().is_some()
    }

    fn login_redirect(&self, target: &ReturnTarget) -> Url {
        target.apply_to(&self.login_url)
    }

    fn session_token(&self) -> Option<String> {
        self.read_token()
    }
}
