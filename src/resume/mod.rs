//! Resume Store
//!
//! Persists in-progress form state across an authentication redirect and
//! hands it back exactly once when the same form mounts again with a session.
//!
//! ## Lifecycle
//!
//! ```text
//! gate suspends ──► save() ──► [snapshot stored] ──► load(authenticated) ──► Resumed (deleted)
//!                                    │  ▲
//!                     load(anonymous)│  │ left in place
//!                                    ▼  │
//!                                  Deferred
//! ```
//!
//! Unreadable data never propagates as an error: it is cleared and reported
//! as [`ResumeLoad::Corrupted`] so the user simply restarts the form.

mod storage;

pub use storage::{FileStorage, MemoryStorage, SessionStorage};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use wizard_types::{FieldValues, ResumeSnapshot};

use crate::error::Result;

/// Key prefix for resume snapshots
pub const KEY_PREFIX: &str = "wizard.resume.";

const SNAPSHOT_VERSION: u32 = 1;

/// On-disk envelope around a snapshot
#[derive(Debug, Serialize, Deserialize)]
struct StoredSnapshot {
    version: u32,
    form_identity: String,
    saved_step: u32,
    saved_at: DateTime<Utc>,
    fields: FieldValues,
    checksum: String,
}

impl StoredSnapshot {
    fn seal(snapshot: &ResumeSnapshot) -> Result<Self> {
        Ok(Self {
            version: SNAPSHOT_VERSION,
            form_identity: snapshot.form_identity.clone(),
            saved_step: snapshot.saved_step,
            saved_at: snapshot.saved_at,
            fields: snapshot.fields.clone(),
            checksum: checksum(&snapshot.form_identity, snapshot.saved_step, &snapshot.fields)?,
        })
    }

    /// Verify the envelope and unwrap it
    fn open(self, expected_identity: &str) -> std::result::Result<ResumeSnapshot, String> {
        if self.version != SNAPSHOT_VERSION {
            return Err(format!("unsupported snapshot version {}", self.version));
        }
        if self.form_identity != expected_identity {
            return Err(format!(
                "snapshot belongs to `{}`, not `{}`",
                self.form_identity, expected_identity
            ));
        }
        let expected = checksum(&self.form_identity, self.saved_step, &self.fields)
            .map_err(|e| e.to_string())?;
        if expected != self.checksum {
            return Err("checksum mismatch".into());
        }
        Ok(ResumeSnapshot {
            form_identity: self.form_identity,
            saved_step: self.saved_step,
            fields: self.fields,
            saved_at: self.saved_at,
        })
    }
}

fn checksum(form_identity: &str, saved_step: u32, fields: &FieldValues) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(form_identity.as_bytes());
    hasher.update(b"\n");
    hasher.update(saved_step.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(serde_json::to_vec(fields)?);
    Ok(hex::encode(hasher.finalize()))
}

/// Result of looking for a snapshot on mount
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeLoad {
    /// Snapshot found and consumed
    Resumed(ResumeSnapshot),
    /// Snapshot present but no session yet; left for a later login
    Deferred,
    /// Nothing stored
    Empty,
    /// Stored data was unreadable and has been cleared
    Corrupted { reason: String },
}

/// Snapshot persistence keyed by form identity
#[derive(Clone)]
pub struct ResumeStore {
    storage: Arc<dyn SessionStorage>,
}

impl ResumeStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    fn key(form_identity: &str) -> String {
        format!("{}{}", KEY_PREFIX, form_identity)
    }

    /// Persist a snapshot, replacing any earlier one for this form.
    /// Attachment values are dropped.
    pub fn save(&self, form_identity: &str, saved_step: u32, fields: &FieldValues) -> Result<()> {
        let snapshot = ResumeSnapshot::new(form_identity, saved_step, fields);
        let dropped = fields.len() - snapshot.fields.len();
        let json = serde_json::to_string(&StoredSnapshot::seal(&snapshot)?)?;
        self.storage.set(&Self::key(form_identity), &json)?;

        tracing::info!(
            form = form_identity,
            saved_step,
            fields = snapshot.fields.len(),
            attachments_dropped = dropped,
            "Resume snapshot saved"
        );
        Ok(())
    }

    /// Look for a snapshot. With a session, a valid snapshot is returned and
    /// deleted; without one it is left untouched.
    pub fn load(&self, form_identity: &str, is_authenticated: bool) -> Result<ResumeLoad> {
        let key = Self::key(form_identity);
        let Some(raw) = self.storage.get(&key)? else {
            return Ok(ResumeLoad::Empty);
        };

        if !is_authenticated {
            tracing::debug!(form = form_identity, "Resume snapshot deferred until login");
            return Ok(ResumeLoad::Deferred);
        }

        let opened = serde_json::from_str::<StoredSnapshot>(&raw)
            .map_err(|e| e.to_string())
            .and_then(|stored| stored.open(form_identity));

        // Single consumption: the key goes away whether or not it was readable
        self.storage.remove(&key)?;

        match opened {
            Ok(snapshot) => {
                tracing::info!(
                    form = form_identity,
                    saved_step = snapshot.saved_step,
                    "Resume snapshot consumed"
                );
                Ok(ResumeLoad::Resumed(snapshot))
            }
            Err(reason) => {
                tracing::warn!(form = form_identity, %reason, "Discarded corrupt resume snapshot");
                Ok(ResumeLoad::Corrupted { reason })
            }
        }
    }

    /// Whether a snapshot is stored for this form
    pub fn has_snapshot(&self, form_identity: &str) -> Result<bool> {
        Ok(self.storage.get(&Self::key(form_identity))?.is_some())
    }

    /// Drop any snapshot for this form
    pub fn discard(&self, form_identity: &str) -> Result<()> {
        self.storage.remove(&Self::key(form_identity))
    }
}
