//! Wizard State Machine
//!
//! Drives one form instance through its steps: field edits, per-step
//! validation, auth-gated advance, snapshot-on-redirect and the final
//! submission. Every transition returns an outcome value; nothing here
//! panics or leaves the session half-updated.
//!
//! ```text
//!   mount ──► step 1 ──advance──► step 2 ── ... ──► step N ──submit──► reset
//!                ▲                  │
//!                └─────retreat──────┘
//!   gated advance/submit without a session:
//!     snapshot(resume_at) ──► login redirect ──► mount ──► resumed at resume_at
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;
use wizard_types::{Attachment, FieldValue, FieldValues};

use super::notice::WizardNotice;
use super::session::WizardSession;
use crate::auth::{AuthContext, AuthGate, GateDecision, ReturnTarget, Transition};
use crate::error::Result;
use crate::registry::FormDefinition;
use crate::resume::{ResumeLoad, ResumeStore};
use crate::submission::{SubmissionCoordinator, SubmissionPayload, SubmissionResult, SubmissionSink};
use crate::validation::{AttachmentPolicy, AttachmentRejection, FieldValidator};

// ----------------------------------------------------------------------------
// Outcomes
// ----------------------------------------------------------------------------

/// What happened when the wizard was mounted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOutcome {
    /// No snapshot; step 1 with empty fields
    Fresh,
    /// Snapshot restored and consumed
    Resumed {
        step: u32,
        /// Documents the user may need to upload again
        documents_to_reupload: Vec<String>,
    },
    /// Snapshot exists but there is no session yet; left for after login
    ResumeDeferred,
    /// Snapshot was unreadable and has been cleared
    ResumeCorrupted,
}

/// Result of a forward step transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved (or stayed capped at the last step)
    Advanced { to: u32, scroll_anchor: String },
    /// Current step has invalid fields
    Denied {
        step: u32,
        errors: BTreeMap<String, String>,
    },
    /// Sign-in required; progress saved for `resume_at`
    AuthRequired { resume_at: u32, redirect: Url },
    /// A submission is in flight
    Busy,
}

/// Result of a final submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted {
        reference_id: String,
    },
    /// Blocked before any network call
    Refused {
        errors: BTreeMap<String, String>,
        missing_documents: Vec<String>,
        /// Lowest step holding an invalid field or missing document
        first_invalid_step: Option<u32>,
    },
    AuthRequired {
        resume_at: u32,
        redirect: Url,
    },
    /// Sink did not accept; the session is intact for a retry
    Failed {
        reason: String,
        field_errors: BTreeMap<String, String>,
    },
    /// Torn down while the sink call was pending
    Cancelled,
    Busy,
}

/// Result of a field or document edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldChange {
    Applied,
    /// Attachment refused; any earlier attachment is kept
    Rejected(AttachmentRejection),
    Busy,
}

/// A submit that passed validation and the auth gate
#[derive(Debug)]
pub struct PendingSubmission {
    pub payload: SubmissionPayload,
    pub cancel: CancellationToken,
}

/// Either a ready payload or the outcome that stopped it
#[derive(Debug)]
pub enum SubmitStart {
    Ready(PendingSubmission),
    Stopped(SubmitOutcome),
}

// ----------------------------------------------------------------------------
// Collaborators
// ----------------------------------------------------------------------------

/// Everything a wizard needs besides its form definition
#[derive(Clone)]
pub struct WizardDeps {
    pub auth: Arc<dyn AuthContext>,
    pub resume: ResumeStore,
    pub sink: Arc<dyn SubmissionSink>,
    pub attachment_policy: AttachmentPolicy,
}

impl WizardDeps {
    pub fn new(auth: Arc<dyn AuthContext>, resume: ResumeStore, sink: Arc<dyn SubmissionSink>) -> Self {
        Self {
            auth,
            resume,
            sink,
            attachment_policy: AttachmentPolicy::default(),
        }
    }

    pub fn with_attachment_policy(mut self, policy: AttachmentPolicy) -> Self {
        self.attachment_policy = policy;
        self
    }
}

// ----------------------------------------------------------------------------
// Wizard
// ----------------------------------------------------------------------------

/// One live form instance
pub struct Wizard {
    definition: Arc<FormDefinition>,
    validator: FieldValidator,
    gate: AuthGate,
    resume: ResumeStore,
    coordinator: SubmissionCoordinator,
    attachment_policy: AttachmentPolicy,
    session: WizardSession,
    notices: Vec<WizardNotice>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Wizard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wizard")
            .field("form", &self.definition.form)
            .field("current_step", &self.session.current_step)
            .field("fields", &self.session.fields.len())
            .field("submission_in_flight", &self.session.submission_in_flight)
            .finish()
    }
}

impl Wizard {
    /// Create the wizard and consume any resume snapshot for this form
    pub fn mount(definition: Arc<FormDefinition>, deps: WizardDeps) -> Result<(Self, MountOutcome)> {
        definition.validate()?;
        let mut wizard = Self {
            validator: definition.validator(),
            gate: AuthGate::new(definition.clone(), deps.auth),
            resume: deps.resume,
            coordinator: SubmissionCoordinator::new(deps.sink),
            attachment_policy: deps.attachment_policy,
            session: WizardSession::new(),
            notices: Vec::new(),
            cancel: CancellationToken::new(),
            definition,
        };

        let form = wizard.definition.form.as_str();
        let authed = wizard.gate.auth().is_authenticated();
        let outcome = match wizard.resume.load(form, authed)? {
            ResumeLoad::Empty => MountOutcome::Fresh,
            ResumeLoad::Deferred => MountOutcome::ResumeDeferred,
            ResumeLoad::Corrupted { .. } => {
                wizard.notices.push(WizardNotice::ResumeCorrupted);
                MountOutcome::ResumeCorrupted
            }
            ResumeLoad::Resumed(snapshot) => {
                let step = snapshot.saved_step.clamp(1, wizard.definition.step_count());
                wizard.session.current_step = step;
                wizard.session.fields = snapshot.fields;

                let documents: Vec<String> = wizard
                    .definition
                    .required_documents()
                    .filter(|(doc_step, _)| *doc_step <= step)
                    .map(|(_, name)| name.to_string())
                    .collect();
                if !documents.is_empty() {
                    wizard.notices.push(WizardNotice::DocumentsNotRestored {
                        documents: documents.clone(),
                    });
                }
                MountOutcome::Resumed {
                    step,
                    documents_to_reupload: documents,
                }
            }
        };

        tracing::info!(
            form = %wizard.definition.form,
            step = wizard.session.current_step,
            ?outcome,
            "Wizard mounted"
        );
        Ok((wizard, outcome))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn definition(&self) -> &FormDefinition {
        &self.definition
    }

    pub fn session(&self) -> &WizardSession {
        &self.session
    }

    pub fn current_step(&self) -> u32 {
        self.session.current_step
    }

    pub fn step_count(&self) -> u32 {
        self.definition.step_count()
    }

    pub fn fields(&self) -> &FieldValues {
        &self.session.fields
    }

    pub fn value(&self, field: &str) -> Option<&FieldValue> {
        self.session.fields.get(field)
    }

    pub fn is_submitting(&self) -> bool {
        self.session.submission_in_flight
    }

    /// Errors on touched fields only
    pub fn visible_errors(&self) -> BTreeMap<&str, &str> {
        self.session.visible_errors()
    }

    /// Drain pending notices
    pub fn take_notices(&mut self) -> Vec<WizardNotice> {
        std::mem::take(&mut self.notices)
    }

    /// Token cancelled by [`Wizard::teardown`]; clone it to tear down from
    /// another task while a submit is pending. A teardown retires the token,
    /// so fetch it again after one.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // ------------------------------------------------------------------
    // Field edits
    // ------------------------------------------------------------------

    /// Store a value. Touched fields are revalidated immediately.
    pub fn change_field(&mut self, field: &str, value: impl Into<FieldValue>) -> FieldChange {
        if self.session.submission_in_flight {
            return FieldChange::Busy;
        }
        let value = value.into();

        if let Some(attachment) = value.as_attachment() {
            let checked = if self.definition.is_document(field) {
                self.attachment_policy.check(attachment)
            } else {
                Err(AttachmentRejection::UnknownDocument {
                    name: field.to_string(),
                })
            };
            if let Err(rejection) = checked {
                tracing::info!(form = %self.definition.form, field, %rejection, "Attachment rejected");
                self.notices
                    .push(WizardNotice::AttachmentRejected(rejection.clone()));
                return FieldChange::Rejected(rejection);
            }
        }

        tracing::trace!(form = %self.definition.form, field, kind = value.kind(), "Field changed");
        self.session.fields.insert(field.to_string(), value);
        if self.session.is_touched(field) {
            self.revalidate(field);
        }
        FieldChange::Applied
    }

    /// Mark a field as interacted with and validate it
    pub fn touch_field(&mut self, field: &str) {
        self.session.touched.insert(field.to_string());
        self.revalidate(field);
    }

    /// Attach a document, subject to the attachment policy
    pub fn attach_document(&mut self, document: &str, attachment: Attachment) -> FieldChange {
        self.change_field(document, attachment)
    }

    /// Remove an attached document
    pub fn remove_document(&mut self, document: &str) -> FieldChange {
        if self.session.submission_in_flight {
            return FieldChange::Busy;
        }
        if matches!(self.session.fields.get(document), Some(v) if v.is_attachment()) {
            self.session.fields.remove(document);
        }
        FieldChange::Applied
    }

    fn revalidate(&mut self, field: &str) {
        let error = self.validator.validate(field, self.session.fields.get(field));
        self.session.set_error(field, error);
    }

    // ------------------------------------------------------------------
    // Step transitions
    // ------------------------------------------------------------------

    /// Validate every field of `step`, marking them touched. Returns the
    /// failing fields; empty means the step is clean.
    pub fn validate_step(&mut self, step: u32) -> BTreeMap<String, String> {
        let Some(definition) = self.definition.step(step) else {
            return BTreeMap::new();
        };

        let mut errors = BTreeMap::new();
        for field in &definition.fields {
            let error = self.validator.validate(field, self.session.fields.get(field));
            if let Some(message) = &error {
                errors.insert(field.clone(), message.clone());
            }
            self.session.touched.insert(field.clone());
            self.session.set_error(field, error);
        }
        errors
    }

    /// Move forward one step
    pub fn advance(&mut self) -> Result<AdvanceOutcome> {
        if self.session.submission_in_flight {
            return Ok(AdvanceOutcome::Busy);
        }
        let from = self.session.current_step;

        let errors = self.validate_step(from);
        if !errors.is_empty() {
            tracing::debug!(form = %self.definition.form, step = from, invalid = errors.len(), "Advance denied");
            self.notices.push(WizardNotice::FixErrors {
                step: from,
                fields: errors.keys().cloned().collect(),
            });
            return Ok(AdvanceOutcome::Denied { step: from, errors });
        }

        if let GateDecision::Suspend { resume_at } = self.gate.check(Transition::Advance { from }) {
            let redirect = self.suspend(resume_at)?;
            return Ok(AdvanceOutcome::AuthRequired { resume_at, redirect });
        }

        let to = (from + 1).min(self.step_count());
        self.session.current_step = to;
        tracing::debug!(form = %self.definition.form, from, to, "Advanced");
        Ok(AdvanceOutcome::Advanced {
            to,
            scroll_anchor: self.definition.scroll_anchor.clone(),
        })
    }

    /// Move back one step. No validation, no gate.
    pub fn retreat(&mut self) -> u32 {
        if !self.session.submission_in_flight {
            self.session.current_step = self.session.current_step.saturating_sub(1).max(1);
        }
        self.session.current_step
    }

    /// Save progress and build the login redirect for `resume_at`
    fn suspend(&mut self, resume_at: u32) -> Result<Url> {
        self.resume
            .save(&self.definition.form, resume_at, &self.session.fields)?;
        let target = ReturnTarget::new(self.definition.path.clone(), resume_at);
        let redirect = self.gate.auth().login_redirect(&target);
        tracing::info!(form = %self.definition.form, resume_at, "Sign-in required, progress saved");
        Ok(redirect)
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    /// Validate everything, pass the submit gate and build the payload.
    /// On `Ready` the session is marked in flight until
    /// [`Wizard::finish_submit`] is called.
    pub fn begin_submit(&mut self) -> Result<SubmitStart> {
        if self.session.submission_in_flight {
            return Ok(SubmitStart::Stopped(SubmitOutcome::Busy));
        }

        let mut errors = BTreeMap::new();
        let mut first_invalid_step = None;
        for step in 1..=self.step_count() {
            let step_errors = self.validate_step(step);
            if !step_errors.is_empty() {
                if first_invalid_step.is_none() {
                    first_invalid_step = Some(step);
                }
                errors.extend(step_errors);
            }
        }

        let mut missing_documents = Vec::new();
        for (step, document) in self.definition.required_documents() {
            let present = matches!(self.session.fields.get(document), Some(v) if v.is_attachment());
            if !present {
                missing_documents.push(document.to_string());
                first_invalid_step = Some(first_invalid_step.map_or(step, |s: u32| s.min(step)));
            }
        }

        if !errors.is_empty() || !missing_documents.is_empty() {
            if let Some(step) = first_invalid_step.filter(|_| !errors.is_empty()) {
                self.notices.push(WizardNotice::FixErrors {
                    step,
                    fields: errors.keys().cloned().collect(),
                });
            }
            if !missing_documents.is_empty() {
                self.notices.push(WizardNotice::MissingDocuments {
                    documents: missing_documents.clone(),
                });
            }
            tracing::debug!(
                form = %self.definition.form,
                invalid = errors.len(),
                missing = missing_documents.len(),
                "Submit refused"
            );
            return Ok(SubmitStart::Stopped(SubmitOutcome::Refused {
                errors,
                missing_documents,
                first_invalid_step,
            }));
        }

        if let GateDecision::Suspend { resume_at } = self.gate.check(Transition::Submit) {
            let redirect = self.suspend(resume_at)?;
            return Ok(SubmitStart::Stopped(SubmitOutcome::AuthRequired {
                resume_at,
                redirect,
            }));
        }

        let payload = SubmissionCoordinator::assemble(
            &self.definition.form,
            &self.session.fields,
            &self.validator,
            self.gate.auth().session_token(),
        );
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        self.session.submission_in_flight = true;
        Ok(SubmitStart::Ready(PendingSubmission {
            payload,
            cancel: self.cancel.child_token(),
        }))
    }

    /// Apply the sink's answer to the session
    pub fn finish_submit(&mut self, result: SubmissionResult) -> SubmitOutcome {
        self.session.submission_in_flight = false;

        match result {
            SubmissionResult::Accepted { reference_id } => {
                self.session.reset();
                if let Err(e) = self.resume.discard(&self.definition.form) {
                    tracing::warn!(form = %self.definition.form, error = %e, "Could not clear resume snapshot");
                }
                SubmitOutcome::Submitted { reference_id }
            }
            SubmissionResult::Failed {
                reason,
                field_errors,
            } => {
                for (field, message) in &field_errors {
                    self.session.touched.insert(field.clone());
                    self.session.set_error(field, Some(message.clone()));
                }
                self.notices.push(WizardNotice::SubmissionFailed {
                    reason: reason.clone(),
                });
                SubmitOutcome::Failed {
                    reason,
                    field_errors,
                }
            }
            SubmissionResult::Cancelled => SubmitOutcome::Cancelled,
        }
    }

    /// Validate, gate and deliver the application in one call
    pub async fn submit(&mut self) -> Result<SubmitOutcome> {
        let pending = match self.begin_submit()? {
            SubmitStart::Ready(pending) => pending,
            SubmitStart::Stopped(outcome) => return Ok(outcome),
        };
        let result = self
            .coordinator
            .submit(pending.payload, pending.cancel)
            .await;
        Ok(self.finish_submit(result))
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Abandon the pending submission, if any; its result is dropped. The
    /// wizard stays usable and the next submit runs under a fresh token.
    pub fn teardown(&self) {
        self.cancel.cancel();
    }

    /// Close the wizard without touching stored progress. A snapshot saved
    /// for a sign-in redirect is still there for the next mount.
    pub fn discard(mut self) {
        self.teardown();
        self.session.reset();
        tracing::info!(form = %self.definition.form, "Wizard discarded");
    }

    /// Close the wizard and delete any stored snapshot for this form
    pub fn abandon(mut self) -> Result<()> {
        self.teardown();
        self.resume.discard(&self.definition.form)?;
        self.session.reset();
        tracing::info!(form = %self.definition.form, "Wizard abandoned, saved progress removed");
        Ok(())
    }
}

impl Drop for Wizard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
