//! Multi-step application wizard for service forms.
//!
//! A form (ITR filing, PAN application, PF withdrawal, trading account...)
//! is a fixed sequence of steps. The [`wizard::Wizard`] collects field values
//! and documents step by step, validates each step before moving forward,
//! sends unauthenticated users to login at configured checkpoints while
//! saving their progress, restores that progress exactly once on return and
//! finally hands the application to a [`submission::SubmissionSink`].
//!
//! ```text
//!   registry ──► Wizard ──► validation
//!                  │  ├───► auth (gate, login redirect)
//!                  │  ├───► resume (snapshot store)
//!                  │  └───► submission (coordinator ──► sink)
//!                  ▼
//!           MountOutcome / AdvanceOutcome / SubmitOutcome
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod registry;
pub mod resume;
pub mod submission;
pub mod telemetry;
pub mod validation;
pub mod wizard;

pub use error::{Result, WizardError};
pub use wizard_types;

pub use auth::{AuthContext, AuthGate, ReturnTarget, StoredCredentialAuth};
pub use config::WizardConfig;
pub use registry::{FormDefinition, FormRegistry, StepDefinition};
pub use resume::{ResumeLoad, ResumeStore, SessionStorage};
pub use submission::{SubmissionCoordinator, SubmissionResult, SubmissionSink};
pub use validation::{AttachmentPolicy, FieldRule, FieldValidator};
pub use wizard::{AdvanceOutcome, MountOutcome, SubmitOutcome, Wizard, WizardDeps, WizardNotice};
