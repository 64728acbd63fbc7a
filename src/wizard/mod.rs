//! The wizard: one live form instance and its transitions.

mod machine;
mod notice;
mod session;

pub use machine::{
    AdvanceOutcome, FieldChange, MountOutcome, PendingSubmission, SubmitOutcome, SubmitStart,
    Wizard, WizardDeps,
};
pub use notice::WizardNotice;
pub use session::WizardSession;
