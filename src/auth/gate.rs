//! AuthGate: decides whether a step transition may proceed without a
//! session.
//!
//! The gate only decides. Snapshotting and redirecting are done by the
//! wizard that asked.

use std::sync::Arc;

use super::AuthContext;
use crate::registry::FormDefinition;

/// A transition the wizard is about to take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Forward out of step `from`
    Advance { from: u32 },
    /// Final submission
    Submit,
}

/// Gate verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    /// Authentication required; after login the user resumes at `resume_at`
    Suspend { resume_at: u32 },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

pub struct AuthGate {
    definition: Arc<FormDefinition>,
    auth: Arc<dyn AuthContext>,
}

impl AuthGate {
    pub fn new(definition: Arc<FormDefinition>, auth: Arc<dyn AuthContext>) -> Self {
        Self { definition, auth }
    }

    /// The injected auth collaborator
    pub fn auth(&self) -> &Arc<dyn AuthContext> {
        &self.auth
    }

    /// Pure policy decision for `transition` given the session status
    pub fn guard(&self, transition: Transition, is_authenticated: bool) -> GateDecision {
        if is_authenticated {
            return GateDecision::Allow;
        }

        let step_count = self.definition.step_count();
        match transition {
            Transition::Advance { from } if self.definition.requires_auth_to_leave(from) => {
                GateDecision::Suspend {
                    resume_at: (from + 1).min(step_count),
                }
            }
            Transition::Submit if self.definition.requires_auth_to_submit() => {
                GateDecision::Suspend {
                    resume_at: step_count,
                }
            }
            _ => GateDecision::Allow,
        }
    }

    /// Decide using the current session status
    pub fn check(&self, transition: Transition) -> GateDecision {
        let decision = self.guard(transition, self.auth.is_authenticated());
        if let GateDecision::Suspend { resume_at } = decision {
            tracing::debug!(?transition, resume_at, "Auth gate suspended transition");
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ReturnTarget;
    use crate::registry::{AuthCheckpoint, StepDefinition};
    use url::Url;

    struct Never;

    impl AuthContext for Never {
        fn is_authenticated(&self) -> bool {
            false
        }

        fn login_redirect(&self, target: &ReturnTarget) -> Url {
            target.apply_to(&Url::parse("http://localhost/login").unwrap())
        }
    }

    fn gate(checkpoints: Vec<AuthCheckpoint>) -> AuthGate {
        let def = FormDefinition::builder("itr_filing", "/services/itr-filing")
            .step(StepDefinition::new(1).fields(["full_name"]))
            .step(StepDefinition::new(2).fields(["annual_income"]))
            .step(StepDefinition::new(3).fields(["declaration"]))
            .auth_checkpoints(checkpoints)
            .build()
            .unwrap();
        AuthGate::new(Arc::new(def), Arc::new(Never))
    }

    fn default_gate() -> AuthGate {
        gate(vec![AuthCheckpoint::LeaveStep { step: 1 }, AuthCheckpoint::Submit])
    }

    #[test]
    fn test_leaving_step_one_requires_auth() {
        assert_eq!(
            default_gate().guard(Transition::Advance { from: 1 }, false),
            GateDecision::Suspend { resume_at: 2 }
        );
    }

    #[test]
    fn test_later_steps_pass_unauthenticated() {
        assert!(default_gate()
            .guard(Transition::Advance { from: 2 }, false)
            .is_allowed());
    }

    #[test]
    fn test_submit_resumes_at_last_step() {
        assert_eq!(
            default_gate().guard(Transition::Submit, false),
            GateDecision::Suspend { resume_at: 3 }
        );
    }

    #[test]
    fn test_authenticated_always_allowed() {
        let g = default_gate();
        assert!(g.guard(Transition::Advance { from: 1 }, true).is_allowed());
        assert!(g.guard(Transition::Submit, true).is_allowed());
    }

    #[test]
    fn test_policy_is_declarative() {
        let g = gate(vec![AuthCheckpoint::LeaveStep { step: 2 }]);
        assert!(g.guard(Transition::Advance { from: 1 }, false).is_allowed());
        assert_eq!(
            g.guard(Transition::Advance { from: 2 }, false),
            GateDecision::Suspend { resume_at: 3 }
        );
        assert!(g.guard(Transition::Submit, false).is_allowed());
    }

    #[test]
    fn test_single_step_default_gates_submit() {
        let def = FormDefinition::builder("gst_lookup", "/services/gst-lookup")
            .step(StepDefinition::new(1).fields(["pan_number"]))
            .build()
            .unwrap();
        let g = AuthGate::new(Arc::new(def), Arc::new(Never));
        assert!(g.guard(Transition::Advance { from: 1 }, false).is_allowed());
        assert_eq!(
            g.guard(Transition::Submit, false),
            GateDecision::Suspend { resume_at: 1 }
        );
    }

    #[test]
    fn test_check_reads_injected_context() {
        assert!(!default_gate().check(Transition::Submit).is_allowed());
    }
}
