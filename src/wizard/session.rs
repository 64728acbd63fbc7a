//! Wizard session state.
//!
//! Owned by exactly one live wizard; mutated only through the wizard's
//! transition methods.

use std::collections::{BTreeMap, BTreeSet};
use wizard_types::FieldValues;

/// Mutable state of one wizard instance
#[derive(Debug, Clone, PartialEq)]
pub struct WizardSession {
    /// 1-based current step
    pub current_step: u32,
    pub fields: FieldValues,
    /// Fields the user has interacted with
    pub touched: BTreeSet<String>,
    /// Current validation outcome per field
    pub errors: BTreeMap<String, String>,
    pub submission_in_flight: bool,
}

impl Default for WizardSession {
    fn default() -> Self {
        Self {
            current_step: 1,
            fields: FieldValues::new(),
            touched: BTreeSet::new(),
            errors: BTreeMap::new(),
            submission_in_flight: false,
        }
    }
}

impl WizardSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_touched(&self, field: &str) -> bool {
        self.touched.contains(field)
    }

    /// Record (or clear) the validation outcome for a field
    pub fn set_error(&mut self, field: &str, error: Option<String>) {
        match error {
            Some(message) => {
                self.errors.insert(field.to_string(), message);
            }
            None => {
                self.errors.remove(field);
            }
        }
    }

    /// Errors the user should see: only those on touched fields
    pub fn visible_errors(&self) -> BTreeMap<&str, &str> {
        self.errors
            .iter()
            .filter(|(field, _)| self.touched.contains(field.as_str()))
            .map(|(field, message)| (field.as_str(), message.as_str()))
            .collect()
    }

    /// Back to a fresh step-1 session
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_hidden_until_touched() {
        let mut session = WizardSession::new();
        session.set_error("email", Some("Email is required".into()));
        assert!(session.visible_errors().is_empty());

        session.touched.insert("email".into());
        assert_eq!(session.visible_errors()["email"], "Email is required");

        session.set_error("email", None);
        assert!(session.visible_errors().is_empty());
    }

    #[test]
    fn test_reset() {
        let mut session = WizardSession::new();
        session.current_step = 3;
        session.touched.insert("pan".into());
        session.submission_in_flight = true;
        session.reset();
        assert_eq!(session, WizardSession::default());
    }
}
