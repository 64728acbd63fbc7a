//! Step definition registry.
//!
//! Holds every form definition by identity. Each concrete service page picks
//! its definition from here instead of carrying its own step logic.

mod definition;

pub use definition::{
    AuthCheckpoint, FormDefinition, FormDefinitionBuilder, FormLoader, StepDefinition,
    DEFAULT_SCROLL_ANCHOR,
};

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, WizardError};

/// Form definitions keyed by identity
#[derive(Debug, Clone, Default)]
pub struct FormRegistry {
    forms: HashMap<String, Arc<FormDefinition>>,
}

impl FormRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.yaml` / `*.yml` definition in `dir`
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let mut registry = Self::new();
        for (_, def) in FormLoader::load_from_dir(dir)? {
            registry.insert(def)?;
        }
        tracing::info!(count = registry.forms.len(), dir = %dir.display(), "Form registry loaded");
        Ok(registry)
    }

    /// Register a definition. Identities must be unique.
    pub fn insert(&mut self, definition: FormDefinition) -> Result<()> {
        definition.validate()?;
        if self.forms.contains_key(&definition.form) {
            return Err(WizardError::invalid_definition(
                &definition.form,
                "form identity registered twice",
            ));
        }
        self.forms
            .insert(definition.form.clone(), Arc::new(definition));
        Ok(())
    }

    /// Look up a definition by identity
    pub fn get(&self, form: &str) -> Result<Arc<FormDefinition>> {
        self.forms
            .get(form)
            .cloned()
            .ok_or_else(|| WizardError::UnknownForm(form.to_string()))
    }

    /// Registered identities, sorted
    pub fn identities(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.forms.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}
