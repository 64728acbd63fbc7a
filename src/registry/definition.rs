//! Form Definition Types and YAML Loading
//!
//! Each service form is described by an ordered list of steps, the fields
//! and documents each step collects, and the transitions that require the
//! user to be signed in. Definitions are loaded from YAML at startup or
//! built in code.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{Result, WizardError};
use crate::validation::{FieldRule, FieldValidator};

/// Anchor the UI scrolls to after a step change
pub const DEFAULT_SCROLL_ANCHOR: &str = "form-top";

/// A complete form definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormDefinition {
    /// Form identity, also the resume snapshot key (e.g. "itr_filing")
    pub form: String,
    /// Human-readable title
    #[serde(default)]
    pub title: String,
    /// Page path the login redirect returns to
    pub path: String,

    /// Ordered steps, numbered 1..N
    pub steps: Vec<StepDefinition>,

    /// Transitions that require authentication; `None` means the default
    /// policy for the step count (see [`FormDefinition::checkpoints`])
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_checkpoints: Option<Vec<AuthCheckpoint>>,

    /// Form-specific additions to the built-in rule table
    #[serde(default)]
    pub rules: HashMap<String, FieldRule>,

    #[serde(default = "default_scroll_anchor")]
    pub scroll_anchor: String,
}

/// Leaving step 1 and submitting; a one-step form only gates submit
fn default_checkpoints(step_count: u32) -> Vec<AuthCheckpoint> {
    let mut checkpoints = Vec::with_capacity(2);
    if step_count > 1 {
        checkpoints.push(AuthCheckpoint::LeaveStep { step: 1 });
    }
    checkpoints.push(AuthCheckpoint::Submit);
    checkpoints
}

fn default_scroll_anchor() -> String {
    DEFAULT_SCROLL_ANCHOR.to_string()
}

/// One screen of the wizard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepDefinition {
    /// Position in the wizard, starting at 1
    pub index: u32,
    #[serde(default)]
    pub title: String,
    /// Fields validated when leaving this step
    #[serde(default)]
    pub fields: Vec<String>,
    /// Documents that must be attached before submit
    #[serde(default)]
    pub documents: Vec<String>,
}

impl StepDefinition {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            title: String::new(),
            fields: Vec::new(),
            documents: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn documents<I, S>(mut self, documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.documents.extend(documents.into_iter().map(Into::into));
        self
    }
}

/// A transition that may only be taken by an authenticated user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthCheckpoint {
    /// Moving forward out of `step`
    LeaveStep { step: u32 },
    /// Final submission
    Submit,
}

impl FormDefinition {
    /// Start building a definition in code
    pub fn builder(form: impl Into<String>, path: impl Into<String>) -> FormDefinitionBuilder {
        FormDefinitionBuilder {
            definition: FormDefinition {
                form: form.into(),
                title: String::new(),
                path: path.into(),
                steps: Vec::new(),
                auth_checkpoints: None,
                rules: HashMap::new(),
                scroll_anchor: default_scroll_anchor(),
            },
        }
    }

    /// Number of steps (N)
    pub fn step_count(&self) -> u32 {
        self.steps.len() as u32
    }

    /// Step by 1-based index
    pub fn step(&self, index: u32) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.index == index)
    }

    /// Effective checkpoint policy: the declared one, or the default
    pub fn checkpoints(&self) -> Vec<AuthCheckpoint> {
        match &self.auth_checkpoints {
            Some(declared) => declared.clone(),
            None => default_checkpoints(self.step_count()),
        }
    }

    /// Whether moving forward out of `step` requires authentication
    pub fn requires_auth_to_leave(&self, step: u32) -> bool {
        self.checkpoints()
            .contains(&AuthCheckpoint::LeaveStep { step })
    }

    /// Whether submitting requires authentication
    pub fn requires_auth_to_submit(&self) -> bool {
        self.checkpoints().contains(&AuthCheckpoint::Submit)
    }

    /// Every document required across all steps, with its step
    pub fn required_documents(&self) -> impl Iterator<Item = (u32, &str)> {
        self.steps
            .iter()
            .flat_map(|s| s.documents.iter().map(move |d| (s.index, d.as_str())))
    }

    /// Whether `name` is declared as a document
    pub fn is_document(&self, name: &str) -> bool {
        self.steps.iter().any(|s| s.documents.iter().any(|d| d == name))
    }

    /// Field validator for this form: built-in table plus form overrides
    pub fn validator(&self) -> FieldValidator {
        FieldValidator::default().with_rules(self.rules.iter().map(|(k, r)| (k.clone(), *r)))
    }

    /// Check structural consistency
    pub fn validate(&self) -> Result<()> {
        let form = self.form.as_str();
        if form.trim().is_empty() {
            return Err(WizardError::invalid_definition(form, "form identity is empty"));
        }
        if !self.path.starts_with('/') {
            return Err(WizardError::invalid_definition(
                form,
                format!("path `{}` must start with '/'", self.path),
            ));
        }
        if self.steps.is_empty() {
            return Err(WizardError::invalid_definition(form, "no steps defined"));
        }

        for (position, step) in self.steps.iter().enumerate() {
            let expected = position as u32 + 1;
            if step.index != expected {
                return Err(WizardError::invalid_definition(
                    form,
                    format!("step {} found where step {} expected", step.index, expected),
                ));
            }
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            for name in step.fields.iter().chain(step.documents.iter()) {
                if !seen.insert(name.as_str()) {
                    return Err(WizardError::invalid_definition(
                        form,
                        format!("`{}` is declared more than once", name),
                    ));
                }
            }
        }

        let n = self.step_count();
        for checkpoint in &self.checkpoints() {
            if let AuthCheckpoint::LeaveStep { step } = checkpoint {
                if *step < 1 || *step >= n {
                    return Err(WizardError::invalid_definition(
                        form,
                        format!("auth checkpoint on step {} outside 1..{}", step, n),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Builder for [`FormDefinition`]
pub struct FormDefinitionBuilder {
    definition: FormDefinition,
}

impl FormDefinitionBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.definition.title = title.into();
        self
    }

    pub fn step(mut self, step: StepDefinition) -> Self {
        self.definition.steps.push(step);
        self
    }

    /// Replace the default checkpoint policy
    pub fn auth_checkpoints(mut self, checkpoints: Vec<AuthCheckpoint>) -> Self {
        self.definition.auth_checkpoints = Some(checkpoints);
        self
    }

    pub fn rule(mut self, field: impl Into<String>, rule: FieldRule) -> Self {
        self.definition.rules.insert(field.into(), rule);
        self
    }

    pub fn scroll_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.definition.scroll_anchor = anchor.into();
        self
    }

    pub fn build(self) -> Result<FormDefinition> {
        self.definition.validate()?;
        Ok(self.definition)
    }
}

/// Loader for form definitions
pub struct FormLoader;

impl FormLoader {
    /// Load all form definitions from a directory. Two files declaring the
    /// same form identity are an error.
    pub fn load_from_dir(dir: &Path) -> Result<HashMap<String, FormDefinition>> {
        let mut definitions = HashMap::new();

        if !dir.exists() {
            tracing::warn!("Form definition directory {} does not exist", dir.display());
            return Ok(definitions);
        }

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();

            if path
                .extension()
                .map(|e| e == "yaml" || e == "yml")
                .unwrap_or(false)
            {
                let def = Self::load_from_file(&path)?;
                if definitions.contains_key(&def.form) {
                    return Err(WizardError::invalid_definition(
                        &def.form,
                        format!("form identity declared again in {}", path.display()),
                    ));
                }
                tracing::debug!(form = %def.form, steps = def.step_count(), "Loaded form definition");
                definitions.insert(def.form.clone(), def);
            }
        }

        Ok(definitions)
    }

    /// Load a single form definition from a file
    pub fn load_from_file(path: &Path) -> Result<FormDefinition> {
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content)
    }

    /// Load from a YAML string
    pub fn load_from_str(yaml: &str) -> Result<FormDefinition> {
        let def: FormDefinition = serde_yaml::from_str(yaml)?;
        def.validate()?;
        Ok(def)
    }
}
