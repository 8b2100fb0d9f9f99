//! Prompt entity and related types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::template;
use crate::domain::PromptError;

/// Reserved model identifier used as a retrieval fallback
pub const DEFAULT_MODEL: &str = "default";

const MAX_NAME_LENGTH: usize = 255;

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap());

static PARAMETER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").unwrap());

fn validate_name(name: &str) -> Result<(), PromptError> {
    if name.is_empty() {
        return Err(PromptError::validation("Prompt name must not be empty"));
    }

    if name.len() > MAX_NAME_LENGTH {
        return Err(PromptError::validation(format!(
            "Prompt name exceeds {} characters",
            MAX_NAME_LENGTH
        )));
    }

    if !NAME_PATTERN.is_match(name) {
        return Err(PromptError::validation(format!(
            "Invalid prompt name '{}': use letters, digits, '.', '_' or '-'",
            name
        )));
    }

    Ok(())
}

pub(crate) fn validate_parameters(parameters: &[String]) -> Result<(), PromptError> {
    for parameter in parameters {
        if !PARAMETER_PATTERN.is_match(parameter) {
            return Err(PromptError::validation(format!(
                "Invalid parameter name '{}'",
                parameter
            )));
        }
    }

    Ok(())
}

/// Prompt identifier, validated at construction
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PromptName(String);

impl PromptName {
    pub fn new(name: impl Into<String>) -> Result<Self, PromptError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PromptName {
    type Error = PromptError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PromptName> for String {
    fn from(name: PromptName) -> Self {
        name.0
    }
}

impl std::fmt::Display for PromptName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable, revision-numbered text for one prompt+model pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptVersion {
    /// Revision number (1-indexed, monotonically increasing per model)
    revision: u32,
    /// Template text at this revision
    text: String,
    /// When this revision was created
    created_at: DateTime<Utc>,
}

impl PromptVersion {
    pub fn new(revision: u32, text: impl Into<String>) -> Self {
        Self {
            revision,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn from_parts(revision: u32, text: String, created_at: DateTime<Utc>) -> Self {
        Self {
            revision,
            text,
            created_at,
        }
    }
}

/// A named, parameterized prompt with per-model version histories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// Unique name within a collection
    name: PromptName,
    /// Description of the prompt's purpose
    #[serde(skip_serializing_if = "Option::is_none", default)]
    description: Option<String>,
    /// Declared parameter names every version's text may reference
    parameters: Vec<String>,
    /// Model identifier to ordered version history, oldest first
    versions: BTreeMap<String, Vec<PromptVersion>>,
}

impl Prompt {
    /// Create an empty prompt with the given declared parameters
    ///
    /// Parameter names must be valid identifiers; duplicates are rejected.
    pub fn new(name: PromptName, parameters: Vec<String>) -> Result<Self, PromptError> {
        validate_parameters(&parameters)?;

        let mut seen = Vec::new();
        for parameter in &parameters {
            if seen.contains(parameter) {
                return Err(PromptError::validation(format!(
                    "Duplicate parameter '{}'",
                    parameter
                )));
            }
            seen.push(parameter.clone());
        }

        Ok(Self {
            name,
            description: None,
            parameters,
            versions: BTreeMap::new(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    // Getters

    pub fn name(&self) -> &PromptName {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Model identifiers that have at least one version
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }

    pub fn versions(&self) -> &BTreeMap<String, Vec<PromptVersion>> {
        &self.versions
    }

    /// The current (highest-revision) version for a model, if any
    pub fn latest(&self, model: &str) -> Option<&PromptVersion> {
        self.versions.get(model).and_then(|history| history.last())
    }

    /// A specific revision for a model
    pub fn version_at(&self, model: &str, revision: u32) -> Option<&PromptVersion> {
        self.versions
            .get(model)?
            .iter()
            .find(|v| v.revision == revision)
    }

    /// Current version for a model, falling back to the reserved default
    pub fn current(&self, model: &str) -> Result<&PromptVersion, PromptError> {
        self.latest(model)
            .or_else(|| self.latest(DEFAULT_MODEL))
            .ok_or_else(|| PromptError::model_not_found(self.name.as_str(), model))
    }

    // Mutators

    /// Append a new version for a model, assigning the next revision number
    ///
    /// Every placeholder in `text` must be a declared parameter.
    pub fn add_version(
        &mut self,
        model: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<&PromptVersion, PromptError> {
        let model = model.into();
        let text = text.into();

        let undeclared: Vec<String> = template::placeholders(&text)
            .into_iter()
            .filter(|p| !self.parameters.contains(p))
            .collect();

        if !undeclared.is_empty() {
            return Err(PromptError::invalid_placeholder(undeclared));
        }

        let history = self.versions.entry(model).or_default();
        let revision = history.last().map(|v| v.revision + 1).unwrap_or(1);
        history.push(PromptVersion::new(revision, text));

        Ok(history.last().unwrap())
    }

    /// Change the prompt's name, keeping all versions and parameters
    pub fn rename(&mut self, new_name: PromptName) {
        self.name = new_name;
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    /// Replace the declared parameter list
    ///
    /// Fails when a removed parameter is still referenced by any stored
    /// version's text.
    pub fn set_parameters(&mut self, parameters: Vec<String>) -> Result<(), PromptError> {
        validate_parameters(&parameters)?;

        let mut conflicting = Vec::new();

        for history in self.versions.values() {
            for version in history {
                for placeholder in template::placeholders(&version.text) {
                    if !parameters.contains(&placeholder) && !conflicting.contains(&placeholder) {
                        conflicting.push(placeholder);
                    }
                }
            }
        }

        if !conflicting.is_empty() {
            return Err(PromptError::parameter_conflict(conflicting));
        }

        self.parameters = parameters;
        Ok(())
    }

    /// Restore a version history read back from storage
    pub(crate) fn insert_history(&mut self, model: impl Into<String>, history: Vec<PromptVersion>) {
        self.versions.insert(model.into(), history);
    }
}
