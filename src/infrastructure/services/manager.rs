//! Manager facade - backend-agnostic prompt operations
//!
//! Every call goes straight to the configured store; nothing is cached, so
//! reads always reflect the latest committed state.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::AppConfig;
use crate::domain::{
    resolve, Prompt, PromptError, PromptName, PromptStore, PromptVersion,
};
use crate::infrastructure::storage::StorageFactory;

/// Request to create a new prompt
#[derive(Debug, Clone, Default)]
pub struct CreatePromptRequest {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Vec<String>,
    /// Initial revision-1 text per model identifier
    pub models: HashMap<String, String>,
}

/// Prompt manager over a configured storage backend
#[derive(Debug, Clone)]
pub struct PromptManager {
    store: Arc<dyn PromptStore>,
}

impl PromptManager {
    /// Create a manager over an existing store
    pub fn new(store: Arc<dyn PromptStore>) -> Self {
        Self { store }
    }

    /// Create a manager with the backend named in the configuration
    pub async fn from_config(config: &AppConfig) -> Result<Self, PromptError> {
        let store = StorageFactory::create(&config.storage).await?;
        Ok(Self::new(store))
    }

    /// Create a new prompt with one revision-1 version per model
    pub async fn create_prompt(&self, request: CreatePromptRequest) -> Result<(), PromptError> {
        let name = PromptName::new(&request.name)?;
        let mut prompt = Prompt::new(name, request.parameters)?;

        if let Some(description) = request.description {
            prompt = prompt.with_description(description);
        }

        // BTreeMap ordering keeps creation deterministic across runs.
        let models: std::collections::BTreeMap<_, _> = request.models.into_iter().collect();
        for (model, text) in models {
            prompt.add_version(model, text)?;
        }

        debug!(name = %request.name, "Creating prompt");
        self.store.create(prompt).await
    }

    /// Fetch the current text for a model and substitute placeholder values
    ///
    /// Falls back to the reserved "default" model when the requested model
    /// has no versions.
    pub async fn get_prompt(
        &self,
        name: &str,
        model: &str,
        values: &HashMap<String, String>,
    ) -> Result<String, PromptError> {
        let prompt = self
            .store
            .fetch(name)
            .await?
            .ok_or_else(|| PromptError::prompt_not_found(name))?;

        let version = prompt.current(model)?;
        resolve(version.text(), values)
    }

    /// Append a new version for a model, returning it with its revision
    pub async fn add_version(
        &self,
        name: &str,
        model: &str,
        text: &str,
    ) -> Result<PromptVersion, PromptError> {
        debug!(name, model, "Adding prompt version");
        self.store.add_version(name, model, text).await
    }

    /// Alias for `add_version`; "updating" always appends, history is kept
    pub async fn update_prompt(
        &self,
        name: &str,
        model: &str,
        text: &str,
    ) -> Result<PromptVersion, PromptError> {
        self.add_version(name, model, text).await
    }

    /// Replace the declared parameter list
    pub async fn set_parameters(
        &self,
        name: &str,
        parameters: Vec<String>,
    ) -> Result<(), PromptError> {
        self.store.set_parameters(name, parameters).await
    }

    /// Update the description
    pub async fn set_description(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<(), PromptError> {
        self.store.set_description(name, description).await
    }

    /// Rename a prompt, keeping all versions and parameters
    pub async fn rename_prompt(&self, old_name: &str, new_name: &str) -> Result<(), PromptError> {
        let new_name = PromptName::new(new_name)?;
        debug!(old_name, new_name = %new_name, "Renaming prompt");
        self.store.rename(old_name, &new_name).await
    }

    /// Delete a prompt and all its versions
    pub async fn delete_prompt(&self, name: &str) -> Result<(), PromptError> {
        debug!(name, "Deleting prompt");
        self.store.delete(name).await
    }

    /// All prompt names, sorted
    pub async fn list_prompts(&self) -> Result<Vec<String>, PromptError> {
        self.store.list().await
    }

    /// The full record for a prompt: description, parameters and histories
    pub async fn describe(&self, name: &str) -> Result<Prompt, PromptError> {
        self.store
            .fetch(name)
            .await?
            .ok_or_else(|| PromptError::prompt_not_found(name))
    }
}
