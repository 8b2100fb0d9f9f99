//! Prompt store trait
//!
//! One capability interface over the persistence backends. Implementations
//! own authoritative state; callers treat returned records as transient
//! views and never cache them.

use async_trait::async_trait;

use super::{Prompt, PromptName, PromptVersion};
use crate::domain::PromptError;

/// Store trait for Prompt persistence
#[async_trait]
pub trait PromptStore: Send + Sync + std::fmt::Debug {
    /// Persist a new prompt with its initial versions
    ///
    /// Fails with `DuplicatePrompt` when the name is taken.
    async fn create(&self, prompt: Prompt) -> Result<(), PromptError>;

    /// Materialize a full prompt record by name
    async fn fetch(&self, name: &str) -> Result<Option<Prompt>, PromptError>;

    /// Append a new version for a model, returning it with its revision
    async fn add_version(
        &self,
        name: &str,
        model: &str,
        text: &str,
    ) -> Result<PromptVersion, PromptError>;

    /// Replace the declared parameter list
    async fn set_parameters(&self, name: &str, parameters: Vec<String>) -> Result<(), PromptError>;

    /// Update the description
    async fn set_description(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<(), PromptError>;

    /// Rename a prompt, keeping all versions
    async fn rename(&self, old_name: &str, new_name: &PromptName) -> Result<(), PromptError>;

    /// Delete a prompt and all its versions
    async fn delete(&self, name: &str) -> Result<(), PromptError>;

    /// All prompt names, sorted
    async fn list(&self) -> Result<Vec<String>, PromptError>;
}

/// In-memory implementation of PromptStore
pub mod in_memory {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// In-memory implementation of PromptStore for testing and development
    #[derive(Debug, Default)]
    pub struct InMemoryPromptStore {
        prompts: Mutex<BTreeMap<String, Prompt>>,
    }

    impl InMemoryPromptStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_prompt(self, prompt: Prompt) -> Self {
            self.prompts
                .lock()
                .unwrap()
                .insert(prompt.name().to_string(), prompt);
            self
        }
    }

    #[async_trait]
    impl PromptStore for InMemoryPromptStore {
        async fn create(&self, prompt: Prompt) -> Result<(), PromptError> {
            let mut prompts = self.prompts.lock().unwrap();
            let name = prompt.name().to_string();

            if prompts.contains_key(&name) {
                return Err(PromptError::duplicate_prompt(name));
            }

            prompts.insert(name, prompt);
            Ok(())
        }

        async fn fetch(&self, name: &str) -> Result<Option<Prompt>, PromptError> {
            Ok(self.prompts.lock().unwrap().get(name).cloned())
        }

        async fn add_version(
            &self,
            name: &str,
            model: &str,
            text: &str,
        ) -> Result<PromptVersion, PromptError> {
            let mut prompts = self.prompts.lock().unwrap();
            let prompt = prompts
                .get_mut(name)
                .ok_or_else(|| PromptError::prompt_not_found(name))?;

            Ok(prompt.add_version(model, text)?.clone())
        }

        async fn set_parameters(
            &self,
            name: &str,
            parameters: Vec<String>,
        ) -> Result<(), PromptError> {
            let mut prompts = self.prompts.lock().unwrap();
            let prompt = prompts
                .get_mut(name)
                .ok_or_else(|| PromptError::prompt_not_found(name))?;

            prompt.set_parameters(parameters)
        }

        async fn set_description(
            &self,
            name: &str,
            description: Option<String>,
        ) -> Result<(), PromptError> {
            let mut prompts = self.prompts.lock().unwrap();
            let prompt = prompts
                .get_mut(name)
                .ok_or_else(|| PromptError::prompt_not_found(name))?;

            prompt.set_description(description);
            Ok(())
        }

        async fn rename(&self, old_name: &str, new_name: &PromptName) -> Result<(), PromptError> {
            let mut prompts = self.prompts.lock().unwrap();

            if prompts.contains_key(new_name.as_str()) {
                return Err(PromptError::duplicate_prompt(new_name.as_str()));
            }

            let mut prompt = prompts
                .remove(old_name)
                .ok_or_else(|| PromptError::prompt_not_found(old_name))?;

            prompt.rename(new_name.clone());
            prompts.insert(new_name.to_string(), prompt);
            Ok(())
        }

        async fn delete(&self, name: &str) -> Result<(), PromptError> {
            let mut prompts = self.prompts.lock().unwrap();

            prompts
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| PromptError::prompt_not_found(name))
        }

        async fn list(&self) -> Result<Vec<String>, PromptError> {
            Ok(self.prompts.lock().unwrap().keys().cloned().collect())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn test_prompt(name: &str) -> Prompt {
            let mut prompt = Prompt::new(
                PromptName::new(name).unwrap(),
                vec!["name".to_string()],
            )
            .unwrap();
            prompt.add_version("gpt-4", "Hello {name}").unwrap();
            prompt
        }

        #[tokio::test]
        async fn test_create_and_fetch() {
            let store = InMemoryPromptStore::new();
            store.create(test_prompt("greet")).await.unwrap();

            let fetched = store.fetch("greet").await.unwrap().unwrap();
            assert_eq!(fetched.latest("gpt-4").unwrap().text(), "Hello {name}");
        }

        #[tokio::test]
        async fn test_create_duplicate_fails() {
            let store = InMemoryPromptStore::new();
            store.create(test_prompt("greet")).await.unwrap();

            let result = store.create(test_prompt("greet")).await;
            assert!(matches!(result, Err(PromptError::DuplicatePrompt { .. })));
        }

        #[tokio::test]
        async fn test_add_version_increments_revision() {
            let store = InMemoryPromptStore::new();
            store.create(test_prompt("greet")).await.unwrap();

            let version = store
                .add_version("greet", "gpt-4", "Hi {name}!")
                .await
                .unwrap();
            assert_eq!(version.revision(), 2);
        }

        #[tokio::test]
        async fn test_rename_rejects_taken_name() {
            let store = InMemoryPromptStore::new();
            store.create(test_prompt("a")).await.unwrap();
            store.create(test_prompt("b")).await.unwrap();

            let result = store.rename("a", &PromptName::new("b").unwrap()).await;
            assert!(matches!(result, Err(PromptError::DuplicatePrompt { .. })));
        }

        #[tokio::test]
        async fn test_delete_missing_fails() {
            let store = InMemoryPromptStore::new();
            let result = store.delete("absent").await;
            assert!(matches!(result, Err(PromptError::PromptNotFound { .. })));
        }

        #[tokio::test]
        async fn test_list_sorted() {
            let store = InMemoryPromptStore::new()
                .with_prompt(test_prompt("zeta"))
                .with_prompt(test_prompt("alpha"));

            let names = store.list().await.unwrap();
            assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
        }
    }
}
