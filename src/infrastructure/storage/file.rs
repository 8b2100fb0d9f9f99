//! Whole-file YAML/JSON storage
//!
//! The full collection lives in one document. Every mutation rewrites the
//! file: the change is applied to a staged copy, serialized to a temporary
//! path and renamed over the target, and only then committed to the
//! in-memory mirror. A failed save leaves both memory and file at the old
//! state. Concurrent multi-process writers are not coordinated; the last
//! writer wins.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::prompt::template;
use crate::domain::{Prompt, PromptError, PromptName, PromptStore, PromptVersion};

/// On-disk document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    /// Infer the format from a path extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// One stored version row
#[derive(Debug, Serialize, Deserialize)]
struct VersionRecord {
    revision: u32,
    text: String,
    created_at: DateTime<Utc>,
}

/// Version histories, either the full form or the legacy single-text form
/// where a model maps straight to its current text
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum VersionsEntry {
    History(Vec<VersionRecord>),
    Legacy(String),
}

/// One stored prompt record
#[derive(Debug, Serialize, Deserialize)]
struct PromptRecord {
    prompt_name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Vec<String>,
    #[serde(default)]
    versions: BTreeMap<String, VersionsEntry>,
}

impl PromptRecord {
    fn from_prompt(prompt: &Prompt) -> Self {
        let versions = prompt
            .versions()
            .iter()
            .map(|(model, history)| {
                let rows = history
                    .iter()
                    .map(|v| VersionRecord {
                        revision: v.revision(),
                        text: v.text().to_string(),
                        created_at: v.created_at(),
                    })
                    .collect();
                (model.clone(), VersionsEntry::History(rows))
            })
            .collect();

        Self {
            prompt_name: prompt.name().to_string(),
            description: prompt.description().map(str::to_string),
            parameters: prompt.parameters().to_vec(),
            versions,
        }
    }

    fn into_prompt(self) -> Result<Prompt, PromptError> {
        let name = PromptName::new(&self.prompt_name)
            .map_err(|e| PromptError::corrupt_storage(e.to_string()))?;

        let mut prompt = Prompt::new(name, self.parameters)
            .map_err(|e| PromptError::corrupt_storage(e.to_string()))?;

        for (model, entry) in self.versions {
            let history = match entry {
                VersionsEntry::History(rows) => {
                    let mut rows = rows;
                    rows.sort_by_key(|r| r.revision);
                    rows.into_iter()
                        .map(|r| PromptVersion::from_parts(r.revision, r.text, r.created_at))
                        .collect::<Vec<_>>()
                }
                VersionsEntry::Legacy(text) => vec![PromptVersion::new(1, text)],
            };

            if history.is_empty() {
                return Err(PromptError::corrupt_storage(format!(
                    "Prompt '{}' has an empty version list for model '{}'",
                    self.prompt_name, model
                )));
            }

            for version in &history {
                let undeclared: Vec<String> = template::placeholders(version.text())
                    .into_iter()
                    .filter(|p| !prompt.parameters().contains(p))
                    .collect();

                if !undeclared.is_empty() {
                    return Err(PromptError::corrupt_storage(format!(
                        "Prompt '{}' model '{}' revision {} references undeclared parameters: {}",
                        self.prompt_name,
                        model,
                        version.revision(),
                        undeclared.join(", ")
                    )));
                }
            }

            prompt.insert_history(model, history);
        }

        Ok(prompt)
    }
}

/// Temporary write target alongside the document
///
/// The full file name is kept so same-stem stores of different formats in
/// one directory never share a temp path.
fn temp_path(path: &Path) -> PathBuf {
    let mut target = path.as_os_str().to_os_string();
    target.push(".tmp");
    PathBuf::from(target)
}

/// File-backed prompt store
pub struct FileStore {
    path: PathBuf,
    format: FileFormat,
    prompts: Mutex<BTreeMap<String, Prompt>>,
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("format", &self.format)
            .finish()
    }
}

impl FileStore {
    /// Open a store, inferring the format from the path extension
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PromptError> {
        let path = path.into();
        let format = FileFormat::from_path(&path).ok_or_else(|| {
            PromptError::validation(format!(
                "Cannot infer file format from '{}'; use .yaml, .yml or .json",
                path.display()
            ))
        })?;

        Self::open_inner(path, format)
    }

    /// Open a store with an explicit format
    ///
    /// The format must agree with the path extension when the extension is
    /// recognized.
    pub fn open_with_format(
        path: impl Into<PathBuf>,
        format: FileFormat,
    ) -> Result<Self, PromptError> {
        let path = path.into();

        if let Some(inferred) = FileFormat::from_path(&path) {
            if inferred != format {
                return Err(PromptError::validation(format!(
                    "File extension of '{}' does not match format {:?}",
                    path.display(),
                    format
                )));
            }
        }

        Self::open_inner(path, format)
    }

    fn open_inner(path: PathBuf, format: FileFormat) -> Result<Self, PromptError> {
        let prompts = if path.exists() {
            let records = Self::read_document(&path, format)?;
            let mut map = BTreeMap::new();

            for record in records {
                let name = record.prompt_name.clone();
                let prompt = record.into_prompt()?;

                if map.insert(name.clone(), prompt).is_some() {
                    return Err(PromptError::corrupt_storage(format!(
                        "Duplicate prompt name '{}' in document",
                        name
                    )));
                }
            }

            map
        } else {
            debug!(path = %path.display(), "Prompt file absent, starting empty");
            BTreeMap::new()
        };

        Ok(Self {
            path,
            format,
            prompts: Mutex::new(prompts),
        })
    }

    fn read_document(path: &Path, format: FileFormat) -> Result<Vec<PromptRecord>, PromptError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| PromptError::storage(format!("Failed to read '{}': {}", path.display(), e)))?;

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        match format {
            FileFormat::Yaml => serde_yaml::from_str(&raw).map_err(|e| {
                PromptError::corrupt_storage(format!("Malformed YAML in '{}': {}", path.display(), e))
            }),
            FileFormat::Json => serde_json::from_str(&raw).map_err(|e| {
                PromptError::corrupt_storage(format!("Malformed JSON in '{}': {}", path.display(), e))
            }),
        }
    }

    fn write_document(&self, prompts: &BTreeMap<String, Prompt>) -> Result<(), PromptError> {
        let records: Vec<PromptRecord> = prompts.values().map(PromptRecord::from_prompt).collect();

        let serialized = match self.format {
            FileFormat::Yaml => serde_yaml::to_string(&records)
                .map_err(|e| PromptError::storage(format!("Failed to serialize YAML: {}", e)))?,
            FileFormat::Json => serde_json::to_string_pretty(&records)
                .map_err(|e| PromptError::storage(format!("Failed to serialize JSON: {}", e)))?,
        };

        let temp_path = temp_path(&self.path);
        fs::write(&temp_path, serialized).map_err(|e| {
            PromptError::storage(format!("Failed to write '{}': {}", temp_path.display(), e))
        })?;

        // Atomic rename keeps the old document intact on a crashed write
        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            PromptError::storage(format!("Failed to replace '{}': {}", self.path.display(), e))
        })?;

        Ok(())
    }

    /// Apply a mutation to a staged copy, persist it, then commit to memory
    fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, Prompt>) -> Result<T, PromptError>,
    ) -> Result<T, PromptError> {
        let mut prompts = self.prompts.lock().unwrap();
        let mut staged = prompts.clone();

        let out = apply(&mut staged)?;
        self.write_document(&staged)?;

        *prompts = staged;
        Ok(out)
    }
}

#[async_trait]
impl PromptStore for FileStore {
    async fn create(&self, prompt: Prompt) -> Result<(), PromptError> {
        self.mutate(|prompts| {
            let name = prompt.name().to_string();

            if prompts.contains_key(&name) {
                return Err(PromptError::duplicate_prompt(name));
            }

            prompts.insert(name, prompt);
            Ok(())
        })
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
        self.mutate(|prompts| {
            let prompt = prompts
                .get_mut(name)
                .ok_or_else(|| PromptError::prompt_not_found(name))?;

            Ok(prompt.add_version(model, text)?.clone())
        })
    }

    async fn set_parameters(&self, name: &str, parameters: Vec<String>) -> Result<(), PromptError> {
        self.mutate(|prompts| {
            let prompt = prompts
                .get_mut(name)
                .ok_or_else(|| PromptError::prompt_not_found(name))?;

            prompt.set_parameters(parameters)
        })
    }

    async fn set_description(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<(), PromptError> {
        self.mutate(|prompts| {
            let prompt = prompts
                .get_mut(name)
                .ok_or_else(|| PromptError::prompt_not_found(name))?;

            prompt.set_description(description);
            Ok(())
        })
    }

    async fn rename(&self, old_name: &str, new_name: &PromptName) -> Result<(), PromptError> {
        self.mutate(|prompts| {
            if prompts.contains_key(new_name.as_str()) {
                return Err(PromptError::duplicate_prompt(new_name.as_str()));
            }

            let mut prompt = prompts
                .remove(old_name)
                .ok_or_else(|| PromptError::prompt_not_found(old_name))?;

            prompt.rename(new_name.clone());
            prompts.insert(new_name.to_string(), prompt);
            Ok(())
        })
    }

    async fn delete(&self, name: &str) -> Result<(), PromptError> {
        self.mutate(|prompts| {
            prompts
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| PromptError::prompt_not_found(name))
        })
    }

    async fn list(&self) -> Result<Vec<String>, PromptError> {
        Ok(self.prompts.lock().unwrap().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_prompt(name: &str) -> Prompt {
        let mut prompt = Prompt::new(
            PromptName::new(name).unwrap(),
            vec!["name".to_string()],
        )
        .unwrap();
        prompt.add_version("gpt-4", "Hello {name}").unwrap();
        prompt
    }

    fn store_at(dir: &TempDir, file: &str) -> FileStore {
        FileStore::open(dir.path().join(file)).unwrap()
    }

    #[test]
    fn test_format_inference() {
        assert_eq!(
            FileFormat::from_path(Path::new("p.yaml")),
            Some(FileFormat::Yaml)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("p.yml")),
            Some(FileFormat::Yaml)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("p.json")),
            Some(FileFormat::Json)
        );
        assert_eq!(FileFormat::from_path(Path::new("p.txt")), None);
    }

    #[test]
    fn test_open_unknown_extension_fails() {
        let dir = TempDir::new().unwrap();
        let result = FileStore::open(dir.path().join("prompts.txt"));
        assert!(matches!(result, Err(PromptError::Validation { .. })));
    }

    #[test]
    fn test_open_with_mismatched_format_fails() {
        let dir = TempDir::new().unwrap();
        let result =
            FileStore::open_with_format(dir.path().join("prompts.json"), FileFormat::Yaml);
        assert!(matches!(result, Err(PromptError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir, "prompts.yaml");
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_yaml_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prompts.yaml");

        let store = FileStore::open(&path).unwrap();
        let mut prompt = test_prompt("greet");
        prompt.add_version("claude-3", "Hey {name}").unwrap();
        prompt.set_description(Some("greeting".to_string()));
        store.create(prompt.clone()).await.unwrap();
        store.add_version("greet", "gpt-4", "Hi {name}!").await.unwrap();

        let reloaded = FileStore::open(&path).unwrap();
        let fetched = reloaded.fetch("greet").await.unwrap().unwrap();

        assert_eq!(fetched.description(), Some("greeting"));
        assert_eq!(fetched.parameters(), &["name".to_string()]);
        assert_eq!(fetched.latest("gpt-4").unwrap().revision(), 2);
        assert_eq!(fetched.latest("gpt-4").unwrap().text(), "Hi {name}!");
        assert_eq!(fetched.version_at("gpt-4", 1).unwrap().text(), "Hello {name}");
        assert_eq!(fetched.latest("claude-3").unwrap().text(), "Hey {name}");
    }

    #[tokio::test]
    async fn test_json_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prompts.json");

        let store = FileStore::open(&path).unwrap();
        store.create(test_prompt("greet")).await.unwrap();

        let reloaded = FileStore::open(&path).unwrap();
        let fetched = reloaded.fetch("greet").await.unwrap().unwrap();
        assert_eq!(fetched.latest("gpt-4").unwrap().text(), "Hello {name}");
    }

    #[tokio::test]
    async fn test_legacy_single_text_form() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prompts.yaml");

        fs::write(
            &path,
            r#"
- prompt_name: greet
  parameters: [name]
  versions:
    gpt-4: "Hello {name}"
"#,
        )
        .unwrap();

        let store = FileStore::open(&path).unwrap();
        let fetched = store.fetch("greet").await.unwrap().unwrap();
        let version = fetched.latest("gpt-4").unwrap();

        assert_eq!(version.revision(), 1);
        assert_eq!(version.text(), "Hello {name}");
    }

    #[tokio::test]
    async fn test_malformed_document_is_corrupt_storage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prompts.json");
        fs::write(&path, "{ not json").unwrap();

        let result = FileStore::open(&path);
        assert!(matches!(result, Err(PromptError::CorruptStorage { .. })));
    }

    #[tokio::test]
    async fn test_undeclared_parameter_in_document_is_corrupt_storage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prompts.yaml");

        fs::write(
            &path,
            r#"
- prompt_name: greet
  parameters: [name]
  versions:
    gpt-4:
      - revision: 1
        text: "Hello {name}, be {tone}"
        created_at: "2024-01-01T00:00:00Z"
"#,
        )
        .unwrap();

        let result = FileStore::open(&path);
        assert!(matches!(result, Err(PromptError::CorruptStorage { .. })));
    }

    #[tokio::test]
    async fn test_failed_mutation_rolls_back() {
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir, "prompts.yaml");
        store.create(test_prompt("greet")).await.unwrap();

        // Undeclared placeholder: rejected before any write happens.
        let result = store.add_version("greet", "gpt-4", "Bad {oops}").await;
        assert!(matches!(result, Err(PromptError::InvalidPlaceholder { .. })));

        let fetched = store.fetch("greet").await.unwrap().unwrap();
        assert_eq!(fetched.latest("gpt-4").unwrap().revision(), 1);
    }

    #[test]
    fn test_temp_path_keeps_full_file_name() {
        assert_eq!(temp_path(Path::new("a.yaml")), Path::new("a.yaml.tmp"));
        assert_eq!(temp_path(Path::new("a.json")), Path::new("a.json.tmp"));
    }

    #[tokio::test]
    async fn test_same_stem_stores_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let yaml = store_at(&dir, "prompts.yaml");
        let json = store_at(&dir, "prompts.json");

        yaml.create(test_prompt("greet")).await.unwrap();
        json.create(test_prompt("farewell")).await.unwrap();

        let yaml = store_at(&dir, "prompts.yaml");
        let json = store_at(&dir, "prompts.json");
        assert_eq!(yaml.list().await.unwrap(), vec!["greet".to_string()]);
        assert_eq!(json.list().await.unwrap(), vec!["farewell".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prompts.yaml");
        let store = FileStore::open(&path).unwrap();

        // A directory at the target path makes the rename fail.
        fs::create_dir(&path).unwrap();

        let result = store.create(test_prompt("greet")).await;
        assert!(matches!(result, Err(PromptError::Storage { .. })));
        assert!(!dir.path().join("prompts.yaml.tmp").exists());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prompts.json");

        let store = FileStore::open(&path).unwrap();
        store.create(test_prompt("greet")).await.unwrap();
        store.delete("greet").await.unwrap();

        let reloaded = FileStore::open(&path).unwrap();
        assert!(reloaded.fetch("greet").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rename_persists_versions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prompts.yaml");

        let store = FileStore::open(&path).unwrap();
        store.create(test_prompt("greet")).await.unwrap();
        store
            .rename("greet", &PromptName::new("welcome").unwrap())
            .await
            .unwrap();

        let reloaded = FileStore::open(&path).unwrap();
        assert!(reloaded.fetch("greet").await.unwrap().is_none());

        let fetched = reloaded.fetch("welcome").await.unwrap().unwrap();
        assert_eq!(fetched.name().as_str(), "welcome");
        assert_eq!(fetched.latest("gpt-4").unwrap().text(), "Hello {name}");
    }
}
