//! Storage factory for runtime backend selection

use std::sync::Arc;

use tracing::info;

use super::file::{FileFormat, FileStore};
use super::postgres::{PostgresConfig, PostgresStore};
use crate::config::StorageConfig;
use crate::domain::{InMemoryPromptStore, PromptError, PromptStore};

/// Supported storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-memory storage (for testing/development)
    Memory,
    /// Whole-file YAML/JSON storage
    File,
    /// PostgreSQL storage
    Postgres,
}

impl StorageBackend {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Some(Self::Memory),
            "file" | "yaml" | "json" => Some(Self::File),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            _ => None,
        }
    }
}

/// Factory for creating prompt stores
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Creates a store from the storage configuration section
    pub async fn create(config: &StorageConfig) -> Result<Arc<dyn PromptStore>, PromptError> {
        let backend = StorageBackend::from_str(&config.backend).ok_or_else(|| {
            PromptError::validation(format!("Unknown storage backend '{}'", config.backend))
        })?;

        info!(backend = ?backend, "Selecting storage backend");

        match backend {
            StorageBackend::Memory => Ok(Arc::new(InMemoryPromptStore::new())),
            StorageBackend::File => {
                let store = match config.file.format.as_deref() {
                    Some(format) => {
                        let format = parse_format(format)?;
                        FileStore::open_with_format(&config.file.path, format)?
                    }
                    None => FileStore::open(&config.file.path)?,
                };
                Ok(Arc::new(store))
            }
            StorageBackend::Postgres => {
                let pg_config = PostgresConfig::new(&config.postgres.url)
                    .with_max_connections(config.postgres.max_connections)
                    .with_min_connections(config.postgres.min_connections)
                    .with_connect_timeout(config.postgres.connect_timeout_secs)
                    .with_idle_timeout(config.postgres.idle_timeout_secs)
                    .with_table_prefix(&config.postgres.table_prefix);

                let store = PostgresStore::connect(&pg_config).await?;
                store.ensure_tables().await?;
                Ok(Arc::new(store))
            }
        }
    }
}

fn parse_format(format: &str) -> Result<FileFormat, PromptError> {
    match format.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "json" => Ok(FileFormat::Json),
        other => Err(PromptError::validation(format!(
            "Unknown file format '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    #[test]
    fn test_backend_from_str() {
        assert_eq!(StorageBackend::from_str("memory"), Some(StorageBackend::Memory));
        assert_eq!(StorageBackend::from_str("FILE"), Some(StorageBackend::File));
        assert_eq!(StorageBackend::from_str("pg"), Some(StorageBackend::Postgres));
        assert_eq!(StorageBackend::from_str("redis"), None);
    }

    #[tokio::test]
    async fn test_create_memory_backend() {
        let config = StorageConfig {
            backend: "memory".to_string(),
            ..Default::default()
        };

        let store = StorageFactory::create(&config).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_unknown_backend_fails() {
        let config = StorageConfig {
            backend: "redis".to_string(),
            ..Default::default()
        };

        let result = StorageFactory::create(&config).await;
        assert!(matches!(result, Err(PromptError::Validation { .. })));
    }
}
