//! Prompt Suite
//!
//! Named prompt templates with per-model text variants and placeholder
//! substitution, persisted to a YAML/JSON file or PostgreSQL:
//! - Templates use `{name}` placeholders resolved from caller-supplied values
//! - Updating a prompt's text appends an immutable, revision-numbered version
//! - A reserved "default" model identifier serves as a retrieval fallback
//! - Backends share one store trait; the manager facade is backend-agnostic
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use prompt_suite::{CreatePromptRequest, InMemoryPromptStore, PromptManager};
//!
//! # async fn example() -> Result<(), prompt_suite::PromptError> {
//! let manager = PromptManager::new(Arc::new(InMemoryPromptStore::new()));
//!
//! manager
//!     .create_prompt(CreatePromptRequest {
//!         name: "greet".to_string(),
//!         description: None,
//!         parameters: vec!["name".to_string()],
//!         models: HashMap::from([("gpt-4".to_string(), "Hello {name}".to_string())]),
//!     })
//!     .await?;
//!
//! let values = HashMap::from([("name".to_string(), "Ana".to_string())]);
//! let text = manager.get_prompt("greet", "gpt-4", &values).await?;
//! assert_eq!(text, "Hello Ana");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{
    InMemoryPromptStore, Prompt, PromptError, PromptName, PromptStore, PromptVersion,
    DEFAULT_MODEL,
};
pub use infrastructure::{
    CreatePromptRequest, FileFormat, FileStore, PostgresConfig, PostgresStore, PromptManager,
    StorageBackend, StorageFactory,
};
