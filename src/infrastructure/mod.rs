//! Infrastructure layer - storage backends, services, logging

pub mod logging;
pub mod services;
pub mod storage;

pub use services::{CreatePromptRequest, PromptManager};
pub use storage::{
    FileFormat, FileStore, PostgresConfig, PostgresStore, StorageBackend, StorageFactory,
};
