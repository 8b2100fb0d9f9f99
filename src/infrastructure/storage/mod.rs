//! Storage backends for the prompt store trait

pub mod factory;
pub mod file;
pub mod postgres;

pub use factory::{StorageBackend, StorageFactory};
pub use file::{FileFormat, FileStore};
pub use postgres::{PostgresConfig, PostgresStore};
