mod app_config;

pub use app_config::{
    AppConfig, FileConfig, LogFormat, LoggingConfig, PostgresSettings, StorageConfig,
};
