//! PostgreSQL storage with connection pooling
//!
//! Two tables: `<prefix>prompts` holds prompt metadata with the declared
//! parameter list as JSONB, `<prefix>prompt_versions` holds one row per
//! revision with a `(prompt_name, model, revision)` uniqueness constraint.
//! Every multi-statement operation runs inside one transaction.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use crate::domain::prompt::{template, validate_parameters};
use crate::domain::{Prompt, PromptError, PromptName, PromptStore, PromptVersion};

/// PostgreSQL storage configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
    /// Prefix added to table names for isolation (e.g. "dev_")
    pub table_prefix: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/prompt_suite".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
            table_prefix: String::new(),
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }

    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.to_string().contains("duplicate key"))
}

fn storage_err(context: &str, err: sqlx::Error) -> PromptError {
    PromptError::storage(format!("{}: {}", context, err))
}

/// Maps the error of a retried version insert: a second unique violation
/// means another writer keeps claiming the computed revision
fn version_conflict_error(name: &str, model: &str, err: sqlx::Error) -> PromptError {
    if is_unique_violation(&err) {
        PromptError::concurrent_modification(format!(
            "Revision conflict adding version to '{}' for model '{}'",
            name, model
        ))
    } else {
        storage_err("Failed to insert version", err)
    }
}

/// PostgreSQL-backed prompt store
pub struct PostgresStore {
    pool: PgPool,
    prompts_table: String,
    versions_table: String,
}

impl Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore")
            .field("prompts_table", &self.prompts_table)
            .field("versions_table", &self.versions_table)
            .finish()
    }
}

impl PostgresStore {
    /// Creates a store over an existing pool
    pub fn new(pool: PgPool, table_prefix: &str) -> Self {
        Self {
            pool,
            prompts_table: format!("{}prompts", table_prefix),
            versions_table: format!("{}prompt_versions", table_prefix),
        }
    }

    /// Connects a pool from the configuration
    pub async fn connect(config: &PostgresConfig) -> Result<Self, PromptError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| {
                PromptError::storage(format!("Failed to connect to PostgreSQL: {}", e))
            })?;

        Ok(Self::new(pool, &config.table_prefix))
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Ensures both tables exist
    pub async fn ensure_tables(&self) -> Result<(), PromptError> {
        let prompts = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                name VARCHAR(255) PRIMARY KEY,
                description TEXT,
                parameters JSONB NOT NULL DEFAULT '[]'::jsonb
            )
            "#,
            self.prompts_table
        );

        let versions = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                prompt_name VARCHAR(255) NOT NULL
                    REFERENCES {} (name) ON UPDATE CASCADE ON DELETE CASCADE,
                model VARCHAR(255) NOT NULL,
                revision INTEGER NOT NULL,
                text TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (prompt_name, model, revision)
            )
            "#,
            self.versions_table, self.prompts_table
        );

        sqlx::query(&prompts)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("Failed to create prompts table", e))?;

        sqlx::query(&versions)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("Failed to create versions table", e))?;

        Ok(())
    }

    /// Reads the declared parameter list, erroring when the prompt is absent
    async fn parameters_of(&self, name: &str) -> Result<Vec<String>, PromptError> {
        let query = format!(
            "SELECT parameters FROM {} WHERE name = $1",
            self.prompts_table
        );

        let row = sqlx::query(&query)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_err("Failed to read prompt", e))?
            .ok_or_else(|| PromptError::prompt_not_found(name))?;

        let parameters: serde_json::Value = row.get("parameters");
        serde_json::from_value(parameters)
            .map_err(|e| PromptError::corrupt_storage(format!("Invalid parameter list: {}", e)))
    }

    /// One insert attempt for a new version, computing the next revision
    /// inside the transaction
    async fn try_insert_version(
        &self,
        name: &str,
        model: &str,
        text: &str,
    ) -> Result<PromptVersion, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let next_query = format!(
            "SELECT COALESCE(MAX(revision), 0) + 1 AS next FROM {} WHERE prompt_name = $1 AND model = $2",
            self.versions_table
        );

        let row = sqlx::query(&next_query)
            .bind(name)
            .bind(model)
            .fetch_one(&mut *tx)
            .await?;
        let revision: i32 = row.get("next");

        let created_at: DateTime<Utc> = Utc::now();
        let insert = format!(
            "INSERT INTO {} (prompt_name, model, revision, text, created_at) VALUES ($1, $2, $3, $4, $5)",
            self.versions_table
        );

        sqlx::query(&insert)
            .bind(name)
            .bind(model)
            .bind(revision)
            .bind(text)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(PromptVersion::from_parts(
            revision as u32,
            text.to_string(),
            created_at,
        ))
    }
}

#[async_trait]
impl PromptStore for PostgresStore {
    async fn create(&self, prompt: Prompt) -> Result<(), PromptError> {
        let parameters = serde_json::to_value(prompt.parameters())
            .map_err(|e| PromptError::storage(format!("Failed to serialize parameters: {}", e)))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_err("Failed to begin transaction", e))?;

        let insert_prompt = format!(
            "INSERT INTO {} (name, description, parameters) VALUES ($1, $2, $3)",
            self.prompts_table
        );

        sqlx::query(&insert_prompt)
            .bind(prompt.name().as_str())
            .bind(prompt.description())
            .bind(&parameters)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    PromptError::duplicate_prompt(prompt.name().as_str())
                } else {
                    storage_err("Failed to insert prompt", e)
                }
            })?;

        let insert_version = format!(
            "INSERT INTO {} (prompt_name, model, revision, text, created_at) VALUES ($1, $2, $3, $4, $5)",
            self.versions_table
        );

        for (model, history) in prompt.versions() {
            for version in history {
                sqlx::query(&insert_version)
                    .bind(prompt.name().as_str())
                    .bind(model)
                    .bind(version.revision() as i32)
                    .bind(version.text())
                    .bind(version.created_at())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| storage_err("Failed to insert version", e))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| storage_err("Failed to commit", e))
    }

    async fn fetch(&self, name: &str) -> Result<Option<Prompt>, PromptError> {
        let prompt_query = format!(
            "SELECT name, description, parameters FROM {} WHERE name = $1",
            self.prompts_table
        );

        let row = match sqlx::query(&prompt_query)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_err("Failed to read prompt", e))?
        {
            Some(row) => row,
            None => return Ok(None),
        };

        let stored_name: String = row.get("name");
        let description: Option<String> = row.get("description");
        let parameters: serde_json::Value = row.get("parameters");
        let parameters: Vec<String> = serde_json::from_value(parameters)
            .map_err(|e| PromptError::corrupt_storage(format!("Invalid parameter list: {}", e)))?;

        let prompt_name = PromptName::new(stored_name)
            .map_err(|e| PromptError::corrupt_storage(e.to_string()))?;
        let mut prompt = Prompt::new(prompt_name, parameters)
            .map_err(|e| PromptError::corrupt_storage(e.to_string()))?;
        prompt.set_description(description);

        let versions_query = format!(
            "SELECT model, revision, text, created_at FROM {} WHERE prompt_name = $1 ORDER BY model, revision",
            self.versions_table
        );

        let rows = sqlx::query(&versions_query)
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_err("Failed to read versions", e))?;

        let mut current_model: Option<(String, Vec<PromptVersion>)> = None;

        for row in rows {
            let model: String = row.get("model");
            let revision: i32 = row.get("revision");
            let text: String = row.get("text");
            let created_at: DateTime<Utc> = row.get("created_at");
            let version = PromptVersion::from_parts(revision as u32, text, created_at);

            match &mut current_model {
                Some((m, history)) if *m == model => history.push(version),
                _ => {
                    if let Some((m, history)) = current_model.take() {
                        prompt.insert_history(m, history);
                    }
                    current_model = Some((model, vec![version]));
                }
            }
        }

        if let Some((model, history)) = current_model {
            prompt.insert_history(model, history);
        }

        Ok(Some(prompt))
    }

    async fn add_version(
        &self,
        name: &str,
        model: &str,
        text: &str,
    ) -> Result<PromptVersion, PromptError> {
        let parameters = self.parameters_of(name).await?;

        let undeclared: Vec<String> = template::placeholders(text)
            .into_iter()
            .filter(|p| !parameters.contains(p))
            .collect();

        if !undeclared.is_empty() {
            return Err(PromptError::invalid_placeholder(undeclared));
        }

        // The uniqueness constraint backstops the MAX(revision) computation
        // under concurrent writers: retry once with a recomputed revision.
        match self.try_insert_version(name, model, text).await {
            Ok(version) => Ok(version),
            Err(e) if is_unique_violation(&e) => self
                .try_insert_version(name, model, text)
                .await
                .map_err(|e| version_conflict_error(name, model, e)),
            Err(e) => Err(storage_err("Failed to insert version", e)),
        }
    }

    async fn set_parameters(&self, name: &str, parameters: Vec<String>) -> Result<(), PromptError> {
        validate_parameters(&parameters)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_err("Failed to begin transaction", e))?;

        let exists_query = format!("SELECT 1 FROM {} WHERE name = $1", self.prompts_table);
        sqlx::query(&exists_query)
            .bind(name)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| storage_err("Failed to read prompt", e))?
            .ok_or_else(|| PromptError::prompt_not_found(name))?;

        let texts_query = format!(
            "SELECT text FROM {} WHERE prompt_name = $1",
            self.versions_table
        );
        let rows = sqlx::query(&texts_query)
            .bind(name)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| storage_err("Failed to read versions", e))?;

        let mut conflicting = Vec::new();
        for row in &rows {
            let text: String = row.get("text");
            for placeholder in template::placeholders(&text) {
                if !parameters.contains(&placeholder) && !conflicting.contains(&placeholder) {
                    conflicting.push(placeholder);
                }
            }
        }

        if !conflicting.is_empty() {
            return Err(PromptError::parameter_conflict(conflicting));
        }

        let value = serde_json::to_value(&parameters)
            .map_err(|e| PromptError::storage(format!("Failed to serialize parameters: {}", e)))?;

        let update = format!(
            "UPDATE {} SET parameters = $2 WHERE name = $1",
            self.prompts_table
        );
        sqlx::query(&update)
            .bind(name)
            .bind(&value)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_err("Failed to update parameters", e))?;

        tx.commit()
            .await
            .map_err(|e| storage_err("Failed to commit", e))
    }

    async fn set_description(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<(), PromptError> {
        let update = format!(
            "UPDATE {} SET description = $2 WHERE name = $1",
            self.prompts_table
        );

        let result = sqlx::query(&update)
            .bind(name)
            .bind(description)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("Failed to update description", e))?;

        if result.rows_affected() == 0 {
            return Err(PromptError::prompt_not_found(name));
        }

        Ok(())
    }

    async fn rename(&self, old_name: &str, new_name: &PromptName) -> Result<(), PromptError> {
        // ON UPDATE CASCADE carries the version rows along.
        let update = format!("UPDATE {} SET name = $2 WHERE name = $1", self.prompts_table);

        let result = sqlx::query(&update)
            .bind(old_name)
            .bind(new_name.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    PromptError::duplicate_prompt(new_name.as_str())
                } else {
                    storage_err("Failed to rename prompt", e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(PromptError::prompt_not_found(old_name));
        }

        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), PromptError> {
        // Cascade removes the version rows.
        let delete = format!("DELETE FROM {} WHERE name = $1", self.prompts_table);

        let result = sqlx::query(&delete)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("Failed to delete prompt", e))?;

        if result.rows_affected() == 0 {
            return Err(PromptError::prompt_not_found(name));
        }

        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, PromptError> {
        let query = format!("SELECT name FROM {} ORDER BY name", self.prompts_table);

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_err("Failed to list prompts", e))?;

        Ok(rows.iter().map(|row| row.get("name")).collect())
    }
}
