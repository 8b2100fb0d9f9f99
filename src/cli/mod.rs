//! CLI for prompt-suite
//!
//! Thin layer over the manager facade; backend comes from configuration
//! (file-backed by default).

use std::collections::HashMap;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;
use crate::infrastructure::services::{CreatePromptRequest, PromptManager};

/// Prompt Suite - named prompt templates with per-model versions
#[derive(Parser)]
#[command(name = "prompt-suite")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a prompt with initial per-model texts
    Create {
        name: String,
        /// Optional description
        #[arg(long)]
        description: Option<String>,
        /// Declared parameter name (repeatable)
        #[arg(long = "param")]
        parameters: Vec<String>,
        /// Initial text as model=text (repeatable)
        #[arg(long = "model", value_parser = parse_key_value)]
        models: Vec<(String, String)>,
    },

    /// Resolve and print the current text for a model
    Get {
        name: String,
        #[arg(long, default_value = crate::domain::DEFAULT_MODEL)]
        model: String,
        /// Placeholder value as key=value (repeatable)
        #[arg(long = "param", value_parser = parse_key_value)]
        values: Vec<(String, String)>,
    },

    /// Append a new version for a model
    AddVersion {
        name: String,
        model: String,
        text: String,
    },

    /// Replace the declared parameter list
    SetParams {
        name: String,
        parameters: Vec<String>,
    },

    /// Rename a prompt, keeping all versions
    Rename { old_name: String, new_name: String },

    /// Delete a prompt and all its versions
    Delete { name: String },

    /// List all prompt names
    List,

    /// Show a prompt's parameters, models and version history
    Show { name: String },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("Expected key=value, got '{}'", raw))
}

/// Run a parsed CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);

    let manager = PromptManager::from_config(&config).await?;

    match cli.command {
        Command::Create {
            name,
            description,
            parameters,
            models,
        } => {
            manager
                .create_prompt(CreatePromptRequest {
                    name: name.clone(),
                    description,
                    parameters,
                    models: models.into_iter().collect(),
                })
                .await?;
            println!("Created prompt '{}'", name);
        }

        Command::Get {
            name,
            model,
            values,
        } => {
            let values: HashMap<String, String> = values.into_iter().collect();
            let text = manager.get_prompt(&name, &model, &values).await?;
            println!("{}", text);
        }

        Command::AddVersion { name, model, text } => {
            let version = manager.add_version(&name, &model, &text).await?;
            println!(
                "Added revision {} to '{}' for model '{}'",
                version.revision(),
                name,
                model
            );
        }

        Command::SetParams { name, parameters } => {
            manager.set_parameters(&name, parameters).await?;
            println!("Updated parameters of '{}'", name);
        }

        Command::Rename { old_name, new_name } => {
            manager.rename_prompt(&old_name, &new_name).await?;
            println!("Renamed '{}' to '{}'", old_name, new_name);
        }

        Command::Delete { name } => {
            manager.delete_prompt(&name).await?;
            println!("Deleted prompt '{}'", name);
        }

        Command::List => {
            for name in manager.list_prompts().await? {
                println!("{}", name);
            }
        }

        Command::Show { name } => {
            let prompt = manager.describe(&name).await?;

            println!("name: {}", prompt.name());
            if let Some(description) = prompt.description() {
                println!("description: {}", description);
            }
            println!("parameters: {}", prompt.parameters().join(", "));

            for (model, history) in prompt.versions() {
                println!("model {}:", model);
                for version in history {
                    println!(
                        "  r{} ({}): {}",
                        version.revision(),
                        version.created_at().format("%Y-%m-%d %H:%M:%S"),
                        version.text()
                    );
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("gpt-4=Hello {name}").unwrap(),
            ("gpt-4".to_string(), "Hello {name}".to_string())
        );
        assert!(parse_key_value("no-separator").is_err());
    }

    #[test]
    fn test_parse_key_value_keeps_extra_equals() {
        assert_eq!(
            parse_key_value("k=a=b").unwrap(),
            ("k".to_string(), "a=b".to_string())
        );
    }
}
