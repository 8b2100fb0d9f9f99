//! Domain layer - core types and business rules

pub mod error;
pub mod prompt;

pub use error::PromptError;
pub use prompt::{
    placeholders, resolve, InMemoryPromptStore, Prompt, PromptName, PromptStore, PromptVersion,
    DEFAULT_MODEL,
};
