//! Prompt domain - named templates with per-model version histories

mod entity;
pub mod store;
pub mod template;

pub(crate) use entity::validate_parameters;
pub use entity::{Prompt, PromptName, PromptVersion, DEFAULT_MODEL};
pub use store::{in_memory::InMemoryPromptStore, PromptStore};
pub use template::{placeholders, resolve};
