//! Services built on the domain layer

mod manager;

pub use manager::{CreatePromptRequest, PromptManager};
