use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt '{name}' not found")]
    PromptNotFound { name: String },

    #[error("Prompt '{name}' already exists")]
    DuplicatePrompt { name: String },

    #[error("No text for model '{model}' (and no default) in prompt '{prompt}'")]
    ModelNotFound { prompt: String, model: String },

    #[error("Missing required parameters: {}", names.join(", "))]
    MissingParameter { names: Vec<String> },

    #[error("Text references undeclared parameters: {}", placeholders.join(", "))]
    InvalidPlaceholder { placeholders: Vec<String> },

    #[error("Parameters still referenced by stored versions: {}", parameters.join(", "))]
    ParameterConflict { parameters: Vec<String> },

    #[error("Concurrent modification: {message}")]
    ConcurrentModification { message: String },

    #[error("Corrupt storage: {message}")]
    CorruptStorage { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl PromptError {
    pub fn prompt_not_found(name: impl Into<String>) -> Self {
        Self::PromptNotFound { name: name.into() }
    }

    pub fn duplicate_prompt(name: impl Into<String>) -> Self {
        Self::DuplicatePrompt { name: name.into() }
    }

    pub fn model_not_found(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self::ModelNotFound {
            prompt: prompt.into(),
            model: model.into(),
        }
    }

    pub fn missing_parameter(names: Vec<String>) -> Self {
        Self::MissingParameter { names }
    }

    pub fn invalid_placeholder(placeholders: Vec<String>) -> Self {
        Self::InvalidPlaceholder { placeholders }
    }

    pub fn parameter_conflict(parameters: Vec<String>) -> Self {
        Self::ParameterConflict { parameters }
    }

    pub fn concurrent_modification(message: impl Into<String>) -> Self {
        Self::ConcurrentModification {
            message: message.into(),
        }
    }

    pub fn corrupt_storage(message: impl Into<String>) -> Self {
        Self::CorruptStorage {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_not_found_display() {
        let error = PromptError::prompt_not_found("greet");
        assert_eq!(error.to_string(), "Prompt 'greet' not found");
    }

    #[test]
    fn test_missing_parameter_lists_names() {
        let error = PromptError::missing_parameter(vec!["name".to_string(), "tone".to_string()]);
        assert_eq!(error.to_string(), "Missing required parameters: name, tone");
    }

    #[test]
    fn test_duplicate_prompt_display() {
        let error = PromptError::duplicate_prompt("greet");
        assert_eq!(error.to_string(), "Prompt 'greet' already exists");
    }
}
