//! Error types for prompt operations

use crew_core::StepError;
use thiserror::Error;

/// Result type for prompt operations
pub type Result<T> = std::result::Result<T, PromptError>;

/// Errors that can occur while building or rendering prompts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    /// Template not found for the specified language
    #[error("Template '{name}' not found for language '{language}'")]
    TemplateNotFound { name: String, language: String },

    /// Template parsing failed
    #[error("Failed to parse template '{name}' for language '{language}': {detail}")]
    TemplateParseFailed {
        name: String,
        language: String,
        detail: String,
    },

    /// Template rendering failed, typically an undefined variable
    #[error("Failed to render template '{name}': {detail}")]
    RenderError { name: String, detail: String },

    #[error("No templates provided for '{0}'")]
    NoTemplatesProvided(String),

    /// A profile field is blank
    #[error("Profile '{profile}' has an empty '{field}'")]
    EmptyField { profile: String, field: String },

    #[error("Unsupported language '{0}' (expected 'en' or 'pt')")]
    UnsupportedLanguage(String),
}

impl From<PromptError> for StepError {
    fn from(err: PromptError) -> Self {
        StepError::Fatal(err.to_string())
    }
}

/// Profiles are validated while a pipeline is assembled
impl From<PromptError> for crew_core::Error {
    fn from(err: PromptError) -> Self {
        crew_core::Error::InvalidDefinition(err.to_string())
    }
}
