//! Error types for interactive input.

/// Errors that can occur while asking the user something.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// The user closed the input stream at a prompt.
    #[error("Prompt cancelled by user.")]
    PromptCancelled,

    /// Reading from or writing to the terminal failed.
    #[error("Prompt failed: {0}")]
    PromptFailed(String),

    /// The answer could not be understood.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// No terminal is attached and the prompt has no default.
    #[error("No input provided and no default available.")]
    NoInput,
}

impl InputError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }
}
