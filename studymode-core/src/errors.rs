use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(&'static str),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(&'static str),
    #[error("storage error: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn storage(what: impl std::fmt::Display) -> Self {
        CoreError::Storage(what.to_string())
    }

    /// Stable, machine-readable name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation",
            CoreError::InvalidInput(_) => "invalid_input",
            CoreError::NotFound(_) => "not_found",
            CoreError::Storage(_) => "storage",
        }
    }
}
