//! Error types for Persona.

use thiserror::Error;

/// Result alias used across the Persona crates.
pub type Result<T> = std::result::Result<T, PersonaError>;

#[derive(Error, Debug)]
pub enum PersonaError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The knowledge base is empty or malformed. Fatal at startup.
    #[error("Knowledge base error: {0}")]
    KnowledgeBase(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PersonaError {
    /// Whether this error should abort startup rather than a single request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PersonaError::Config(_) | PersonaError::KnowledgeBase(_))
    }
}
