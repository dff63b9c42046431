//! # Persona Providers
//!
//! Text-generation backends for Persona.
//!
//! Only Ollama is implemented. Providers stream raw text deltas; stripping
//! `<think>` blocks is left to [`ThinkFilter`] so every backend gets the
//! same treatment.

pub mod ollama;
pub mod think;

use async_trait::async_trait;
use futures::stream::BoxStream;
use persona_core::config::LlmConfig;
use persona_core::error::Result;

pub use ollama::OllamaProvider;
pub use think::{ThinkFilter, strip_think};

/// Stream of raw text deltas from a provider.
pub type TextStream = BoxStream<'static, Result<String>>;

/// One generation call.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// User message.
    pub prompt: String,
    /// System prompt carrying the retrieved facts.
    pub system: String,
    /// Model override; the provider default when `None`.
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: system.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model.filter(|m| !m.trim().is_empty());
        self
    }
}

/// A streaming text-generation backend.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Start generating; errors before the first byte are returned directly.
    async fn generate_stream(&self, request: GenerateRequest) -> Result<TextStream>;

    /// Whether the backend is reachable.
    async fn health_check(&self) -> Result<bool>;
}

/// Create the configured provider.
pub fn create_provider(config: &LlmConfig) -> Result<Box<dyn Provider>> {
    Ok(Box::new(OllamaProvider::from_config(config)?))
}
