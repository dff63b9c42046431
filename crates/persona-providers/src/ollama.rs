//! Ollama provider. Streams `/api/generate` as newline-delimited JSON.

use async_trait::async_trait;
use futures::StreamExt;
use persona_core::config::LlmConfig;
use persona_core::error::{PersonaError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{GenerateRequest, Provider, TextStream};

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
}

/// One line of the streamed response.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateChunk {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Parse one NDJSON line from raw bytes. Blank lines yield `None`.
pub fn parse_line(line: &[u8]) -> Option<serde_json::Result<GenerateChunk>> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }
    Some(serde_json::from_slice(line))
}

pub struct OllamaProvider {
    endpoint: String,
    model: String,
    temperature: f32,
    top_p: f32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PersonaError::Http(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn default_model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate_stream(&self, request: GenerateRequest) -> Result<TextStream> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let body = GenerateBody {
            model,
            prompt: &request.prompt,
            system: &request.system,
            stream: true,
            options: GenerateOptions {
                temperature: request.temperature.unwrap_or(self.temperature),
                top_p: request.top_p.unwrap_or(self.top_p),
            },
        };

        let url = format!("{}/api/generate", self.endpoint);
        tracing::debug!("🦙 Ollama generate: model={model}, prompt={} chars", request.prompt.len());

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PersonaError::Http(format!("ollama connection failed ({url}): {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(PersonaError::Provider(format!(
                "Ollama API error: {} {text}",
                status.as_u16()
            )));
        }

        let stream = async_stream::stream! {
            let mut bytes_stream = resp.bytes_stream();
            // Bytes, not text: a UTF-8 sequence may span two chunks.
            let mut buffer: Vec<u8> = Vec::new();
            let mut finished = false;

            'read: while let Some(chunk) = bytes_stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        buffer.extend_from_slice(&bytes);

                        while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                            let line: Vec<u8> = buffer.drain(..=pos).collect();
                            match parse_line(&line) {
                                None => {}
                                Some(Ok(chunk)) => {
                                    if let Some(err) = chunk.error {
                                        yield Err(PersonaError::Provider(format!("Ollama API error: {err}")));
                                        finished = true;
                                        break 'read;
                                    }
                                    if !chunk.response.is_empty() {
                                        yield Ok(chunk.response);
                                    }
                                    if chunk.done {
                                        finished = true;
                                        break 'read;
                                    }
                                }
                                Some(Err(e)) => {
                                    tracing::warn!("Skipping unparseable Ollama line: {e}");
                                }
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(PersonaError::Http(format!("ollama stream failed: {e}")));
                        finished = true;
                        break;
                    }
                }
            }

            if !finished
                && let Some(Ok(chunk)) = parse_line(&buffer)
                && !chunk.response.is_empty()
            {
                yield Ok(chunk.response);
            }
        };

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.endpoint);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => {
                tracing::debug!("Ollama health check failed: {e}");
                Ok(false)
            }
        }
    }
}
