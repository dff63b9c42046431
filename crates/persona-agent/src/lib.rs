//! # Persona Agent
//! The answer pipeline from query to verified reply.
//!
//! ## Flow
//! ```text
//! query ─► RetrievalEngine ─► confidence ─► format_context ─► system prompt
//!                                                               │
//!        verified reply ◄── ResponseVerifier ◄── ThinkFilter ◄── Provider
//! ```
//! Streaming callers (`answer_stream`) get think-filtered deltas without
//! verification; `answer` collects the whole reply and verifies it.

pub mod prompt;

use futures::StreamExt;
use persona_core::config::PersonaConfig;
use persona_core::error::Result;
use persona_core::types::FactEntry;
use persona_knowledge::{KnowledgeBase, RetrievalEngine};
use persona_providers::{GenerateRequest, Provider, TextStream, ThinkFilter, strip_think};
use persona_verifier::{ResponseVerifier, VerificationOutcome};
use serde::Serialize;
use std::sync::Arc;

pub use prompt::{TurnContext, build_system_prompt, format_context};

/// Everything decided before the model is called.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedPrompt {
    pub entries: Vec<Arc<FactEntry>>,
    pub confidence: f64,
    pub system_prompt: String,
}

/// A complete, verified reply.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    /// Model output after think stripping, before verification.
    pub generated: String,
    pub entries: Vec<Arc<FactEntry>>,
    pub confidence: f64,
    pub verification: VerificationOutcome,
}

pub struct Agent {
    subject: String,
    retrieval: RetrievalEngine,
    verifier: ResponseVerifier,
    provider: Box<dyn Provider>,
}

impl Agent {
    pub fn new(config: &PersonaConfig, kb: Arc<KnowledgeBase>, provider: Box<dyn Provider>) -> Self {
        Self {
            subject: config.subject.name.clone(),
            retrieval: RetrievalEngine::new(kb, config),
            verifier: ResponseVerifier::new(config.verifier.clone()),
            provider,
        }
    }

    /// Load the knowledge base and provider named in `config`.
    pub fn from_config(config: &PersonaConfig) -> Result<Self> {
        let kb = Arc::new(KnowledgeBase::from_config(config)?);
        let provider = persona_providers::create_provider(&config.llm)?;
        tracing::info!(
            "🤖 Agent ready: {} facts, provider={}, model={}",
            kb.len(),
            provider.name(),
            config.llm.model
        );
        Ok(Self::new(config, kb, provider))
    }

    pub fn retrieval(&self) -> &RetrievalEngine {
        &self.retrieval
    }

    pub fn verifier(&self) -> &ResponseVerifier {
        &self.verifier
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.provider.health_check().await
    }

    /// Retrieve facts, score them, and build the system prompt.
    pub fn prepare(&self, query: &str, turn: &TurnContext) -> PreparedPrompt {
        let entries = self.retrieval.find_relevant_entries(query);
        let confidence = self.retrieval.calculate_confidence(query, &entries);
        let context = format_context(&self.subject, &entries);
        let system_prompt = build_system_prompt(&context, turn, confidence);

        tracing::debug!(
            "Prepared '{}': {} entries, confidence {confidence:.2}",
            query.trim(),
            entries.len()
        );
        PreparedPrompt {
            entries,
            confidence,
            system_prompt,
        }
    }

    /// Start generation and return the raw model stream, thinking included.
    pub async fn generate(
        &self,
        query: &str,
        turn: &TurnContext,
    ) -> Result<(PreparedPrompt, TextStream)> {
        let prepared = self.prepare(query, turn);
        let request = GenerateRequest::new(query, prepared.system_prompt.clone())
            .with_model(turn.model.clone());
        let raw = self.provider.generate_stream(request).await?;
        Ok((prepared, raw))
    }

    /// Stream think-filtered reply deltas. The reply is not verified.
    pub async fn answer_stream(
        &self,
        query: &str,
        turn: &TurnContext,
    ) -> Result<(PreparedPrompt, TextStream)> {
        let (prepared, mut raw) = self.generate(query, turn).await?;

        let stream = async_stream::stream! {
            let mut filter = ThinkFilter::new();
            while let Some(delta) = raw.next().await {
                match delta {
                    Ok(delta) => {
                        if let Some(visible) = filter.push(&delta) {
                            yield Ok(visible);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Generation stream failed: {e}");
                        yield Err(e);
                        return;
                    }
                }
            }
            if let Some(rest) = filter.finish() {
                yield Ok(rest);
            }
        };

        Ok((prepared, Box::pin(stream)))
    }

    /// Generate a full reply and verify it against the retrieved facts.
    pub async fn answer(&self, query: &str, turn: &TurnContext) -> Result<Answer> {
        let (prepared, mut raw) = self.generate(query, turn).await?;

        let mut output = String::new();
        while let Some(delta) = raw.next().await {
            output.push_str(&delta?);
        }
        let generated = strip_think(&output).trim().to_string();

        let verification = self.verifier.verify(&generated, &prepared.entries);
        tracing::debug!("Verification outcome: {:?}", verification.outcome);

        Ok(Answer {
            text: verification.text,
            generated,
            entries: prepared.entries,
            confidence: prepared.confidence,
            verification: verification.outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays fixed deltas and records the last request.
    struct MockProvider {
        deltas: Vec<String>,
        seen: Arc<Mutex<Option<GenerateRequest>>>,
    }

    impl MockProvider {
        fn new(deltas: &[&str]) -> (Self, Arc<Mutex<Option<GenerateRequest>>>) {
            let seen = Arc::new(Mutex::new(None));
            let provider = Self {
                deltas: deltas.iter().map(|d| d.to_string()).collect(),
                seen: seen.clone(),
            };
            (provider, seen)
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn generate_stream(&self, request: GenerateRequest) -> Result<TextStream> {
            *self.seen.lock().unwrap() = Some(request);
            let items: Vec<Result<String>> = self.deltas.iter().cloned().map(Ok).collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    fn agent(deltas: &[&str]) -> (Agent, Arc<Mutex<Option<GenerateRequest>>>) {
        let (provider, seen) = MockProvider::new(deltas);
        let kb = Arc::new(KnowledgeBase::builtin().unwrap());
        (Agent::new(&PersonaConfig::default(), kb, Box::new(provider)), seen)
    }

    #[test]
    fn test_prepare_identity_query() {
        let (agent, _) = agent(&[]);
        let prepared = agent.prepare("Who is he?", &TurnContext::default());
        assert_eq!(prepared.entries.len(), 3);
        assert_eq!(prepared.confidence, 1.0);
        assert!(prepared.system_prompt.contains("Facts about Chris:\n\n• Chris Jen Ian Dava Roa"));
    }

    #[test]
    fn test_prepare_unknown_query() {
        let (agent, _) = agent(&[]);
        let prepared = agent.prepare("xq", &TurnContext::default());
        assert!(prepared.entries.is_empty());
        assert_eq!(prepared.confidence, 0.0);
        assert!(!prepared.system_prompt.contains("Facts about"));
        assert!(prepared.system_prompt.contains("does not cover it"));
    }

    #[tokio::test]
    async fn test_answer_stream_strips_thinking() {
        let (agent, seen) = agent(&["<think>recall", " facts</think>", "His favorite", " food is fried rice."]);
        let turn = TurnContext {
            model: Some("qwen3:4b".into()),
            ..TurnContext::default()
        };
        let (prepared, stream) = agent.answer_stream("what is my favorite food", &turn).await.unwrap();
        let deltas: Vec<String> = stream.map(|d| d.unwrap()).collect().await;
        assert_eq!(deltas, vec!["His favorite", " food is fried rice."]);
        assert_eq!(prepared.entries[0].id, "3");

        let request = seen.lock().unwrap().clone().unwrap();
        assert_eq!(request.prompt, "what is my favorite food");
        assert_eq!(request.model.as_deref(), Some("qwen3:4b"));
        assert_eq!(request.system, prepared.system_prompt);
    }

    #[tokio::test]
    async fn test_split_think_tag_keeps_reply_text() {
        let deltas = ["His favorite food <thi", "nk>hmm</think> is fried", " rice."];
        let (collected, _) = agent(&deltas);
        let answer = collected
            .answer("what is my favorite food", &TurnContext::default())
            .await
            .unwrap();
        assert_eq!(answer.generated, "His favorite food  is fried rice.");
        assert!(!answer.text.contains("<thi"));

        let (streaming, _) = agent(&deltas);
        let (_, stream) = streaming
            .answer_stream("what is my favorite food", &TurnContext::default())
            .await
            .unwrap();
        let streamed: String = stream.map(|d| d.unwrap()).collect::<Vec<_>>().await.concat();
        assert_eq!(streamed, "His favorite food  is fried rice.");
    }

    #[tokio::test]
    async fn test_answer_keeps_supported_reply() {
        let (agent, _) = agent(&["His favorite food is fried rice. ", "Chris loves toppings."]);
        let answer = agent
            .answer("what is my favorite food", &TurnContext::default())
            .await
            .unwrap();
        assert_eq!(answer.text, "His favorite food is fried rice. Chris loves toppings.");
        assert_eq!(answer.verification, VerificationOutcome::Filtered { kept: 2, total: 2 });
        assert_eq!(answer.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_answer_falls_back_on_hallucination() {
        let (agent, _) = agent(&[
            "Pizza with pineapple is the only true food. ",
            "Pasta carbonara is a great dinner option tonight.",
        ]);
        let answer = agent
            .answer("what is my favorite food", &TurnContext::default())
            .await
            .unwrap();
        assert_eq!(answer.text, answer.entries[0].answer);
        assert!(matches!(answer.verification, VerificationOutcome::FellBack { .. }));
        assert!(answer.generated.starts_with("Pizza"));
    }

    #[tokio::test]
    async fn test_answer_without_facts_adds_disclaimer() {
        let (agent, _) = agent(&["I am not sure."]);
        let answer = agent.answer("xq", &TurnContext::default()).await.unwrap();
        assert_eq!(answer.verification, VerificationOutcome::NoEntries);
        assert!(answer.text.starts_with("I am not sure.\n\n(Note:"));
    }

    #[tokio::test]
    async fn test_provider_metadata() {
        let (agent, _) = agent(&[]);
        assert_eq!(agent.provider_name(), "mock");
        assert!(agent.health_check().await.unwrap());
    }
}
