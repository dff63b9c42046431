//! # Persona Verifier
//!
//! Checks a generated reply against the facts it was supposed to be based on.
//!
//! Every sentence of the reply must either be trivially safe (short, or an
//! introductory phrase) or share most of the key terms of at least one fact.
//! When fewer than half of the sentences survive, the reply is thrown away and
//! the raw fact answers are returned instead.

use persona_core::config::VerifierConfig;
use persona_core::types::FactEntry;
use serde::Serialize;
use std::sync::Arc;

const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

/// What the verifier did with a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum VerificationOutcome {
    /// Nothing to check against; the disclaimer was appended.
    NoEntries,
    /// Enough sentences were supported; unsupported ones were dropped.
    Filtered { kept: usize, total: usize },
    /// Too few sentences were supported; raw fact answers were returned.
    FellBack { kept: usize, total: usize },
}

/// Verified reply text plus what happened to it.
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub text: String,
    pub outcome: VerificationOutcome,
}

impl Verification {
    /// Whether the reply is (a filtered version of) the generated text.
    pub fn kept_generation(&self) -> bool {
        matches!(self.outcome, VerificationOutcome::Filtered { .. })
    }
}

/// A fact clause with its precomputed key terms.
struct Fact {
    key_terms: Vec<String>,
}

pub struct ResponseVerifier {
    config: VerifierConfig,
}

impl ResponseVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verified reply text for `text` given the entries it should be based on.
    pub fn filter_response(&self, text: &str, entries: &[Arc<FactEntry>]) -> String {
        self.verify(text, entries).text
    }

    pub fn verify(&self, text: &str, entries: &[Arc<FactEntry>]) -> Verification {
        if entries.is_empty() {
            tracing::debug!("No supporting entries, appending disclaimer");
            return Verification {
                text: format!("{text}\n\n{}", self.config.disclaimer),
                outcome: VerificationOutcome::NoEntries,
            };
        }

        let facts = self.extract_facts(entries);
        let sentences = split_sentences(text);
        let total = sentences.len();

        let kept: Vec<&str> = sentences
            .into_iter()
            .map(str::trim)
            .filter(|sentence| {
                sentence.chars().count() < self.config.min_sentence_len
                    || self.is_introductory(sentence)
                    || is_supported(sentence, &facts)
            })
            .collect();

        // an empty reply has nothing worth keeping either
        if total == 0 || kept.len() * 2 < total {
            tracing::debug!(
                "Verifier kept {}/{total} sentences, falling back to raw answers",
                kept.len()
            );
            return Verification {
                text: entries
                    .iter()
                    .map(|e| e.answer.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
                outcome: VerificationOutcome::FellBack {
                    kept: kept.len(),
                    total,
                },
            };
        }

        if kept.len() < total {
            tracing::debug!("Verifier dropped {} of {total} sentences", total - kept.len());
        }
        Verification {
            text: format!("{}.", kept.join(". ")),
            outcome: VerificationOutcome::Filtered {
                kept: kept.len(),
                total,
            },
        }
    }

    fn extract_facts(&self, entries: &[Arc<FactEntry>]) -> Vec<Fact> {
        entries
            .iter()
            .flat_map(|entry| split_sentences(&entry.answer))
            .map(|clause| Fact {
                key_terms: self.key_terms(clause.trim()),
            })
            .collect()
    }

    /// Lowercased words of at least `key_term_min_len` chars, minus stopwords.
    pub fn key_terms(&self, fact: &str) -> Vec<String> {
        fact.to_lowercase()
            .split_whitespace()
            .filter(|word| word.chars().count() >= self.config.key_term_min_len)
            .filter(|word| !self.config.stopwords.iter().any(|s| s == word))
            .map(String::from)
            .collect()
    }

    pub fn is_introductory(&self, sentence: &str) -> bool {
        let lower = sentence.trim().to_lowercase();
        self.config
            .intro_prefixes
            .iter()
            .any(|p| lower.starts_with(p.as_str()))
            || self
                .config
                .intro_markers
                .iter()
                .any(|m| lower.contains(m.as_str()))
    }
}

impl Default for ResponseVerifier {
    fn default() -> Self {
        Self::new(VerifierConfig::default())
    }
}

/// Non-blank pieces of `text` between runs of `.`, `!` and `?`.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split(SENTENCE_TERMINATORS)
        .filter(|s| !s.trim().is_empty())
        .collect()
}

/// More than half of some fact's key terms occur in the sentence.
fn is_supported(sentence: &str, facts: &[Fact]) -> bool {
    let lower = sentence.to_lowercase();
    facts.iter().any(|fact| {
        if fact.key_terms.is_empty() {
            return false;
        }
        let matched = fact
            .key_terms
            .iter()
            .filter(|term| lower.contains(term.as_str()))
            .count();
        matched * 2 > fact.key_terms.len()
    })
}
