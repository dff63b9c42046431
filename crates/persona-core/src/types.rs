//! Shared data types.

use serde::{Deserialize, Serialize};

/// One hand-authored fact about the subject.
///
/// Entries are loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactEntry {
    /// Unique within a knowledge base.
    pub id: String,
    /// Canonical phrasing of the question this entry answers.
    pub question: String,
    /// Free text, may hold several sentences.
    pub answer: String,
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Alternate phrasings of `question`.
    #[serde(default)]
    pub variations: Vec<String>,
}

impl FactEntry {
    /// Whether fuzzy search has anything to work with for this entry.
    pub fn is_fuzzy_matchable(&self) -> bool {
        !self.keywords.is_empty() && !self.variations.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A prior conversation turn, used only when building prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}
