//! System prompt assembly.

use persona_core::types::{ChatTurn, FactEntry, Role};
use serde::Deserialize;
use std::sync::Arc;

const BASE_PROMPT: &str = "You are a helpful assistant that provides clear, concise answers. \n\
Always respond directly to the user's question without showing your thinking process.\n\
Be professional, friendly, and to the point.";

/// Below this the model is told to admit the facts don't cover the question.
pub const LOW_CONFIDENCE: f64 = 0.3;

/// Only the most recent turns are rendered into the prompt.
pub const MAX_HISTORY_TURNS: usize = 6;

/// Per-turn request context supplied by the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TurnContext {
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub is_follow_up: bool,
    #[serde(default)]
    pub topic_changed: bool,
    /// Model override for this turn.
    #[serde(default)]
    pub model: Option<String>,
}

/// Facts block for the system prompt. Empty when there are no entries.
pub fn format_context(subject: &str, entries: &[Arc<FactEntry>]) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let mut context = format!("Facts about {subject}:\n\n");
    for entry in entries {
        context.push_str(&format!("• {}\n", entry.answer));
    }
    context.push_str(&format!(
        "\nUse this information to help users learn about {subject}. You can present this \
         information in different ways and use your own words, but only share facts mentioned above."
    ));
    context
}

pub fn build_system_prompt(context: &str, turn: &TurnContext, confidence: f64) -> String {
    let mut prompt = format!("{BASE_PROMPT}\n\n{context}");

    if confidence < LOW_CONFIDENCE {
        prompt.push_str(
            "\n\nIf the facts above do not answer the question, say that your knowledge base \
             does not cover it instead of guessing.",
        );
    }

    if turn.topic_changed {
        prompt.push_str(
            "\n\nThe user has changed the topic. Do not carry assumptions over from earlier turns.",
        );
    } else if turn.is_follow_up {
        prompt.push_str(
            "\n\nThe user's message follows up on your previous answer. Keep your reply consistent with it.",
        );
    }

    let start = turn.history.len().saturating_sub(MAX_HISTORY_TURNS);
    let recent = &turn.history[start..];
    if !recent.is_empty() {
        prompt.push_str("\n\nConversation so far:\n");
        for t in recent {
            let speaker = match t.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            prompt.push_str(&format!("{speaker}: {}\n", t.content.trim()));
        }
    }

    prompt
}
