//! # Persona Knowledge
//!
//! Fact retrieval for a single-subject personal assistant.
//! No vector DB, no embeddings: a small hand-authored knowledge base and a few
//! cheap string heuristics.
//!
//! ## Design
//! - **Exact match**: normalized question/variation equality, or one
//!   unambiguous full-keyword hit
//! - **Direct match**: word-overlap similarity against questions and variations
//! - **Scored ranking**: keyword overlap + category mention + question similarity
//! - **Query cache**: bounded, insertion-order eviction, owned by the engine
//! - **Confidence**: how much the prompt builder should trust the facts
//!
//! ## How it works
//! ```text
//! User: "what does chris like to eat"
//!   ↓
//! RetrievalEngine::find_relevant_entries()
//!   ↓ identity? cache? direct match? scored ranking
//! Top 3 fact entries
//!   ↓
//! calculate_confidence() + context formatting
//!   ↓
//! Injected into the system prompt; the verifier checks the reply afterwards
//! ```

pub mod cache;
pub mod confidence;
pub mod dataset;
pub mod retrieval;
pub mod similarity;

pub use cache::{CacheStats, QueryCache};
pub use dataset::KnowledgeBase;
pub use retrieval::{RetrievalEngine, RetrievalResult, ScoredEntry};
pub use similarity::{keyword_match_count, string_similarity};
