//! Retrieval engine. Picks the facts relevant to a user query.
//!
//! Order of checks in [`RetrievalEngine::find_relevant_entries`]:
//! 1. identity questions ("who is he") → identity entry + same-category extras
//! 2. cache hit → cached result
//! 3. empty query → nothing (not cached)
//! 4. direct question/variation match → that single entry (not cached)
//! 5. scored ranking → top-k by keyword/category/question score (cached)

use persona_core::config::{PersonaConfig, RetrievalConfig, SubjectConfig};
use persona_core::types::FactEntry;
use serde::Serialize;
use std::sync::Arc;

use crate::cache::QueryCache;
use crate::dataset::KnowledgeBase;
use crate::similarity::{keyword_match_count, string_similarity};

/// Ranked entries for one query, most relevant first.
pub type RetrievalResult = Vec<Arc<FactEntry>>;

/// Characters stripped from queries and questions before exact comparison.
const EXACT_MATCH_PUNCTUATION: [char; 6] = ['.', ',', '?', '!', ';', ':'];

/// An entry together with its ranking score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredEntry {
    pub entry: Arc<FactEntry>,
    pub score: f64,
    pub keyword_matches: usize,
}

/// Owns the knowledge base, the matching vocabulary and the query cache.
pub struct RetrievalEngine {
    kb: Arc<KnowledgeBase>,
    subject: SubjectConfig,
    config: RetrievalConfig,
    cache: QueryCache,
}

impl RetrievalEngine {
    pub fn new(kb: Arc<KnowledgeBase>, config: &PersonaConfig) -> Self {
        let cache = QueryCache::new(config.retrieval.cache_capacity, config.retrieval.eviction);
        Self::with_cache(kb, config, cache)
    }

    /// Use a caller-built cache (tests, shared caches, custom capacity).
    pub fn with_cache(kb: Arc<KnowledgeBase>, config: &PersonaConfig, cache: QueryCache) -> Self {
        if kb.get(&config.subject.identity_entry_id).is_none() {
            tracing::warn!(
                "Identity entry '{}' not in knowledge base; identity questions fall back to ranking",
                config.subject.identity_entry_id
            );
        }
        Self {
            kb,
            subject: config.subject.clone(),
            config: config.retrieval.clone(),
            cache,
        }
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn subject(&self) -> &SubjectConfig {
        &self.subject
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Lowercase + trim, the key used for caching and ranking.
    pub fn normalize(query: &str) -> String {
        query.to_lowercase().trim().to_string()
    }

    /// Whether the normalized query mentions the subject ("chris", "he", "him").
    pub(crate) fn refers_to_subject(&self, normalized: &str) -> bool {
        contains_any(normalized, &self.subject.self_references)
    }

    fn is_identity_query(&self, normalized: &str) -> bool {
        contains_any(normalized, &self.subject.identity_terms) && self.refers_to_subject(normalized)
    }

    /// Entries relevant to `query`, at most `top_k` of them.
    pub fn find_relevant_entries(&self, query: &str) -> RetrievalResult {
        let query = Self::normalize(query);

        if self.is_identity_query(&query)
            && let Some(identity) = self.identity_entries()
        {
            tracing::debug!("Identity query '{query}' → {} entries", identity.len());
            return identity;
        }

        if let Some(cached) = self.cache.get(&query) {
            tracing::debug!("Query cache hit for '{query}'");
            return cached;
        }

        if query.is_empty() {
            return Vec::new();
        }

        if let Some(entry) = self.direct_match(&query) {
            tracing::debug!("Direct match for '{query}' → entry {}", entry.id);
            return vec![entry];
        }

        let result: RetrievalResult = self
            .rank(&query)
            .into_iter()
            .take(self.config.top_k)
            .map(|scored| scored.entry)
            .collect();

        tracing::debug!(
            "Ranked '{query}' → [{}]",
            result.iter().map(|e| e.id.as_str()).collect::<Vec<_>>().join(", ")
        );
        self.cache.insert(query, result.clone());
        result
    }

    /// Identity entry followed by up to `identity_extras` entries of its category.
    fn identity_entries(&self) -> Option<RetrievalResult> {
        let identity = self.kb.get(&self.subject.identity_entry_id)?;
        let mut result = vec![identity.clone()];
        result.extend(
            self.kb
                .entries()
                .iter()
                .filter(|e| e.category == identity.category && e.id != identity.id)
                .take(self.config.identity_extras)
                .cloned(),
        );
        Some(result)
    }

    /// First entry whose question or any variation is similar enough.
    fn direct_match(&self, query: &str) -> Option<Arc<FactEntry>> {
        let threshold = self.config.direct_match_threshold;
        self.kb
            .entries()
            .iter()
            .find(|entry| {
                string_similarity(query, &entry.question.to_lowercase()) > threshold
                    || entry
                        .variations
                        .iter()
                        .any(|v| string_similarity(query, &v.to_lowercase()) > threshold)
            })
            .cloned()
    }

    /// Ranking score of one entry against an already normalized query.
    pub fn score_entry(&self, query: &str, entry: &FactEntry) -> f64 {
        self.score_parts(query, entry).0
    }

    fn score_parts(&self, query: &str, entry: &FactEntry) -> (f64, usize) {
        let keyword_matches = keyword_match_count(query, &entry.keywords);
        let mut score = keyword_matches as f64 * self.config.keyword_weight;

        if query.contains(entry.category.to_lowercase().as_str()) {
            score += self.config.category_weight;
        }

        score += string_similarity(query, &entry.question) * self.config.question_weight;
        (score, keyword_matches)
    }

    /// Every entry with a positive score, best first; ties keep knowledge-base order.
    pub fn rank(&self, query: &str) -> Vec<ScoredEntry> {
        let query = Self::normalize(query);
        let mut scored: Vec<ScoredEntry> = self
            .kb
            .entries()
            .iter()
            .filter_map(|entry| {
                let (score, keyword_matches) = self.score_parts(&query, entry);
                (score > 0.0).then(|| ScoredEntry {
                    entry: entry.clone(),
                    score,
                    keyword_matches,
                })
            })
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }

    /// Structural match: same question or variation after normalization, or
    /// the only entry whose every keyword appears in the query.
    pub fn find_exact_match(&self, query: &str) -> Option<Arc<FactEntry>> {
        let normalized = normalize_exact(query);
        let entries = self.kb.entries();

        if let Some(entry) = entries
            .iter()
            .find(|e| normalize_exact(&e.question) == normalized)
        {
            return Some(entry.clone());
        }

        if let Some(entry) = entries
            .iter()
            .find(|e| e.variations.iter().any(|v| normalize_exact(v) == normalized))
        {
            return Some(entry.clone());
        }

        // entries without keywords would qualify for every query
        let mut keyword_hits = entries.iter().filter(|e| {
            !e.keywords.is_empty()
                && e.keywords
                    .iter()
                    .all(|k| normalized.contains(k.to_lowercase().as_str()))
        });
        match (keyword_hits.next(), keyword_hits.next()) {
            (Some(only), None) => Some(only.clone()),
            _ => None,
        }
    }
}

/// Lowercase, trim, then drop `. , ? ! ; :` anywhere in the string.
fn normalize_exact(text: &str) -> String {
    text.to_lowercase()
        .trim()
        .chars()
        .filter(|c| !EXACT_MATCH_PUNCTUATION.contains(c))
        .collect()
}

pub(crate) fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .any(|n| !n.is_empty() && haystack.contains(n.to_lowercase().as_str()))
}
