//! Confidence estimation for retrieved facts.
//!
//! Structural cases are decided first (identity question, nothing retrieved,
//! exact match). Everything else maps the mean ranking score of the retrieved
//! entries linearly onto `[0, confidence_ceiling]`, saturating at
//! `confidence_saturation`. The ceiling stays below 1.0 so only structural
//! matches ever report full confidence.

use persona_core::types::FactEntry;
use std::sync::Arc;

use crate::retrieval::{RetrievalEngine, contains_any};

impl RetrievalEngine {
    /// How adequate `matched` is for answering `query`, in `[0, 1]`.
    pub fn calculate_confidence(&self, query: &str, matched: &[Arc<FactEntry>]) -> f64 {
        let normalized = Self::normalize(query);

        if contains_any(&normalized, &self.subject().confidence_identity_terms)
            && self.refers_to_subject(&normalized)
        {
            return 1.0;
        }

        if matched.is_empty() {
            return 0.0;
        }

        if self.find_exact_match(query).is_some() {
            return 1.0;
        }

        let config = self.config();
        let mean = matched
            .iter()
            .map(|entry| self.score_entry(&normalized, entry))
            .sum::<f64>()
            / matched.len() as f64;

        if config.confidence_saturation <= 0.0 {
            return config.confidence_ceiling.clamp(0.0, 1.0);
        }
        (mean / config.confidence_saturation).clamp(0.0, config.confidence_ceiling.clamp(0.0, 1.0))
    }
}
