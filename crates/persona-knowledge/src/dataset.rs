//! Knowledge base: the fixed set of facts the assistant may talk about.
//!
//! Loaded once at startup (built-in TOML or an external `.toml` / `.json`
//! file) and never mutated. An empty or malformed knowledge base is a fatal
//! startup error: every lookup would silently come back empty otherwise.

use persona_core::config::PersonaConfig;
use persona_core::error::{PersonaError, Result};
use persona_core::types::FactEntry;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

const BUILTIN_FACTS: &str = include_str!("../data/facts.toml");

/// On-disk layout: a list of `[[entries]]` tables (or `{"entries": [...]}`).
#[derive(Deserialize)]
struct KnowledgeFile {
    entries: Vec<FactEntry>,
}

/// Immutable, validated collection of fact entries in authoring order.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entries: Vec<Arc<FactEntry>>,
}

impl KnowledgeBase {
    /// Build from entries, rejecting an empty set and duplicate ids.
    pub fn new(entries: Vec<FactEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(PersonaError::KnowledgeBase(
                "knowledge base has no entries".into(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.id.trim().is_empty() {
                return Err(PersonaError::KnowledgeBase(format!(
                    "entry with question '{}' has an empty id",
                    entry.question
                )));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(PersonaError::KnowledgeBase(format!(
                    "duplicate entry id '{}'",
                    entry.id
                )));
            }
            if !entry.is_fuzzy_matchable() {
                tracing::warn!(
                    "Entry '{}' has no keywords or variations; only exact questions will find it",
                    entry.id
                );
            }
        }

        Ok(Self {
            entries: entries.into_iter().map(Arc::new).collect(),
        })
    }

    /// The facts shipped with the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_FACTS)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: KnowledgeFile = toml::from_str(content)
            .map_err(|e| PersonaError::KnowledgeBase(format!("Failed to parse knowledge TOML: {e}")))?;
        Self::new(file.entries)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: KnowledgeFile = serde_json::from_str(content)
            .map_err(|e| PersonaError::KnowledgeBase(format!("Failed to parse knowledge JSON: {e}")))?;
        Self::new(file.entries)
    }

    /// Load from a `.toml` or `.json` file, chosen by extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PersonaError::KnowledgeBase(format!("Failed to read {}: {e}", path.display()))
        })?;
        let kb = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content)?,
            Some("toml") => Self::from_toml_str(&content)?,
            other => {
                return Err(PersonaError::KnowledgeBase(format!(
                    "Unsupported knowledge file extension: {}",
                    other.unwrap_or("<none>")
                )));
            }
        };
        tracing::info!("📚 Loaded {} facts from {}", kb.len(), path.display());
        Ok(kb)
    }

    /// Knowledge file from config when set, built-in facts otherwise.
    pub fn from_config(config: &PersonaConfig) -> Result<Self> {
        match config.knowledge_file() {
            Some(path) => Self::load(&path),
            None => {
                let kb = Self::builtin()?;
                tracing::info!("📚 Using {} built-in facts", kb.len());
                Ok(kb)
            }
        }
    }

    pub fn entries(&self) -> &[Arc<FactEntry>] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&Arc<FactEntry>> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(|e| e.category.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> FactEntry {
        FactEntry {
            id: id.into(),
            question: format!("Question {id}?"),
            answer: "Answer.".into(),
            category: "misc".into(),
            keywords: vec!["k".into()],
            variations: vec!["v".into()],
        }
    }

    #[test]
    fn test_builtin_facts_are_valid() {
        let kb = KnowledgeBase::builtin().unwrap();
        assert_eq!(kb.len(), 9);
        assert_eq!(kb.get("1").unwrap().question, "What's my name?");
        assert_eq!(kb.categories(), vec!["personal", "education"]);
        assert!(kb.entries().iter().all(|e| e.is_fuzzy_matchable()));
    }

    #[test]
    fn test_empty_knowledge_base_is_rejected() {
        let err = KnowledgeBase::new(vec![]).unwrap_err();
        assert!(matches!(err, PersonaError::KnowledgeBase(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let err = KnowledgeBase::new(vec![entry("a"), entry("b"), entry("a")]).unwrap_err();
        assert!(err.to_string().contains("duplicate entry id 'a'"));
    }

    #[test]
    fn test_empty_id_is_rejected() {
        assert!(KnowledgeBase::new(vec![entry(" ")]).is_err());
    }

    #[test]
    fn test_load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.json");
        std::fs::write(
            &path,
            r#"{"entries": [{"id": "w", "question": "What are my work hours?",
                "answer": "Nine to five.", "category": "schedule",
                "keywords": ["work", "hours"], "variations": ["when do i work"]}]}"#,
        )
        .unwrap();

        let kb = KnowledgeBase::load(&path).unwrap();
        assert_eq!(kb.len(), 1);
        assert_eq!(kb.get("w").unwrap().category, "schedule");
    }

    #[test]
    fn test_load_toml_with_zero_entries_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.toml");
        std::fs::write(&path, "entries = []\n").unwrap();
        assert!(KnowledgeBase::load(&path).is_err());
    }

    #[test]
    fn test_load_unknown_extension_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.yaml");
        std::fs::write(&path, "entries: []").unwrap();
        let err = KnowledgeBase::load(&path).unwrap_err();
        assert!(err.to_string().contains("yaml"));
    }

    #[test]
    fn test_from_config_defaults_to_builtin() {
        let kb = KnowledgeBase::from_config(&PersonaConfig::default()).unwrap();
        assert_eq!(kb.len(), 9);
    }
}
