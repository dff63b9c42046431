//! Persona configuration system.
//!
//! Matching heuristics (identity terms, stopwords, weights, thresholds) live
//! here as data so the same engine can serve a differently-authored
//! knowledge base without code changes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PersonaError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersonaConfig {
    /// External knowledge file (`.toml` or `.json`). Built-in facts when unset.
    #[serde(default)]
    pub knowledge_path: Option<String>,
    #[serde(default)]
    pub subject: SubjectConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub verifier: VerifierConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl PersonaConfig {
    /// Load config from the default path (~/.persona/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PersonaError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| PersonaError::Config(format!("Failed to parse config: {e}")))?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| PersonaError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// `PERSONA_OLLAMA_HOST` and `PERSONA_MODEL` win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("PERSONA_OLLAMA_HOST")
            && !host.trim().is_empty()
        {
            self.llm.endpoint = host.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("PERSONA_MODEL")
            && !model.trim().is_empty()
        {
            self.llm.model = model;
        }
    }

    /// Resolved knowledge file path, with `~` expanded.
    pub fn knowledge_file(&self) -> Option<PathBuf> {
        self.knowledge_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| PathBuf::from(shellexpand::tilde(p).to_string()))
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Persona home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".persona")
    }
}

/// Who the knowledge base describes, and how users refer to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectConfig {
    #[serde(default = "default_subject_name")]
    pub name: String,
    /// Terms that refer to the subject ("chris", "he", "him").
    #[serde(default = "default_self_references")]
    pub self_references: Vec<String>,
    /// Terms that make a query identity-seeking during retrieval.
    #[serde(default = "default_identity_terms")]
    pub identity_terms: Vec<String>,
    /// Terms that force full confidence when paired with a self reference.
    #[serde(default = "default_confidence_identity_terms")]
    pub confidence_identity_terms: Vec<String>,
    #[serde(default = "default_identity_entry_id")]
    pub identity_entry_id: String,
}

fn default_subject_name() -> String { "Chris".into() }
fn default_self_references() -> Vec<String> {
    vec!["chris", "he", "him"].into_iter().map(String::from).collect()
}
fn default_identity_terms() -> Vec<String> {
    vec!["who", "tell me about"].into_iter().map(String::from).collect()
}
fn default_confidence_identity_terms() -> Vec<String> { vec!["who".into()] }
fn default_identity_entry_id() -> String { "1".into() }

impl Default for SubjectConfig {
    fn default() -> Self {
        Self {
            name: default_subject_name(),
            self_references: default_self_references(),
            identity_terms: default_identity_terms(),
            confidence_identity_terms: default_confidence_identity_terms(),
            identity_entry_id: default_identity_entry_id(),
        }
    }
}

/// How the query cache picks its victim once full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Oldest inserted key goes first; hits do not refresh it.
    #[default]
    InsertionOrder,
    /// Least recently used key goes first.
    LeastRecentlyUsed,
}

/// Retrieval engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default)]
    pub eviction: EvictionPolicy,
    /// Similarity a question or variation must exceed for a direct match.
    #[serde(default = "default_direct_match_threshold")]
    pub direct_match_threshold: f64,
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,
    #[serde(default = "default_category_weight")]
    pub category_weight: f64,
    #[serde(default = "default_question_weight")]
    pub question_weight: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Extra same-category entries returned after the identity entry.
    #[serde(default = "default_identity_extras")]
    pub identity_extras: usize,
    /// Mean ranking score that maps to the confidence ceiling.
    #[serde(default = "default_confidence_saturation")]
    pub confidence_saturation: f64,
    /// Upper bound for scored (non-structural) confidence.
    #[serde(default = "default_confidence_ceiling")]
    pub confidence_ceiling: f64,
}

fn default_cache_capacity() -> usize { 20 }
fn default_direct_match_threshold() -> f64 { 0.7 }
fn default_keyword_weight() -> f64 { 1.5 }
fn default_category_weight() -> f64 { 1.5 }
fn default_question_weight() -> f64 { 2.0 }
fn default_top_k() -> usize { 3 }
fn default_identity_extras() -> usize { 2 }
fn default_confidence_saturation() -> f64 { 4.0 }
fn default_confidence_ceiling() -> f64 { 0.95 }

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            eviction: EvictionPolicy::default(),
            direct_match_threshold: default_direct_match_threshold(),
            keyword_weight: default_keyword_weight(),
            category_weight: default_category_weight(),
            question_weight: default_question_weight(),
            top_k: default_top_k(),
            identity_extras: default_identity_extras(),
            confidence_saturation: default_confidence_saturation(),
            confidence_ceiling: default_confidence_ceiling(),
        }
    }
}

/// Response verifier tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Sentences shorter than this (trimmed, in chars) always pass.
    #[serde(default = "default_min_sentence_len")]
    pub min_sentence_len: usize,
    /// A sentence starting with one of these is introductory.
    #[serde(default = "default_intro_prefixes")]
    pub intro_prefixes: Vec<String>,
    /// A sentence containing one of these is introductory.
    #[serde(default = "default_intro_markers")]
    pub intro_markers: Vec<String>,
    #[serde(default = "default_stopwords")]
    pub stopwords: Vec<String>,
    /// Words must be at least this long (in chars) to count as key terms.
    #[serde(default = "default_key_term_min_len")]
    pub key_term_min_len: usize,
    #[serde(default = "default_disclaimer")]
    pub disclaimer: String,
}

fn default_min_sentence_len() -> usize { 15 }
fn default_intro_prefixes() -> Vec<String> {
    vec!["chris", "he"].into_iter().map(String::from).collect()
}
fn default_intro_markers() -> Vec<String> {
    vec!["based on", "according to"].into_iter().map(String::from).collect()
}
fn default_stopwords() -> Vec<String> {
    vec!["this", "that", "with", "from", "about", "their", "there"]
        .into_iter().map(String::from).collect()
}
fn default_key_term_min_len() -> usize { 4 }
fn default_disclaimer() -> String {
    "(Note: I don't have specific information about this in my knowledge base.)".into()
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            min_sentence_len: default_min_sentence_len(),
            intro_prefixes: default_intro_prefixes(),
            intro_markers: default_intro_markers(),
            stopwords: default_stopwords(),
            key_term_min_len: default_key_term_min_len(),
            disclaimer: default_disclaimer(),
        }
    }
}

/// Text-generation backend (Ollama).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String { "http://localhost:11434".into() }
fn default_model() -> String { "llama3.1:latest".into() }
fn default_temperature() -> f32 { 0.7 }
fn default_top_p() -> f32 { 0.9 }
fn default_timeout_secs() -> u64 { 120 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "bool_true")]
    pub cors: bool,
}

fn bool_true() -> bool { true }
fn default_port() -> u16 { 3000 }
fn default_host() -> String { "127.0.0.1".into() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PersonaConfig::default();
        assert_eq!(config.subject.name, "Chris");
        assert_eq!(config.subject.identity_entry_id, "1");
        assert_eq!(config.retrieval.cache_capacity, 20);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.eviction, EvictionPolicy::InsertionOrder);
        assert_eq!(config.verifier.min_sentence_len, 15);
        assert_eq!(config.llm.model, "llama3.1:latest");
        assert!((config.llm.temperature - 0.7).abs() < 0.01);
        assert!(config.knowledge_file().is_none());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            knowledge_path = "/srv/facts.toml"

            [subject]
            name = "Ada"
            self_references = ["ada", "she", "her"]

            [retrieval]
            cache_capacity = 5
            eviction = "least_recently_used"

            [llm]
            model = "qwen3:4b"
        "#;

        let config: PersonaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.subject.name, "Ada");
        assert_eq!(config.subject.self_references, vec!["ada", "she", "her"]);
        // untouched fields keep defaults
        assert_eq!(config.subject.identity_terms, vec!["who", "tell me about"]);
        assert_eq!(config.retrieval.cache_capacity, 5);
        assert_eq!(config.retrieval.eviction, EvictionPolicy::LeastRecentlyUsed);
        assert_eq!(config.llm.model, "qwen3:4b");
        assert_eq!(config.llm.endpoint, "http://localhost:11434");
        assert_eq!(config.knowledge_file(), Some(PathBuf::from("/srv/facts.toml")));
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: PersonaConfig = toml::from_str("").unwrap();
        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.verifier.stopwords.len(), 7);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gateway]\nport = 8080\n").unwrap();

        let config = PersonaConfig::load_from(&path).unwrap();
        assert_eq!(config.gateway.port, 8080);
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "gateway = [not toml").unwrap();

        let err = PersonaConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, PersonaError::Config(_)));
    }

    #[test]
    fn test_home_dir() {
        let home = PersonaConfig::home_dir();
        assert!(home.to_string_lossy().contains(".persona"));
    }
}
