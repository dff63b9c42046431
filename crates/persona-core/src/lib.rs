//! # Persona Core
//!
//! Shared building blocks for the Persona workspace:
//! - [`FactEntry`]: one hand-authored fact about the subject
//! - [`PersonaConfig`]: TOML configuration with per-field defaults
//! - [`PersonaError`]: the error type every library crate returns

pub mod config;
pub mod error;
pub mod types;

pub use config::PersonaConfig;
pub use error::{PersonaError, Result};
pub use types::{ChatTurn, FactEntry, Role};
