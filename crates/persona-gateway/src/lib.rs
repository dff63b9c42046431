//! # Persona Gateway
//!
//! HTTP API over the answer pipeline: streamed chat, verified answers and
//! direct knowledge search.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
