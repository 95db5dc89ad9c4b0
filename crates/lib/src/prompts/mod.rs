//! # Prompt Template Modules
//!
//! Prompt templates used by the query orchestrator.

pub mod core;
