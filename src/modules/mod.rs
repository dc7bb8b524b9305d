//! Modules layer - Infrastructure components for external integrations
//!
//! Contains clients and adapters for external services, currently the
//! text-generation provider used to run and translate prompts.

pub mod llm;
