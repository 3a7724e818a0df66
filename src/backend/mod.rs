//! Engine backends: concrete implementations of the generation capability

mod fetch;
mod llama;

pub use fetch::{resolve_artifacts, FetchError, ModelArtifacts, HF_TOKEN_ENV};
pub use llama::LlamaEngine;

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::Result;

/// Construct the in-process engine for `config`.
///
/// Called once per process by [`crate::engine::initialize`]; callers holding
/// the returned box own the only engine instance.
pub fn load(config: &EngineConfig) -> Result<Box<dyn Engine>> {
    let engine = LlamaEngine::load(config)?;
    Ok(Box::new(engine))
}
