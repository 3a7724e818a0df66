//! Common type definitions used throughout the driver

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One completion as produced by an engine for a single prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text, without the prompt.
    pub text: String,
    /// Number of tokens sampled for this completion.
    pub tokens_generated: usize,
    /// Wall-clock time spent generating it.
    pub processing_time: Duration,
}

/// A completion paired with the prompt that produced it.
///
/// The driver emits these in input order, so `results[i]` always belongs to
/// the i-th submitted prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// The prompt as it was submitted.
    pub prompt: String,
    /// Generated text, without the prompt.
    pub text: String,
    /// Number of tokens sampled for this completion.
    pub tokens_generated: usize,
    /// Wall-clock time spent generating it.
    pub processing_time: Duration,
}

impl GenerationResult {
    /// Pair a completion with the prompt it answers.
    pub fn from_completion(prompt: String, completion: Completion) -> Self {
        Self {
            prompt,
            text: completion.text,
            tokens_generated: completion.tokens_generated,
            processing_time: completion.processing_time,
        }
    }
}
