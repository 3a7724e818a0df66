// Location: src/config.rs

//! Engine and sampling configuration records

use serde::{Deserialize, Serialize};

/// How model weights are held in accelerator memory.
///
/// `Auto` defers to the engine, which picks per device capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// Let the engine choose a dtype for the device.
    Auto,
    /// IEEE half precision.
    Float16,
    /// Brain floating point.
    BFloat16,
    /// Full single precision.
    Float32,
}

/// Weight quantization schemes an engine may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantization {
    /// Activation-aware weight quantization.
    Awq,
    /// GPTQ post-training quantization.
    Gptq,
    /// 8-bit floating point weights.
    Fp8,
}

/// Engine construction parameters.
///
/// The driver passes these through to the engine untouched; range checks
/// happen at engine construction, so a bad value shows up as a failed
/// initialization rather than an early panic here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Model identifier: a hub repo id or a local checkpoint directory.
    pub model: String,

    /// Tensor-parallel degree requested from the engine.
    pub parallelism: usize,

    /// Numeric precision for model weights.
    pub precision: Precision,

    /// Fraction of accelerator memory the engine may claim, in (0, 1].
    pub memory_fraction: f32,

    /// Cap on the model context window. `None` keeps the checkpoint's own.
    pub max_context: Option<usize>,

    /// Optional weight quantization scheme.
    pub quantization: Option<Quantization>,

    /// Request eager execution instead of ahead-of-time graph capture.
    pub eager: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: "TinyLlama/TinyLlama-1.1B-Chat-v1.0".to_string(),
            parallelism: 1,
            precision: Precision::Auto,
            memory_fraction: 0.9,
            max_context: None,
            quantization: None,
            eager: false,
        }
    }
}

impl EngineConfig {
    /// Configuration for `model` with every other field at its default.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Set the context window cap.
    pub fn with_max_context(mut self, max_context: usize) -> Self {
        self.max_context = Some(max_context);
        self
    }

    /// Set the accelerator memory fraction.
    pub fn with_memory_fraction(mut self, memory_fraction: f32) -> Self {
        self.memory_fraction = memory_fraction;
        self
    }

    /// Set the weight precision.
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }
}

/// Sampling parameters applied to every prompt in a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Softmax temperature. Zero selects greedy decoding.
    pub temperature: f64,

    /// Nucleus sampling threshold.
    pub top_p: f64,

    /// Maximum number of tokens to generate per prompt.
    pub max_tokens: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            max_tokens: 256,
        }
    }
}

impl SamplingConfig {
    /// Greedy decoding with the given token budget.
    pub fn greedy(max_tokens: usize) -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            max_tokens,
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the nucleus sampling threshold.
    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    /// Set the per-prompt token budget.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}
