//! llm-driver - Batched text generation over a locally loaded language model
//!
//! This crate drives chunked prompt submission against an inference engine:
//! build an [`EngineConfig`], bring the engine up with [`initialize`] (which
//! degrades to an absent handle instead of failing), then feed prompts
//! through a [`BatchDriver`] and present the paired results with
//! [`render_results`]. A run that fails midway keeps everything generated
//! before the failure.

#![warn(missing_docs)]

use std::fmt;

use candle_core::Device;

// Public modules
pub mod backend;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod metrics;
pub mod types;
pub mod utils;

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-exports for public API
pub use config::{EngineConfig, Precision, Quantization, SamplingConfig};
pub use driver::{render_results, BatchDriver, BatchReport};
pub use engine::{initialize, Engine, EngineHandle};
pub use error::{DriverError, Result};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use types::{Completion, GenerationResult};

/// Feature detection for supported backends
pub struct Features {
    /// Whether CUDA support is enabled
    pub cuda: bool,
    /// Number of detected CUDA devices
    pub cuda_devices: usize,
}

impl Features {
    /// Detect available features at runtime
    pub fn detect() -> Self {
        // cuda_if_available falls back to Cpu, so probe the device kind.
        let cuda_devices = (0..8)
            .filter(|&i| {
                Device::cuda_if_available(i)
                    .map(|device| device.is_cuda())
                    .unwrap_or(false)
            })
            .count();

        Self {
            cuda: cuda_devices > 0,
            cuda_devices,
        }
    }
}

impl fmt::Display for Features {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CUDA support: {}", if self.cuda { "yes" } else { "no" })?;
        if self.cuda {
            writeln!(f, "CUDA devices: {}", self.cuda_devices)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_detection() {
        let features = Features::detect();
        println!("Detected features:\n{}", features);
    }

    #[test]
    fn test_version_number() {
        assert!(!VERSION.is_empty());
    }
}
