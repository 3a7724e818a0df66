//! Engine module: the opaque generation capability and its process-wide handle

mod handle;

pub use handle::{initialize, EngineHandle};

use crate::{config::SamplingConfig, error::Result, types::Completion};

/// The generation capability the driver submits work to.
///
/// Implementations promise that a successful `generate` call returns exactly
/// one completion per prompt, in prompt order. The driver treats any other
/// reply shape as a generation failure.
#[async_trait::async_trait]
pub trait Engine: Send + Sync {
    /// Identifier used in diagnostics, typically the model id.
    fn id(&self) -> &str;

    /// Generate one completion per prompt.
    async fn generate(
        &self,
        prompts: &[String],
        sampling: &SamplingConfig,
    ) -> Result<Vec<Completion>>;
}
