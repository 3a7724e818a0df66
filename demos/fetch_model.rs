use anyhow::Result;
use llm_driver::backend::{resolve_artifacts, HF_TOKEN_ENV};
use llm_driver::utils::prelude::*;

const DEFAULT_MODEL: &str = "TinyLlama/TinyLlama-1.1B-Chat-v1.0";

/// Download (or locate in the cache) everything needed to run a model, so a
/// later batch run starts without network access. Set HF_TOKEN for gated
/// repositories.
fn main() -> Result<()> {
    setup_logging(LogConfig::default()).map_err(anyhow::Error::msg)?;

    let model = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    if std::env::var(HF_TOKEN_ENV).is_err() {
        println!("note: {} not set; gated repositories will fail", HF_TOKEN_ENV);
    }

    println!("resolving artifacts for {}", model);
    let artifacts = resolve_artifacts(&model)?;

    println!("config:    {}", artifacts.config.display());
    println!("tokenizer: {}", artifacts.tokenizer.display());
    for shard in &artifacts.weights {
        println!("weights:   {}", shard.display());
    }
    Ok(())
}
