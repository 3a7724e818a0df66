// Location: src/backend/llama.rs

use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::llama::{Cache, Config, Llama, LlamaConfig, LlamaEosToks};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::config::{EngineConfig, Precision, SamplingConfig};
use crate::engine::Engine;
use crate::error::{DriverError, Result};
use crate::types::Completion;

use super::fetch;

const SAMPLE_SEED: u64 = 299792458;
const FALLBACK_EOS_TOKEN: &str = "</s>";

/// In-process Llama-family engine.
///
/// Holds mmapped weights for one checkpoint. Sequences inside a chunk are
/// generated one after another; the KV cache is rebuilt per prompt so
/// completions never leak context into each other.
pub struct LlamaEngine {
    model_id: String,
    model: Llama,
    model_config: Config,
    tokenizer: Tokenizer,
    device: Device,
    dtype: DType,
    max_context: usize,
    eos: Option<LlamaEosToks>,
}

impl LlamaEngine {
    /// Load the checkpoint named by `config` and build an engine around it.
    pub fn load(config: &EngineConfig) -> Result<Self> {
        validate(config)?;

        let artifacts = fetch::resolve_artifacts(&config.model).map_err(|e| {
            DriverError::InitializationError {
                engine: config.model.clone(),
                message: format!("failed to resolve model artifacts: {}", e),
                source: Some(Box::new(e)),
            }
        })?;

        let device = Device::cuda_if_available(0).map_err(|e| {
            DriverError::InitializationError {
                engine: config.model.clone(),
                message: format!("accelerator initialization failed: {}", e),
                source: Some(Box::new(e)),
            }
        })?;
        let dtype = dtype_for(config.precision, &device);
        // Candle owns its allocator; the fraction is a target, not a limit.
        info!(
            cuda = device.is_cuda(),
            dtype = ?dtype,
            memory_fraction = config.memory_fraction,
            "selected device"
        );
        if config.eager {
            debug!("eager execution requested; this engine always executes eagerly");
        }

        let raw_config =
            std::fs::read(&artifacts.config).map_err(|e| DriverError::InitializationError {
                engine: config.model.clone(),
                message: format!("failed to read {}: {}", artifacts.config.display(), e),
                source: Some(Box::new(e)),
            })?;
        let model_config: LlamaConfig =
            serde_json::from_slice(&raw_config).map_err(|e| DriverError::InitializationError {
                engine: config.model.clone(),
                message: format!("invalid model config: {}", e),
                source: Some(Box::new(e)),
            })?;
        let model_config = model_config.into_config(false);

        let model_max = model_config.max_position_embeddings;
        let max_context = config.max_context.unwrap_or(model_max).min(model_max);
        if let Some(requested) = config.max_context {
            if requested > model_max {
                debug!(
                    requested,
                    effective = max_context,
                    "context window capped at the checkpoint maximum"
                );
            }
        }

        let tokenizer = Tokenizer::from_file(&artifacts.tokenizer).map_err(|e| {
            DriverError::InitializationError {
                engine: config.model.clone(),
                message: format!("failed to load tokenizer: {}", e),
                source: Some(e),
            }
        })?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&artifacts.weights, dtype, &device)
        }
        .map_err(|e| DriverError::InitializationError {
            engine: config.model.clone(),
            message: format!("failed to map weights: {}", e),
            source: Some(Box::new(e)),
        })?;
        let model = Llama::load(vb, &model_config).map_err(|e| {
            DriverError::InitializationError {
                engine: config.model.clone(),
                message: format!("failed to build model graph: {}", e),
                source: Some(Box::new(e)),
            }
        })?;

        let eos = model_config.eos_token_id.clone().or_else(|| {
            tokenizer
                .token_to_id(FALLBACK_EOS_TOKEN)
                .map(LlamaEosToks::Single)
        });

        info!(
            engine = %config.model,
            shards = artifacts.weights.len(),
            max_context,
            "model loaded"
        );

        Ok(Self {
            model_id: config.model.clone(),
            model,
            model_config,
            tokenizer,
            device,
            dtype,
            max_context,
            eos,
        })
    }

    fn complete(
        &self,
        prompt: &str,
        sampling: &SamplingConfig,
        sequence: u64,
    ) -> Result<Completion> {
        let start_time = Instant::now();

        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| DriverError::GenerationError {
                message: format!("tokenization failed: {}", e),
                resource_exhausted: false,
                source: Some(e),
            })?;
        let mut tokens: Vec<u32> = encoding.get_ids().to_vec();
        let budget = generation_budget(tokens.len(), self.max_context, sampling.max_tokens)?;

        let mut cache = Cache::new(true, self.dtype, &self.model_config, &self.device)
            .map_err(engine_failure)?;
        let temperature = (sampling.temperature > 0.0).then_some(sampling.temperature);
        let mut logits_processor = LogitsProcessor::new(
            SAMPLE_SEED.wrapping_add(sequence),
            temperature,
            Some(sampling.top_p),
        );

        let mut generated: Vec<u32> = Vec::new();
        let mut index_pos = 0;
        for step in 0..budget {
            // First step feeds the whole prompt, later steps only the newest
            // token; the KV cache carries the rest.
            let (context_size, context_index) = if step > 0 {
                (1, index_pos)
            } else {
                (tokens.len(), 0)
            };
            let ctxt = &tokens[tokens.len().saturating_sub(context_size)..];
            let input = Tensor::new(ctxt, &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(engine_failure)?;
            let logits = self
                .model
                .forward(&input, context_index, &mut cache)
                .map_err(engine_failure)?;
            let logits = logits
                .squeeze(0)
                .and_then(|l| l.to_dtype(DType::F32))
                .map_err(engine_failure)?;
            index_pos += ctxt.len();

            let next_token = logits_processor.sample(&logits).map_err(engine_failure)?;
            tokens.push(next_token);
            generated.push(next_token);

            if self.is_eos(next_token) {
                break;
            }
        }

        let text = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| DriverError::GenerationError {
                message: format!("decoding failed: {}", e),
                resource_exhausted: false,
                source: Some(e),
            })?;

        Ok(Completion {
            text,
            tokens_generated: generated.len(),
            processing_time: start_time.elapsed(),
        })
    }

    fn is_eos(&self, token: u32) -> bool {
        match &self.eos {
            Some(LlamaEosToks::Single(eos)) => *eos == token,
            Some(LlamaEosToks::Multiple(eos)) => eos.contains(&token),
            None => false,
        }
    }
}

impl std::fmt::Debug for LlamaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlamaEngine")
            .field("model_id", &self.model_id)
            .field("device", &self.device)
            .field("dtype", &self.dtype)
            .field("max_context", &self.max_context)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Engine for LlamaEngine {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn generate(
        &self,
        prompts: &[String],
        sampling: &SamplingConfig,
    ) -> Result<Vec<Completion>> {
        validate_sampling(sampling)?;

        let mut completions = Vec::with_capacity(prompts.len());
        for (sequence, prompt) in prompts.iter().enumerate() {
            completions.push(self.complete(prompt, sampling, sequence as u64)?);
        }
        Ok(completions)
    }
}

/// Reject construction parameters this engine cannot honor.
fn validate(config: &EngineConfig) -> Result<()> {
    if config.model.is_empty() {
        return Err(DriverError::ConfigurationError {
            message: "model identifier cannot be empty".to_string(),
            parameter: "model".to_string(),
        });
    }
    if config.parallelism == 0 {
        return Err(DriverError::ConfigurationError {
            message: "parallel degree must be positive".to_string(),
            parameter: "parallelism".to_string(),
        });
    }
    if config.parallelism > 1 {
        return Err(DriverError::InitializationError {
            engine: config.model.clone(),
            message: format!(
                "tensor parallel degree {} not supported by the in-process engine",
                config.parallelism
            ),
            source: None,
        });
    }
    if !(config.memory_fraction > 0.0 && config.memory_fraction <= 1.0) {
        return Err(DriverError::ConfigurationError {
            message: "must be in (0, 1]".to_string(),
            parameter: "memory_fraction".to_string(),
        });
    }
    if config.max_context == Some(0) {
        return Err(DriverError::ConfigurationError {
            message: "context window must be positive".to_string(),
            parameter: "max_context".to_string(),
        });
    }
    if let Some(quantization) = config.quantization {
        return Err(DriverError::InitializationError {
            engine: config.model.clone(),
            message: format!(
                "{:?} quantization not supported by the in-process engine",
                quantization
            ),
            source: None,
        });
    }
    Ok(())
}

fn validate_sampling(sampling: &SamplingConfig) -> Result<()> {
    if !(sampling.temperature >= 0.0) {
        return Err(DriverError::ConfigurationError {
            message: "must be a non-negative number".to_string(),
            parameter: "temperature".to_string(),
        });
    }
    if !(sampling.top_p > 0.0 && sampling.top_p <= 1.0) {
        return Err(DriverError::ConfigurationError {
            message: "must be in (0, 1]".to_string(),
            parameter: "top_p".to_string(),
        });
    }
    Ok(())
}

/// Output-token budget for a prompt of `prompt_len` tokens.
///
/// Rejects empty encodings (the first forward pass needs at least one input
/// token) and prompts that already fill the context window.
fn generation_budget(prompt_len: usize, max_context: usize, max_tokens: usize) -> Result<usize> {
    if prompt_len == 0 {
        return Err(DriverError::GenerationError {
            message: "prompt encoded to zero tokens".to_string(),
            resource_exhausted: false,
            source: None,
        });
    }
    if prompt_len >= max_context {
        return Err(DriverError::GenerationError {
            message: format!(
                "prompt of {} tokens exceeds the {} token context window",
                prompt_len, max_context
            ),
            resource_exhausted: false,
            source: None,
        });
    }
    Ok(max_tokens.min(max_context - prompt_len))
}

fn dtype_for(precision: Precision, device: &Device) -> DType {
    match precision {
        Precision::Float32 => DType::F32,
        Precision::Float16 => DType::F16,
        Precision::BFloat16 => DType::BF16,
        Precision::Auto => {
            if device.is_cuda() {
                DType::BF16
            } else {
                DType::F32
            }
        }
    }
}

fn engine_failure(error: candle_core::Error) -> DriverError {
    DriverError::generation(format!("engine failure: {}", error), Some(Box::new(error)))
}
