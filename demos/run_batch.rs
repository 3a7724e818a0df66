use anyhow::Result;
use indicatif::ProgressBar;
use llm_driver::{
    gpu,
    utils::prelude::*,
    BatchDriver, EngineConfig, SamplingConfig,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_MODEL: &str = "TinyLlama/TinyLlama-1.1B-Chat-v1.0";
const DEFAULT_BATCH_SIZE: usize = 4;

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging(LogConfig {
        level: tracing::Level::INFO,
        timestamps: true,
        ..Default::default()
    })
    .map_err(anyhow::Error::msg)?;

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 4 {
        eprintln!("Usage: {} [model] [prompt_file] [batch_size]", args[0]);
        std::process::exit(1);
    }
    let model = args.get(1).cloned().unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let prompts = match args.get(2) {
        Some(path) => read_prompts(path)?,
        None => default_prompts(),
    };
    let batch_size = match args.get(3) {
        Some(raw) => raw.parse()?,
        None => DEFAULT_BATCH_SIZE,
    };

    // Report accelerator status before anything is allocated.
    let devices = gpu::query_devices();
    if devices.is_empty() {
        info!("no accelerator reported; the engine may fall back to CPU");
    }
    for device in &devices {
        info!(
            index = device.index,
            name = %device.name,
            free_mib = device.memory_free_mib(),
            total_mib = device.memory_total_mib,
            "accelerator"
        );
    }

    let config = EngineConfig::new(model)
        .with_memory_fraction(0.85)
        .with_max_context(2048);
    let driver = BatchDriver::new(llm_driver::initialize(config));
    if let Some(reason) = driver.handle().absence_reason() {
        info!(reason = %reason, "running without a model; output will be empty");
    }

    let sampling = SamplingConfig {
        temperature: 0.8,
        top_p: 0.95,
        max_tokens: 128,
    };

    let progress = ProgressBar::new_spinner();
    progress.enable_steady_tick(Duration::from_millis(120));
    progress.set_message(format!("generating {} prompts", prompts.len()));

    let report = driver.run(&prompts, &sampling, batch_size).await;
    progress.finish_and_clear();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    llm_driver::render_results(&report.results, &mut out)?;

    if let Some(failure) = &report.failure {
        if failure.is_resource_exhaustion() {
            warn!(error = %failure, "run halted early under memory pressure");
        } else {
            warn!(error = %failure, "run halted early");
        }
    }

    // Print performance summary
    let snapshot = driver.metrics().snapshot();
    info!("Run Summary:");
    info!("  Prompts completed: {}", snapshot.prompts_completed);
    info!("  Chunks submitted:  {}", snapshot.chunks_submitted);
    info!("  Tokens generated:  {}", snapshot.tokens_generated);
    info!("  Generation time:   {:.2?}", snapshot.generation_time);
    info!("  Throughput:        {:.1} tokens/sec", snapshot.tokens_per_second);

    Ok(())
}

fn read_prompts(path: &str) -> Result<Vec<String>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let lines: Vec<String> = reader.lines().collect::<io::Result<_>>()?;
    Ok(lines.into_iter().filter(|line| !line.trim().is_empty()).collect())
}

fn default_prompts() -> Vec<String> {
    [
        "Hello, my name is",
        "The president of the United States is",
        "The capital of France is",
        "The future of AI is",
        "Write a haiku about mountains:",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
