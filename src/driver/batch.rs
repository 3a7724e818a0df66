use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::{
    config::SamplingConfig,
    engine::EngineHandle,
    error::DriverError,
    metrics::MetricsCollector,
    types::GenerationResult,
};

/// Outcome of one batched run.
///
/// Partial progress is first class: `results` holds everything that
/// completed before a failure, `failure` the typed cause when the run
/// stopped early. A degraded run over an absent engine is an empty success,
/// not a failure.
#[derive(Debug)]
pub struct BatchReport {
    /// Completed results, in submission order.
    pub results: Vec<GenerationResult>,
    /// Why the run halted, if it did.
    pub failure: Option<DriverError>,
}

impl BatchReport {
    /// True when every submitted prompt produced a result.
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    fn complete(results: Vec<GenerationResult>) -> Self {
        Self {
            results,
            failure: None,
        }
    }

    fn failed(results: Vec<GenerationResult>, failure: DriverError) -> Self {
        Self {
            results,
            failure: Some(failure),
        }
    }
}

/// Drives chunked prompt submission against a single engine handle.
///
/// The driver itself is strictly sequential: one chunk in flight at a time,
/// results accumulated in input order. Whatever parallelism exists lives
/// inside the engine.
pub struct BatchDriver {
    handle: EngineHandle,
    metrics: Arc<MetricsCollector>,
}

impl BatchDriver {
    /// Build a driver around `handle` with a fresh metrics collector.
    pub fn new(handle: EngineHandle) -> Self {
        Self::with_metrics(handle, Arc::new(MetricsCollector::new()))
    }

    /// Build a driver that records into an existing collector.
    pub fn with_metrics(handle: EngineHandle, metrics: Arc<MetricsCollector>) -> Self {
        Self { handle, metrics }
    }

    /// The handle this driver submits to.
    pub fn handle(&self) -> &EngineHandle {
        &self.handle
    }

    /// Metrics collected across this driver's runs.
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Run `prompts` through the engine in chunks of `batch_size`.
    ///
    /// Chunks are submitted sequentially. The first failing chunk halts the
    /// run; earlier results are kept and returned next to the failure. With
    /// an absent engine the run degrades to an empty report after a warning,
    /// without invoking generation at all.
    pub async fn run(
        &self,
        prompts: &[String],
        sampling: &SamplingConfig,
        batch_size: usize,
    ) -> BatchReport {
        let engine = match self.handle.engine() {
            Some(engine) => engine,
            None => {
                warn!(
                    engine = %self.handle.engine_id(),
                    "model not loaded; skipping inference"
                );
                return BatchReport::complete(Vec::new());
            }
        };

        if batch_size == 0 {
            return BatchReport::failed(
                Vec::new(),
                DriverError::ConfigurationError {
                    message: "batch size must be positive".to_string(),
                    parameter: "batch_size".to_string(),
                },
            );
        }
        if prompts.is_empty() {
            debug!("no prompts submitted");
            return BatchReport::complete(Vec::new());
        }

        let mut results = Vec::with_capacity(prompts.len());
        for (chunk_index, chunk) in prompts.chunks(batch_size).enumerate() {
            debug!(chunk = chunk_index, size = chunk.len(), "submitting chunk");
            let start_time = Instant::now();

            let completions = match engine.generate(chunk, sampling).await {
                Ok(completions) => completions,
                Err(failure) => {
                    self.metrics.record_failure();
                    error!(
                        chunk = chunk_index,
                        error = %failure,
                        "generation failed; consider reducing batch_size or max_tokens"
                    );
                    return BatchReport::failed(results, failure);
                }
            };

            // Pairing results with prompts is this loop's invariant, so a
            // reply of the wrong shape cannot be accepted.
            if completions.len() != chunk.len() {
                let failure = DriverError::GenerationError {
                    message: format!(
                        "engine returned {} completions for a chunk of {}",
                        completions.len(),
                        chunk.len()
                    ),
                    resource_exhausted: false,
                    source: None,
                };
                self.metrics.record_failure();
                error!(chunk = chunk_index, error = %failure, "malformed engine reply");
                return BatchReport::failed(results, failure);
            }

            let tokens: usize = completions.iter().map(|c| c.tokens_generated).sum();
            self.metrics
                .record_chunk(chunk.len(), tokens, start_time.elapsed());

            results.extend(
                chunk
                    .iter()
                    .cloned()
                    .zip(completions)
                    .map(|(prompt, completion)| {
                        GenerationResult::from_completion(prompt, completion)
                    }),
            );
        }

        info!(prompts = prompts.len(), "batched run complete");
        BatchReport::complete(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::error::Result;
    use crate::types::Completion;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Echoes prompts back and records the size of every chunk it sees.
    struct EchoEngine {
        chunks: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl EchoEngine {
        fn new() -> (Self, Arc<Mutex<Vec<Vec<String>>>>) {
            let chunks = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    chunks: Arc::clone(&chunks),
                },
                chunks,
            )
        }
    }

    #[async_trait::async_trait]
    impl Engine for EchoEngine {
        fn id(&self) -> &str {
            "echo"
        }

        async fn generate(
            &self,
            prompts: &[String],
            _sampling: &SamplingConfig,
        ) -> Result<Vec<Completion>> {
            self.chunks.lock().push(prompts.to_vec());
            Ok(prompts
                .iter()
                .map(|prompt| Completion {
                    text: format!("echo: {}", prompt),
                    tokens_generated: 2,
                    processing_time: Duration::from_millis(5),
                })
                .collect())
        }
    }

    /// Succeeds until `fail_on` (1-based call count), then errors.
    struct FailingEngine {
        fail_on: usize,
        message: String,
        calls: Arc<Mutex<usize>>,
    }

    impl FailingEngine {
        fn new(fail_on: usize, message: &str) -> (Self, Arc<Mutex<usize>>) {
            let calls = Arc::new(Mutex::new(0));
            (
                Self {
                    fail_on,
                    message: message.to_string(),
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    #[async_trait::async_trait]
    impl Engine for FailingEngine {
        fn id(&self) -> &str {
            "failing"
        }

        async fn generate(
            &self,
            prompts: &[String],
            _sampling: &SamplingConfig,
        ) -> Result<Vec<Completion>> {
            let call = {
                let mut calls = self.calls.lock();
                *calls += 1;
                *calls
            };
            if call >= self.fail_on {
                return Err(DriverError::generation(self.message.clone(), None));
            }
            Ok(prompts
                .iter()
                .map(|_| Completion {
                    text: "ok".to_string(),
                    tokens_generated: 1,
                    processing_time: Duration::from_millis(5),
                })
                .collect())
        }
    }

    /// Always returns one completion too few.
    struct ShortReplyEngine;

    #[async_trait::async_trait]
    impl Engine for ShortReplyEngine {
        fn id(&self) -> &str {
            "short"
        }

        async fn generate(
            &self,
            prompts: &[String],
            _sampling: &SamplingConfig,
        ) -> Result<Vec<Completion>> {
            Ok(prompts
                .iter()
                .skip(1)
                .map(|_| Completion {
                    text: "ok".to_string(),
                    tokens_generated: 1,
                    processing_time: Duration::from_millis(5),
                })
                .collect())
        }
    }

    fn prompts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("prompt-{}", i)).collect()
    }

    #[tokio::test]
    async fn test_run_preserves_order() {
        let (engine, _chunks) = EchoEngine::new();
        let driver = BatchDriver::new(EngineHandle::from_engine(Box::new(engine)));

        let inputs = prompts(5);
        let report = driver.run(&inputs, &SamplingConfig::default(), 2).await;

        assert!(report.is_complete());
        assert_eq!(report.results.len(), 5);
        for (i, result) in report.results.iter().enumerate() {
            assert_eq!(result.prompt, inputs[i]);
            assert_eq!(result.text, format!("echo: {}", inputs[i]));
        }
    }

    #[tokio::test]
    async fn test_chunk_partition() {
        let (engine, chunks) = EchoEngine::new();
        let driver = BatchDriver::new(EngineHandle::from_engine(Box::new(engine)));

        let inputs = prompts(7);
        let report = driver.run(&inputs, &SamplingConfig::default(), 3).await;
        assert!(report.is_complete());

        let seen = chunks.lock();
        let sizes: Vec<usize> = seen.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);

        // Concatenating the chunks reconstructs the input.
        let flattened: Vec<String> = seen.iter().flatten().cloned().collect();
        assert_eq!(flattened, inputs);
    }

    #[tokio::test]
    async fn test_five_prompts_batch_two() {
        let (engine, chunks) = EchoEngine::new();
        let driver = BatchDriver::new(EngineHandle::from_engine(Box::new(engine)));

        let inputs = prompts(5);
        let report = driver.run(&inputs, &SamplingConfig::default(), 2).await;

        assert_eq!(report.results.len(), 5);
        let sizes: Vec<usize> = chunks.lock().iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_oversized_batch_is_single_chunk() {
        let (engine, chunks) = EchoEngine::new();
        let driver = BatchDriver::new(EngineHandle::from_engine(Box::new(engine)));

        let inputs = prompts(3);
        let report = driver.run(&inputs, &SamplingConfig::default(), 10).await;

        assert_eq!(report.results.len(), 3);
        let sizes: Vec<usize> = chunks.lock().iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![3]);
    }

    #[tokio::test]
    async fn test_absent_engine_degrades() {
        let driver = BatchDriver::new(EngineHandle::absent("some/model", "no weights"));
        assert_eq!(driver.handle().absence_reason(), Some("no weights"));

        let inputs = prompts(3);
        let report = driver.run(&inputs, &SamplingConfig::default(), 2).await;

        assert!(report.is_complete());
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_earlier_chunks() {
        let (engine, calls) = FailingEngine::new(2, "backend unavailable");
        let driver = BatchDriver::new(EngineHandle::from_engine(Box::new(engine)));

        let inputs = prompts(5);
        let report = driver.run(&inputs, &SamplingConfig::default(), 2).await;

        assert!(!report.is_complete());
        // Only the first chunk completed, and nothing was submitted after
        // the failing one.
        assert_eq!(report.results.len(), 2);
        assert_eq!(*calls.lock(), 2);
        assert!(matches!(
            report.failure,
            Some(DriverError::GenerationError { .. })
        ));
    }

    #[tokio::test]
    async fn test_resource_exhaustion_classified() {
        let (engine, _calls) = FailingEngine::new(1, "CUDA error: out of memory");
        let driver = BatchDriver::new(EngineHandle::from_engine(Box::new(engine)));

        let report = driver.run(&prompts(2), &SamplingConfig::default(), 2).await;
        assert!(report.failure.as_ref().unwrap().is_resource_exhaustion());
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let (engine, chunks) = EchoEngine::new();
        let driver = BatchDriver::new(EngineHandle::from_engine(Box::new(engine)));

        let report = driver.run(&prompts(3), &SamplingConfig::default(), 0).await;

        assert!(matches!(
            report.failure,
            Some(DriverError::ConfigurationError { ref parameter, .. })
                if parameter == "batch_size"
        ));
        assert!(chunks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_empty_prompts() {
        let (engine, chunks) = EchoEngine::new();
        let driver = BatchDriver::new(EngineHandle::from_engine(Box::new(engine)));

        let report = driver.run(&[], &SamplingConfig::default(), 4).await;

        assert!(report.is_complete());
        assert!(report.results.is_empty());
        assert!(chunks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_reply_halts() {
        let driver = BatchDriver::new(EngineHandle::from_engine(Box::new(ShortReplyEngine)));

        let report = driver.run(&prompts(4), &SamplingConfig::default(), 2).await;

        assert!(!report.is_complete());
        assert!(report.results.is_empty());
        assert!(matches!(
            report.failure,
            Some(DriverError::GenerationError { .. })
        ));
    }

    #[tokio::test]
    async fn test_metrics_recorded() {
        let (engine, _chunks) = EchoEngine::new();
        let driver = BatchDriver::new(EngineHandle::from_engine(Box::new(engine)));

        let report = driver.run(&prompts(5), &SamplingConfig::default(), 2).await;
        assert!(report.is_complete());

        let snapshot = driver.metrics().snapshot();
        assert_eq!(snapshot.chunks_submitted, 3);
        assert_eq!(snapshot.prompts_completed, 5);
        assert_eq!(snapshot.tokens_generated, 10);
        assert_eq!(snapshot.chunks_failed, 0);
    }
}
