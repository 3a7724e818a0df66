use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Collects driver-level counters for the lifetime of a driver.
///
/// Recording goes through `&self` so the driver can update counters while
/// holding only a shared reference.
pub struct MetricsCollector {
    state: RwLock<MetricsState>,
    start_time: Instant,
}

#[derive(Debug, Default)]
struct MetricsState {
    chunks_submitted: usize,
    chunks_failed: usize,
    prompts_completed: usize,
    tokens_generated: usize,
    generation_time: Duration,
}

/// A point-in-time view of collected metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Time since the collector was created.
    pub uptime: Duration,
    /// Chunks that completed successfully.
    pub chunks_submitted: usize,
    /// Chunks that ended in a failure.
    pub chunks_failed: usize,
    /// Prompts with a completed result.
    pub prompts_completed: usize,
    /// Tokens sampled across all completed chunks.
    pub tokens_generated: usize,
    /// Wall-clock time spent inside the engine.
    pub generation_time: Duration,
    /// Aggregate generation throughput.
    pub tokens_per_second: f32,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MetricsState::default()),
            start_time: Instant::now(),
        }
    }

    /// Record one successfully completed chunk.
    pub fn record_chunk(&self, prompts: usize, tokens: usize, duration: Duration) {
        let mut state = self.state.write();
        state.chunks_submitted += 1;
        state.prompts_completed += prompts;
        state.tokens_generated += tokens;
        state.generation_time += duration;
    }

    /// Record a chunk that ended in failure.
    pub fn record_failure(&self) {
        let mut state = self.state.write();
        state.chunks_failed += 1;
    }

    /// Take a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.read();
        let seconds = state.generation_time.as_secs_f32();
        let tokens_per_second = if seconds > 0.0 {
            state.tokens_generated as f32 / seconds
        } else {
            0.0
        };

        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            chunks_submitted: state.chunks_submitted,
            chunks_failed: state.chunks_failed,
            prompts_completed: state.prompts_completed,
            tokens_generated: state.tokens_generated,
            generation_time: state.generation_time,
            tokens_per_second,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
