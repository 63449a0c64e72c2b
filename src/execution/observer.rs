use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Execution events emitted by the engine.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    StageStarted { stage: &'static str, rows: usize },
    LocationsProcessed { locations: usize },
    StageFinished {
        stage: &'static str,
        rows: usize,
        elapsed: Duration,
    },
}

/// Observer hook for execution events.
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

/// Forwards execution events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingExecutionObserver;

impl ExecutionObserver for TracingExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::StageStarted { stage, rows } => {
                tracing::debug!(stage, rows, "stage started");
            }
            ExecutionEvent::LocationsProcessed { locations } => {
                tracing::trace!(locations, "per-location fan-out finished");
            }
            ExecutionEvent::StageFinished {
                stage,
                rows,
                elapsed,
            } => {
                tracing::info!(
                    stage,
                    rows,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "stage finished"
                );
            }
        }
    }
}

/// Real-time metrics for a pipeline run.
///
/// The engine updates these counters during execution; callers can snapshot them at any time.
pub struct ExecutionMetrics {
    stages_finished: AtomicU64,
    locations_processed: AtomicU64,
    rows_processed: AtomicU64,
    elapsed_ns: AtomicU64,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            stages_finished: AtomicU64::new(0),
            locations_processed: AtomicU64::new(0),
            rows_processed: AtomicU64::new(0),
            elapsed_ns: AtomicU64::new(0),
        }
    }

    pub fn on_location_processed(&self, rows: usize) {
        let _ = self.locations_processed.fetch_add(1, Ordering::SeqCst);
        let _ = self.rows_processed.fetch_add(rows as u64, Ordering::SeqCst);
    }

    pub fn on_stage_finished(&self, elapsed: Duration) {
        let _ = self.stages_finished.fetch_add(1, Ordering::SeqCst);
        let add = elapsed.as_nanos().min(u64::MAX as u128) as u64;
        let _ = self.elapsed_ns.fetch_add(add, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        ExecutionMetricsSnapshot {
            stages_finished: self.stages_finished.load(Ordering::SeqCst),
            locations_processed: self.locations_processed.load(Ordering::SeqCst),
            rows_processed: self.rows_processed.load(Ordering::SeqCst),
            elapsed: Duration::from_nanos(self.elapsed_ns.load(Ordering::SeqCst)),
        }
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable snapshot of [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub stages_finished: u64,
    pub locations_processed: u64,
    pub rows_processed: u64,
    pub elapsed: Duration,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stages={}, locations_processed={}, rows_processed={}, elapsed={:?}",
            self.stages_finished, self.locations_processed, self.rows_processed, self.elapsed
        )
    }
}
