//! Execution engine for the pipeline stages.
//!
//! This module sits "above" [`crate::processing`] and provides:
//!
//! - Per-location fan-out on a rayon pool ([`ExecutionEngine::per_location`])
//! - Stage bookkeeping: timing, real-time metrics and observer hooks
//!
//! Results of a fan-out are always collected in location order, so a run on eight threads
//! produces exactly the table a single-threaded run does.

mod observer;

use std::sync::Arc;
use std::time::Instant;

use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::error::PipelineResult;
use crate::processing::series::{LocationIndex, LocationSeries};
use crate::types::DataSet;

pub use observer::{
    ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver,
    TracingExecutionObserver,
};

/// Configuration for the [`ExecutionEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Number of worker threads used for per-location work.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        let n = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self {
            num_threads: Some(n),
        }
    }
}

impl ExecutionOptions {
    /// Run everything on one worker thread.
    pub fn sequential() -> Self {
        Self {
            num_threads: Some(1),
        }
    }
}

/// Runs pipeline stages and fans per-location closures out over a thread pool.
pub struct ExecutionEngine {
    pool: ThreadPool,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
}

impl ExecutionEngine {
    /// Create a new engine with the given options.
    pub fn new(opts: &ExecutionOptions) -> PipelineResult<Self> {
        let n_threads = opts
            .num_threads
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
            .max(1);

        let pool = ThreadPoolBuilder::new().num_threads(n_threads).build()?;

        Ok(Self {
            pool,
            observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
        })
    }

    /// Attach an observer for execution events (metrics/logging).
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run one named stage over the table, reporting start/finish and timing.
    pub fn run_stage<F>(&self, stage: &'static str, table: &mut DataSet, f: F) -> PipelineResult<()>
    where
        F: FnOnce(&Self, &mut DataSet) -> PipelineResult<()>,
    {
        let start = Instant::now();
        self.emit(ExecutionEvent::StageStarted {
            stage,
            rows: table.row_count(),
        });

        f(self, table)?;

        let elapsed = start.elapsed();
        self.metrics.on_stage_finished(elapsed);
        self.emit(ExecutionEvent::StageFinished {
            stage,
            rows: table.row_count(),
            elapsed,
        });
        Ok(())
    }

    /// Apply `f` to every location series; results come back in index order.
    pub fn per_location<R, F>(&self, index: &LocationIndex, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(&LocationSeries) -> R + Send + Sync,
    {
        let out: Vec<R> = self.pool.install(|| {
            index
                .series()
                .par_iter()
                .map(|series| {
                    let r = f(series);
                    self.metrics.on_location_processed(series.len());
                    r
                })
                .collect()
        });
        self.emit(ExecutionEvent::LocationsProcessed {
            locations: index.location_count(),
        });
        out
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ExecutionEngine, ExecutionOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::execution::{ExecutionEvent, ExecutionObserver};
    use crate::processing::series::LocationIndex;
    use crate::types::{DataSet, DataType, Field, Schema, Value};

    fn dataset_of_locations(n: usize) -> DataSet {
        let schema = Schema::new(vec![
            Field::new("date", DataType::Date),
            Field::new("location", DataType::Utf8),
        ]);
        let date = chrono::NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        let rows = (0..n)
            .map(|i| vec![Value::Date(date), Value::Utf8(format!("L{i:03}"))])
            .collect();
        DataSet::new(schema, rows)
    }

    #[test]
    fn per_location_preserves_index_order_across_threads() {
        let ds = dataset_of_locations(200);
        let index = LocationIndex::build(&ds).unwrap();
        let engine = ExecutionEngine::new(&ExecutionOptions {
            num_threads: Some(4),
        })
        .unwrap();

        let names = engine.per_location(&index, |s| s.location.clone());
        let expected: Vec<String> = (0..200).map(|i| format!("L{i:03}")).collect();
        assert_eq!(names, expected);

        let snap = engine.metrics().snapshot();
        assert_eq!(snap.locations_processed, 200);
        assert_eq!(snap.rows_processed, 200);
    }

    #[derive(Default)]
    struct RecordingObserver {
        stages: Mutex<Vec<&'static str>>,
        fanouts: AtomicUsize,
    }

    impl ExecutionObserver for RecordingObserver {
        fn on_event(&self, event: &ExecutionEvent) {
            match event {
                ExecutionEvent::StageFinished { stage, .. } => {
                    self.stages.lock().unwrap().push(*stage);
                }
                ExecutionEvent::LocationsProcessed { .. } => {
                    self.fanouts.fetch_add(1, Ordering::SeqCst);
                }
                ExecutionEvent::StageStarted { .. } => {}
            }
        }
    }

    #[test]
    fn run_stage_reports_to_observer() {
        let mut ds = dataset_of_locations(3);
        let observer = Arc::new(RecordingObserver::default());
        let obs_trait: Arc<dyn ExecutionObserver> = observer.clone();
        let engine = ExecutionEngine::new(&ExecutionOptions::sequential())
            .unwrap()
            .with_observer(obs_trait);

        engine
            .run_stage("noop", &mut ds, |engine, table| {
                let index = LocationIndex::build(table)?;
                let _ = engine.per_location(&index, |s| s.len());
                Ok(())
            })
            .unwrap();

        assert_eq!(*observer.stages.lock().unwrap(), vec!["noop"]);
        assert_eq!(observer.fanouts.load(Ordering::SeqCst), 1);
        assert_eq!(engine.metrics().snapshot().stages_finished, 1);
    }

    #[test]
    fn failed_stage_is_not_reported_as_finished() {
        let mut ds = dataset_of_locations(1);
        let engine = ExecutionEngine::new(&ExecutionOptions::sequential()).unwrap();
        let err = engine
            .run_stage("broken", &mut ds, |_, table| table.select(&["missing"]).map(|_| ()))
            .unwrap_err();
        assert!(err.to_string().contains("missing column"));
        assert_eq!(engine.metrics().snapshot().stages_finished, 0);
    }
}
