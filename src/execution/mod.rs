//! Bounded worker pool used by the conversion and upload phases.
//!
//! Work units are grouped into static chunks of `chunk_size` and pushed onto a queue consumed by
//! `min(max_pool_size, unit_count)` long-lived workers. Each unit's result is sent back on a
//! second channel and consumed by the calling thread in completion order, which drives
//! [`ExecutionEvent::UnitFinished`] events (progress) and real-time [`ExecutionMetrics`].
//!
//! Workers share nothing mutable: a unit is moved into the worker, its result is moved out.
//! There is no cancellation and no per-unit timeout; a unit that never returns stalls the run.

mod observer;

use std::sync::Arc;
use std::time::Instant;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::RunConfig;
use crate::error::ConversionResult;

pub use observer::{
    CompositeExecutionObserver, ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver,
    Phase, ProgressObserver, TracingExecutionObserver,
};

/// Shape of the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Upper bound on worker threads.
    pub max_pool_size: usize,
    /// Units handed to a worker per dispatch.
    pub chunk_size: usize,
}

impl ExecutionOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            max_pool_size: config.options().max_pool_size,
            chunk_size: config.options().chunk_size,
        }
    }
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_pool_size: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            chunk_size: 10,
        }
    }
}

/// A worker pool sized for one phase.
pub struct ExecutionEngine {
    pool: ThreadPool,
    phase: Phase,
    workers: usize,
    chunk_size: usize,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
}

impl ExecutionEngine {
    /// Create a pool for `unit_count` units: `min(max_pool_size, unit_count)` workers, at least one.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size == 0` or `max_pool_size == 0`.
    pub fn new(phase: Phase, opts: ExecutionOptions, unit_count: usize) -> ConversionResult<Self> {
        assert!(opts.chunk_size > 0, "chunk_size must be > 0");
        assert!(opts.max_pool_size > 0, "max_pool_size must be > 0");

        let workers = opts.max_pool_size.min(unit_count).max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("{phase}-worker-{i}"))
            .build()?;

        Ok(Self {
            pool,
            phase,
            workers,
            chunk_size: opts.chunk_size,
            observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
        })
    }

    /// Attach an observer for execution events (metrics/logging/progress).
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run `op` inside this pool (e.g. for rayon parallel iterators).
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// Apply `work` to every unit and collect the results in completion order.
    ///
    /// Blocks until every dispatched unit has reported.
    pub fn run<T, R, F>(&self, units: Vec<T>, work: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        let start = Instant::now();
        let total = units.len();
        self.metrics.begin_run(total);
        self.emit(ExecutionEvent::RunStarted {
            phase: self.phase,
            units: total,
            workers: self.workers,
        });

        let (work_tx, work_rx) = crossbeam_channel::unbounded::<Vec<T>>();
        for chunk in into_chunks(units, self.chunk_size) {
            // Cannot fail: `work_rx` is alive until the end of this function.
            let _ = work_tx.send(chunk);
        }
        drop(work_tx);

        let (result_tx, result_rx) = crossbeam_channel::unbounded::<R>();
        let mut results = Vec::with_capacity(total);
        let work = &work;
        self.pool.in_place_scope(|scope| {
            for worker in 0..self.workers {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move |_| {
                    for chunk in work_rx.iter() {
                        let units = chunk.len();
                        self.metrics.on_chunk_start();
                        self.emit(ExecutionEvent::ChunkStarted { worker, units });
                        for unit in chunk {
                            if result_tx.send(work(unit)).is_err() {
                                return;
                            }
                        }
                        self.emit(ExecutionEvent::ChunkFinished { worker, units });
                        self.metrics.on_chunk_end();
                    }
                });
            }
            drop(result_tx);

            for result in result_rx.iter() {
                let completed = self.metrics.on_unit_finished();
                self.emit(ExecutionEvent::UnitFinished { completed, total });
                results.push(result);
            }
        });

        self.metrics.end_run(start.elapsed());
        self.emit(ExecutionEvent::RunFinished {
            phase: self.phase,
            elapsed: start.elapsed(),
            metrics: self.metrics.snapshot(),
        });
        results
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

fn into_chunks<T>(units: Vec<T>, chunk_size: usize) -> Vec<Vec<T>> {
    let mut out = Vec::with_capacity(units.len().div_ceil(chunk_size));
    let mut iter = units.into_iter().peekable();
    while iter.peek().is_some() {
        out.push(iter.by_ref().take(chunk_size).collect());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{into_chunks, ExecutionEngine, ExecutionOptions, Phase};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::execution::{ExecutionEvent, ExecutionObserver, ProgressObserver};

    fn engine(max_pool_size: usize, chunk_size: usize, units: usize) -> ExecutionEngine {
        ExecutionEngine::new(
            Phase::Convert,
            ExecutionOptions {
                max_pool_size,
                chunk_size,
            },
            units,
        )
        .unwrap()
    }

    #[test]
    fn chunks_preserve_order_and_sizes() {
        let chunks = into_chunks((0..7).collect::<Vec<_>>(), 3);
        assert_eq!(chunks, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
        assert!(into_chunks(Vec::<u8>::new(), 3).is_empty());
    }

    #[test]
    fn worker_count_is_capped_by_unit_count() {
        assert_eq!(engine(8, 1, 3).workers(), 3);
        assert_eq!(engine(2, 1, 30).workers(), 2);
        assert_eq!(engine(4, 1, 0).workers(), 1);
    }

    #[test]
    fn every_unit_reports_once() {
        let eng = engine(4, 3, 50);
        let mut out = eng.run((0..50).collect(), |x: u64| x * 2);
        out.sort_unstable();
        assert_eq!(out, (0..50).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn empty_run_returns_nothing() {
        let eng = engine(4, 3, 0);
        let out: Vec<u8> = eng.run(Vec::<u8>::new(), |x| x);
        assert!(out.is_empty());
        assert_eq!(eng.metrics().snapshot().chunks_started, 0);
    }

    #[test]
    fn run_uses_multiple_workers() {
        let eng = engine(4, 1, 40);
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let active2 = Arc::clone(&active);
        let max_active2 = Arc::clone(&max_active);
        let out = eng.run((0..40).collect(), move |x: usize| {
            let now = active2.fetch_add(1, Ordering::SeqCst) + 1;
            max_active2.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            active2.fetch_sub(1, Ordering::SeqCst);
            x
        });

        assert_eq!(out.len(), 40);
        assert!(max_active.load(Ordering::SeqCst) > 1);
        assert!(max_active.load(Ordering::SeqCst) <= 4);
    }

    #[derive(Default)]
    struct RecordingObserver {
        chunk_sizes: Mutex<Vec<usize>>,
        completed: Mutex<Vec<usize>>,
    }

    impl ExecutionObserver for RecordingObserver {
        fn on_event(&self, event: &ExecutionEvent) {
            match event {
                ExecutionEvent::ChunkStarted { units, .. } => self.chunk_sizes.lock().unwrap().push(*units),
                ExecutionEvent::UnitFinished { completed, total } => {
                    assert_eq!(*total, 10);
                    self.completed.lock().unwrap().push(*completed);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn observer_sees_static_chunks_and_progress() {
        let observer = Arc::new(RecordingObserver::default());
        let obs_trait: Arc<dyn ExecutionObserver> = observer.clone();
        let eng = engine(2, 4, 10).with_observer(obs_trait);

        let out = eng.run((0..10).collect(), |x: i32| x);
        assert_eq!(out.len(), 10);

        let mut sizes = observer.chunk_sizes.lock().unwrap().clone();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![2, 4, 4]);
        assert_eq!(*observer.completed.lock().unwrap(), (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn metrics_are_available_after_run() {
        let eng = engine(1, 2, 6);
        let metrics = eng.metrics();
        let _ = eng.run((0..6).collect(), |x: u8| {
            std::thread::sleep(Duration::from_millis(1));
            x
        });

        let snap = metrics.snapshot();
        assert_eq!(snap.units_total, 6);
        assert_eq!(snap.units_completed, 6);
        assert_eq!(snap.chunks_started, 3);
        assert_eq!(snap.chunks_finished, 3);
        assert_eq!(snap.max_active_chunks, 1);
        assert!(snap.elapsed.is_some());
    }

    #[test]
    fn a_new_run_resets_the_metrics() {
        let metrics = crate::execution::ExecutionMetrics::new();
        metrics.begin_run(4);
        metrics.on_chunk_start();
        metrics.on_unit_finished();
        metrics.on_chunk_end();
        metrics.end_run(Duration::from_millis(5));

        metrics.begin_run(2);
        let snap = metrics.snapshot();
        assert_eq!(snap.run_id, 2);
        assert_eq!(snap.units_total, 2);
        assert_eq!(snap.units_completed, 0);
        assert_eq!(snap.chunks_finished, 0);
        assert_eq!(snap.elapsed, None);
    }

    #[test]
    fn progress_observer_counts_units() {
        let progress = Arc::new(ProgressObserver::hidden());
        let obs_trait: Arc<dyn ExecutionObserver> = progress.clone();
        let eng = engine(3, 2, 9).with_observer(obs_trait);
        let _ = eng.run((0..9).collect(), |x: u8| x);
        assert_eq!(progress.position(), 9);
    }
}
