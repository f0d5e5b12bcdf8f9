use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Which pipeline phase a pool run belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Convert,
    Upload,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Convert => f.write_str("convert"),
            Self::Upload => f.write_str("upload"),
        }
    }
}

/// Execution events emitted by the engine.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted { phase: Phase, units: usize, workers: usize },
    ChunkStarted { worker: usize, units: usize },
    ChunkFinished { worker: usize, units: usize },
    /// One unit reported its result to the orchestrator (completion order).
    UnitFinished { completed: usize, total: usize },
    RunFinished {
        phase: Phase,
        elapsed: Duration,
        metrics: ExecutionMetricsSnapshot,
    },
}

/// Observer hook for execution events.
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

/// Logs run boundaries at `info` and chunk traffic at `trace`.
#[derive(Debug, Default)]
pub struct TracingExecutionObserver;

impl ExecutionObserver for TracingExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::RunStarted { phase, units, workers } => {
                tracing::info!(%phase, units, workers, "starting worker pool");
            }
            ExecutionEvent::RunFinished { phase, elapsed, metrics } => {
                tracing::info!(%phase, ?elapsed, %metrics, "worker pool finished");
            }
            other => tracing::trace!(event = ?other),
        }
    }
}

/// Terminal progress bar over completed units.
pub struct ProgressObserver {
    target: fn() -> ProgressDrawTarget,
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressObserver {
    /// Draw to stderr.
    pub fn stderr() -> Self {
        Self {
            target: ProgressDrawTarget::stderr,
            bar: Mutex::new(None),
        }
    }

    /// Track progress without drawing anything.
    pub fn hidden() -> Self {
        Self {
            target: ProgressDrawTarget::hidden,
            bar: Mutex::new(None),
        }
    }

    /// Position of the current (or last) bar.
    pub fn position(&self) -> u64 {
        self.bar
            .lock()
            .ok()
            .and_then(|bar| bar.as_ref().map(ProgressBar::position))
            .unwrap_or(0)
    }
}

impl fmt::Debug for ProgressObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressObserver")
            .field("position", &self.position())
            .finish()
    }
}

impl ExecutionObserver for ProgressObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        let Ok(mut guard) = self.bar.lock() else {
            return;
        };
        match event {
            ExecutionEvent::RunStarted { phase, units, .. } => {
                let bar = ProgressBar::with_draw_target(Some(*units as u64), (self.target)());
                let style = ProgressStyle::with_template("{msg:>8} [{elapsed_precise}] {wide_bar} {pos}/{len}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar());
                bar.set_style(style);
                bar.set_message(phase.to_string());
                *guard = Some(bar);
            }
            ExecutionEvent::UnitFinished { .. } => {
                if let Some(bar) = guard.as_ref() {
                    bar.inc(1);
                }
            }
            ExecutionEvent::RunFinished { .. } => {
                if let Some(bar) = guard.as_ref() {
                    bar.finish();
                }
            }
            _ => {}
        }
    }
}

/// Fans events out to several observers.
#[derive(Default)]
pub struct CompositeExecutionObserver {
    observers: Vec<Arc<dyn ExecutionObserver>>,
}

impl CompositeExecutionObserver {
    pub fn new(observers: Vec<Arc<dyn ExecutionObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeExecutionObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeExecutionObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl ExecutionObserver for CompositeExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        for o in &self.observers {
            o.on_event(event);
        }
    }
}

/// Real-time metrics for a pool run.
///
/// The engine updates these counters during execution; callers can snapshot them at any time.
pub struct ExecutionMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,

    units_total: AtomicUsize,
    units_completed: AtomicUsize,
    chunks_started: AtomicU64,
    chunks_finished: AtomicU64,

    active_chunks: AtomicUsize,
    max_active_chunks: AtomicUsize,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            run_id: AtomicU64::new(0),
            elapsed_ns: AtomicU64::new(0),
            units_total: AtomicUsize::new(0),
            units_completed: AtomicUsize::new(0),
            chunks_started: AtomicU64::new(0),
            chunks_finished: AtomicU64::new(0),
            active_chunks: AtomicUsize::new(0),
            max_active_chunks: AtomicUsize::new(0),
        }
    }

    pub fn begin_run(&self, units: usize) {
        let _ = self.run_id.fetch_add(1, Ordering::SeqCst);
        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.units_total.store(units, Ordering::SeqCst);
        self.units_completed.store(0, Ordering::SeqCst);
        self.chunks_started.store(0, Ordering::SeqCst);
        self.chunks_finished.store(0, Ordering::SeqCst);
        self.active_chunks.store(0, Ordering::SeqCst);
        self.max_active_chunks.store(0, Ordering::SeqCst);
    }

    pub fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns
            .store(elapsed.as_nanos().min(u64::MAX as u128) as u64, Ordering::SeqCst);
    }

    /// Returns the number of units completed so far, including this one.
    pub fn on_unit_finished(&self) -> usize {
        self.units_completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn on_chunk_start(&self) {
        let _ = self.chunks_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_chunks.fetch_add(1, Ordering::SeqCst) + 1;
        update_max_usize(&self.max_active_chunks, now);
    }

    pub fn on_chunk_end(&self) {
        let _ = self.chunks_finished.fetch_add(1, Ordering::SeqCst);
        let _ = self.active_chunks.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = if elapsed_ns > 0 {
            Some(Duration::from_nanos(elapsed_ns))
        } else {
            None
        };

        ExecutionMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed,
            units_total: self.units_total.load(Ordering::SeqCst),
            units_completed: self.units_completed.load(Ordering::SeqCst),
            chunks_started: self.chunks_started.load(Ordering::SeqCst),
            chunks_finished: self.chunks_finished.load(Ordering::SeqCst),
            max_active_chunks: self.max_active_chunks.load(Ordering::SeqCst),
        }
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn update_max_usize(dst: &AtomicUsize, now: usize) {
    dst.fetch_max(now, Ordering::SeqCst);
}

/// Immutable snapshot of [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub units_total: usize,
    pub units_completed: usize,
    pub chunks_started: u64,
    pub chunks_finished: u64,
    pub max_active_chunks: usize,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, units={}/{}, chunks={}/{}, max_active_chunks={}, elapsed={:?}",
            self.run_id,
            self.units_completed,
            self.units_total,
            self.chunks_finished,
            self.chunks_started,
            self.max_active_chunks,
            self.elapsed
        )
    }
}
