//! Bounded worker pool, cancellation and progress reporting

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{MlError, MlResult};

// ═══════════════════════════════════════════════════════════════════════════════
// WORKER POOL
// ═══════════════════════════════════════════════════════════════════════════════

/// Dedicated rayon pool sized to the number of model invocations allowed in flight
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    max_in_flight: usize,
}

impl WorkerPool {
    pub fn new(max_in_flight: usize) -> MlResult<Self> {
        if max_in_flight == 0 {
            return Err(MlError::InvalidConfiguration(
                "max_in_flight must be at least 1".into(),
            ));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_in_flight)
            .thread_name(|i| format!("sf-separate-{}", i))
            .build()
            .map_err(|e| MlError::Internal(format!("failed to build worker pool: {}", e)))?;

        Ok(Self {
            pool,
            max_in_flight,
        })
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Run `op` inside the pool; parallel iterators in `op` use its threads
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("max_in_flight", &self.max_in_flight)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CANCELLATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Shared cancel flag, checked between units of work
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once `cancel` has been called
    pub fn check(&self) -> MlResult<()> {
        if self.is_cancelled() {
            Err(MlError::Cancelled)
        } else {
            Ok(())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROGRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Progress callback, receives completed fraction in [0, 1]
pub type ProgressCallback = Arc<dyn Fn(f32) + Send + Sync>;

/// Counts completed units of work
#[derive(Clone, Default)]
pub struct ProgressTracker {
    completed: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
    callback: Option<ProgressCallback>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback<F>(callback: F) -> Self
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        Self {
            callback: Some(Arc::new(callback)),
            ..Self::default()
        }
    }

    /// Reset counters for a run of `total` units
    pub fn start(&self, total: usize) {
        self.completed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    /// Record one finished unit
    pub fn advance(&self) {
        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(callback) = &self.callback {
            callback(Self::ratio(done, self.total.load(Ordering::SeqCst)));
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn fraction(&self) -> f32 {
        Self::ratio(self.completed(), self.total.load(Ordering::SeqCst))
    }

    fn ratio(done: usize, total: usize) -> f32 {
        if total == 0 {
            0.0
        } else {
            (done as f32 / total as f32).min(1.0)
        }
    }
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("completed", &self.completed())
            .field("total", &self.total.load(Ordering::SeqCst))
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Cancellation and progress for one separation call
#[derive(Debug, Clone, Default)]
pub struct SeparationControl {
    pub cancel: CancellationToken,
    pub progress: ProgressTracker,
}

impl SeparationControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }
}
