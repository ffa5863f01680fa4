//! Cancellable scheduled tasks.
//!
//! Debounced draft persistence needs a "run this in a moment, unless I
//! change my mind" primitive.  The [`Scheduler`] trait models exactly
//! that: `schedule` hands back a handle whose `cancel` withdraws the
//! task if it has not fired yet.  [`TokioScheduler`] is the timer
//! backed production implementation; [`ManualScheduler`] queues tasks
//! for explicit firing so tests stay deterministic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A task in flight.  Dropping the handle without cancelling leaves
/// the task scheduled.
pub trait TaskHandle: Send {
    fn cancel(&self);
}

/// Schedules a closure to run once after a delay.
pub trait Scheduler: Send {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> Box<dyn TaskHandle>;
}

/// Timer-backed scheduler.  Must be used from within a tokio runtime;
/// the task runs on a runtime worker after the delay elapses.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

struct TokioTaskHandle {
    inner: tokio::task::JoinHandle<()>,
}

impl TaskHandle for TokioTaskHandle {
    fn cancel(&self) {
        self.inner.abort();
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> Box<dyn TaskHandle> {
        let inner = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        Box::new(TokioTaskHandle { inner })
    }
}

/// Deterministic scheduler: tasks queue until [`run_pending`] is
/// called.  Clones share one queue, so a test can keep a handle while
/// the engine owns another.
///
/// [`run_pending`]: ManualScheduler::run_pending
#[derive(Default, Clone)]
pub struct ManualScheduler {
    queue: Arc<Mutex<Vec<Pending>>>,
}

struct Pending {
    task: Box<dyn FnOnce() + Send>,
    cancelled: Arc<AtomicBool>,
}

struct ManualTaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle for ManualTaskHandle {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, _delay: Duration, task: Box<dyn FnOnce() + Send>) -> Box<dyn TaskHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        if let Ok(mut queue) = self.queue.lock() {
            queue.push(Pending { task, cancelled: Arc::clone(&cancelled) });
        }
        Box::new(ManualTaskHandle { cancelled })
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every queued task that has not been cancelled, in schedule
    /// order, and returns how many ran.
    pub fn run_pending(&self) -> usize {
        let drained: Vec<Pending> = match self.queue.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => return 0,
        };
        let mut ran = 0;
        for pending in drained {
            if !pending.cancelled.load(Ordering::SeqCst) {
                (pending.task)();
                ran += 1;
            }
        }
        ran
    }

    /// Queued tasks, cancelled ones included.
    pub fn queued(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }
}
