//! Batching Job Queue
//!
//! Jobs are deduplicated by identity: queuing an `Rc` that is already waiting
//! in the current flush window does nothing. A job that already ran in the
//! current flush may be queued again and runs again later in the same flush.
//!
//! # Flush Lifecycle
//!
//! 1. The first `queue_job` of a tick sets `flush_pending` and queues one
//!    microtask that runs the flush. Later calls see the flag and only
//!    append.
//!
//! 2. The flush runs jobs in queue order, including jobs appended while it
//!    runs. `flush_index` points at the running job, which cannot re-queue
//!    itself. Anything a job triggers on itself while it runs is dropped,
//!    including writes from the `updated` hooks a component update job runs
//!    on its way out; such writes show up at the next change.
//!
//! 3. When the flush ends, normally or by unwinding, a guard clears the
//!    queue and resets both flags so the next `queue_job` starts a new
//!    flush.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::debug;

use crate::reactive::Runtime;

/// A unit of deferred work.
pub type Job = Rc<dyn Fn()>;

#[derive(Default)]
pub(crate) struct JobQueue {
    jobs: RefCell<Vec<Job>>,
    flush_index: Cell<usize>,
    flush_pending: Cell<bool>,
    flushing: Cell<bool>,
}

impl JobQueue {
    /// Whether `job` is waiting at or after the running position.
    fn is_queued(&self, job: &Job) -> bool {
        let start = if self.flushing.get() {
            self.flush_index.get()
        } else {
            0
        };
        self.jobs
            .borrow()
            .iter()
            .skip(start)
            .any(|queued| Rc::ptr_eq(queued, job))
    }

    fn next(&self) -> Option<Job> {
        self.jobs.borrow().get(self.flush_index.get()).cloned()
    }
}

/// Resets the queue when a flush ends, including by panic.
struct FlushGuard<'a> {
    queue: &'a JobQueue,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.queue.flushing.set(false);
        self.queue.flush_pending.set(false);
        self.queue.flush_index.set(0);
        self.queue.jobs.borrow_mut().clear();
    }
}

impl Runtime {
    /// Queue `job` for the next flush unless it is already waiting.
    pub fn queue_job(&self, job: Job) {
        let queue = &self.inner.jobs;
        if queue.is_queued(&job) {
            return;
        }
        queue.jobs.borrow_mut().push(job);
        self.queue_flush();
    }

    fn queue_flush(&self) {
        let queue = &self.inner.jobs;
        if queue.flush_pending.get() || queue.flushing.get() {
            return;
        }
        queue.flush_pending.set(true);

        let weak = self.downgrade();
        self.queue_microtask(move || {
            if let Some(rt) = weak.upgrade() {
                rt.flush_jobs();
            }
        });
    }

    fn flush_jobs(&self) {
        let queue = &self.inner.jobs;
        queue.flush_pending.set(false);
        queue.flushing.set(true);
        queue.flush_index.set(0);
        let _guard = FlushGuard { queue };

        debug!(runtime = self.label(), jobs = self.pending_jobs(), "flush start");
        let mut ran = 0;
        while let Some(job) = queue.next() {
            job();
            ran += 1;
            queue.flush_index.set(queue.flush_index.get() + 1);
        }
        debug!(runtime = self.label(), jobs = ran, "flush end");
    }

    /// Whether a flush is running right now.
    pub fn is_flushing(&self) -> bool {
        self.inner.jobs.flushing.get()
    }

    /// Jobs queued and not yet run.
    pub fn pending_jobs(&self) -> usize {
        let queue = &self.inner.jobs;
        let ran = if queue.flushing.get() {
            queue.flush_index.get()
        } else {
            0
        };
        queue.jobs.borrow().len().saturating_sub(ran)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
