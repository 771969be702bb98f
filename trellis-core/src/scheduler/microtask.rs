//! FIFO microtask queue.

use std::cell::RefCell;
use std::collections::VecDeque;

use tracing::debug;

use crate::reactive::Runtime;

type Microtask = Box<dyn FnOnce()>;

#[derive(Default)]
pub(crate) struct MicrotaskQueue {
    tasks: RefCell<VecDeque<Microtask>>,
}

impl MicrotaskQueue {
    fn push(&self, task: Microtask) {
        self.tasks.borrow_mut().push_back(task);
    }

    fn pop(&self) -> Option<Microtask> {
        self.tasks.borrow_mut().pop_front()
    }

    fn len(&self) -> usize {
        self.tasks.borrow().len()
    }
}

impl Runtime {
    /// Enqueue asynchronous work behind everything already queued.
    pub fn queue_microtask<F>(&self, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.inner.microtasks.push(Box::new(task));
    }

    /// Drain the microtask queue, including work queued while draining.
    /// Returns the number of tasks run.
    ///
    /// A panicking task propagates; the tasks behind it stay queued.
    pub fn run_microtasks(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.inner.microtasks.pop() {
            task();
            ran += 1;
        }
        if ran > 0 {
            debug!(runtime = self.label(), tasks = ran, "microtasks drained");
        }
        ran
    }

    /// Whether any microtask or job is waiting.
    pub fn has_pending_work(&self) -> bool {
        self.inner.microtasks.len() > 0 || self.pending_jobs() > 0
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn microtasks_run_in_fifo_order() {
        let rt = Runtime::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            rt.queue_microtask(move || log.borrow_mut().push(i));
        }
        assert!(rt.has_pending_work());

        // Nothing runs until drained
        assert!(log.borrow().is_empty());
        assert_eq!(rt.run_microtasks(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(!rt.has_pending_work());
    }

    #[test]
    fn tasks_queued_while_draining_run_in_same_drain() {
        let rt = Runtime::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (inner_rt, l) = (rt.clone(), log.clone());

        rt.queue_microtask(move || {
            l.borrow_mut().push("outer");
            let l = l.clone();
            inner_rt.queue_microtask(move || l.borrow_mut().push("inner"));
        });

        assert_eq!(rt.run_microtasks(), 2);
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    }
}
