//! Scheduling
//!
//! Deferred work runs in two layers:
//!
//! - The microtask queue is a single FIFO of host-level asynchronous work.
//!   [`Runtime::run_microtasks`](crate::reactive::Runtime::run_microtasks)
//!   drains it; this is the "after the current synchronous call stack
//!   unwinds" boundary.
//!
//! - The job queue batches re-runs. Queuing a job that is already pending is
//!   a no-op, and the first job queued in a tick schedules exactly one flush
//!   as a microtask. Component re-renders go through here, so several
//!   synchronous writes collapse into one render.

mod microtask;
mod queue;

pub use queue::Job;

pub(crate) use microtask::MicrotaskQueue;
pub(crate) use queue::JobQueue;
