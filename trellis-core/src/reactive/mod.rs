//! Reactive Primitives
//!
//! This module implements the reactivity core: wrapped containers, effects,
//! computed values and watchers, all coordinated by a [`Runtime`].
//!
//! # Concepts
//!
//! ## Wrapped containers
//!
//! Plain data lives in [`RawObject`]s (records, sequences, maps and sets of
//! [`Value`]s). A [`Reactive`] wrapper over a raw object registers the running
//! effect as a dependent on every read and notifies dependents on every write
//! that actually changes something.
//!
//! ## Effects
//!
//! An [`Effect`] is a computation that re-runs whenever something it read
//! changes. Its dependency set is rebuilt on every run, so conditional reads
//! only count while the branch that performs them is taken.
//!
//! ## Computed values
//!
//! A [`Computed`] caches a derived value and recomputes it lazily, only after
//! an upstream dependency changed.
//!
//! ## Refs
//!
//! A [`Ref`] observes a single slot: either its own one-field record or a
//! field of an existing wrapper.
//!
//! # Implementation Notes
//!
//! Everything is single-threaded (`Rc`/`RefCell`). The dependency table, the
//! running-effect stack and the wrapper cache are owned by the runtime
//! instance rather than being process-global, so independent runtimes (for
//! example one per test) never interfere.

mod collections;
mod computed;
mod context;
mod effect;
mod proxy;
mod refs;
mod runtime;
mod subscriber;
mod tracker;
mod value;
mod watch;

pub use computed::{Computed, ComputedState};
pub use effect::{Effect, EffectOptions, ReactiveEffect, Scheduler};
pub use proxy::{ProxyKind, Reactive};
pub use refs::Ref;
pub use runtime::{Runtime, RuntimeOptions, WarningHandler, WeakRuntime};
pub use subscriber::{ObjectId, SubscriberId};
pub use tracker::{TrackKey, TriggerOp};
pub use value::{Callback, Container, ContainerKind, RawObject, Record, Value};
pub use watch::{FlushMode, OnInvalidate, WatchHandle, WatchOptions, WatchSource};
