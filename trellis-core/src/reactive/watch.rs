//! Watchers
//!
//! A watcher observes a source and calls back with `(new, old)` whenever the
//! source produces a different value. The source is either a getter, compared
//! with same-value semantics, or a reactive container, which is traversed
//! deeply and always reported as changed when anything inside it changed.
//!
//! The callback can register an invalidation callback through
//! [`OnInvalidate`]. It runs before the next callback invocation and when the
//! watcher stops.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use super::effect::{Effect, EffectOptions};
use super::proxy::Reactive;
use super::runtime::Runtime;
use super::subscriber::ObjectId;
use super::value::{ContainerKind, Value};
use crate::scheduler::Job;

/// What a watcher observes.
#[derive(Clone)]
pub enum WatchSource {
    Getter(Rc<dyn Fn() -> Value>),
    /// Deep watch of every nested field.
    Reactive(Reactive),
}

impl WatchSource {
    pub fn getter<F>(getter: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        WatchSource::Getter(Rc::new(getter))
    }
}

impl From<Reactive> for WatchSource {
    fn from(source: Reactive) -> Self {
        WatchSource::Reactive(source)
    }
}

impl From<&Reactive> for WatchSource {
    fn from(source: &Reactive) -> Self {
        WatchSource::Reactive(source.clone())
    }
}

impl fmt::Debug for WatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchSource::Getter(_) => f.write_str("WatchSource::Getter"),
            WatchSource::Reactive(source) => f.debug_tuple("WatchSource::Reactive").field(source).finish(),
        }
    }
}

/// When the callback runs after a change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlushMode {
    /// Inside the triggering write.
    #[default]
    Sync,
    /// In the next job flush, once per flush.
    Post,
}

/// Options for [`Runtime::watch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    pub immediate: bool,
    pub flush: FlushMode,
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke the callback once at creation with `Null` as the old value.
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn flush(mut self, flush: FlushMode) -> Self {
        self.flush = flush;
        self
    }
}

type Cleanup = Rc<RefCell<Option<Box<dyn FnOnce()>>>>;

/// Registers the cleanup for the current callback invocation.
pub struct OnInvalidate {
    slot: Cleanup,
}

impl OnInvalidate {
    /// Run `cleanup` before the next callback or when the watcher stops.
    pub fn register<F>(&self, cleanup: F)
    where
        F: FnOnce() + 'static,
    {
        *self.slot.borrow_mut() = Some(Box::new(cleanup));
    }
}

type WatchCallback = Box<dyn Fn(&Value, &Value, &OnInvalidate)>;

struct WatchState {
    effect: RefCell<Option<Effect<Value>>>,
    old: RefCell<Value>,
    cleanup: Cleanup,
    callback: WatchCallback,
    deep: bool,
}

impl WatchState {
    fn run_cleanup(&self) {
        let cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }

    /// Re-read the source and call back if it changed, or unconditionally
    /// when `force` is set.
    fn job(&self, force: bool) {
        let Some(effect) = self.effect.borrow().clone() else {
            return;
        };
        if !effect.is_active() {
            return;
        }
        let new = effect.run();
        let changed = force || self.deep || !new.same_value(&self.old.borrow());
        if changed {
            self.run_cleanup();
            let old = self.old.replace(new.clone());
            (self.callback)(
                &new,
                &old,
                &OnInvalidate {
                    slot: Rc::clone(&self.cleanup),
                },
            );
        }
    }
}

/// Handle returned by [`Runtime::watch`].
///
/// Dropping the handle does not stop the watcher; call [`WatchHandle::stop`].
pub struct WatchHandle {
    state: Rc<WatchState>,
}

impl WatchHandle {
    /// Stop watching and run the pending invalidation callback.
    pub fn stop(&self) {
        let effect = self.state.effect.borrow_mut().take();
        if let Some(effect) = effect {
            effect.stop();
            self.state.run_cleanup();
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.effect.borrow().is_some()
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Read every nested field of `value` so that all of them are tracked.
fn traverse(value: &Value, seen: &mut HashSet<ObjectId>) {
    let Value::Proxy(proxy) = value else {
        return;
    };
    if !seen.insert(proxy.id()) {
        return;
    }
    match proxy.kind() {
        ContainerKind::Record => {
            for key in proxy.keys() {
                traverse(&proxy.get(&key), seen);
            }
        }
        ContainerKind::Sequence => {
            for item in proxy.to_vec() {
                traverse(&item, seen);
            }
        }
        ContainerKind::Map | ContainerKind::Set => {
            for (key, value) in proxy.entries() {
                traverse(&key, seen);
                traverse(&value, seen);
            }
        }
    }
}

impl Runtime {
    /// Watch `source` and call `callback(new, old, on_invalidate)` when it
    /// changes.
    pub fn watch<F>(
        &self,
        source: impl Into<WatchSource>,
        callback: F,
        options: WatchOptions,
    ) -> WatchHandle
    where
        F: Fn(&Value, &Value, &OnInvalidate) + 'static,
    {
        let (getter, deep): (Rc<dyn Fn() -> Value>, bool) = match source.into() {
            WatchSource::Getter(getter) => (getter, false),
            WatchSource::Reactive(source) => (
                Rc::new(move || {
                    let value = Value::Proxy(source.clone());
                    traverse(&value, &mut HashSet::new());
                    value
                }),
                true,
            ),
        };

        let state = Rc::new(WatchState {
            effect: RefCell::new(None),
            old: RefCell::new(Value::Null),
            cleanup: Rc::new(RefCell::new(None)),
            callback: Box::new(callback),
            deep,
        });

        let job_state = Rc::clone(&state);
        let job: Job = Rc::new(move || job_state.job(false));
        let scheduler_rt = self.downgrade();
        let effect_options = EffectOptions::new().lazy().name("watch").scheduler(move |_| {
            match options.flush {
                FlushMode::Sync => job(),
                FlushMode::Post => {
                    if let Some(rt) = scheduler_rt.upgrade() {
                        rt.queue_job(Rc::clone(&job));
                    }
                }
            }
        });
        let effect = self.effect_with(move || getter(), effect_options);
        *state.effect.borrow_mut() = Some(effect.clone());

        if options.immediate {
            state.job(true);
        } else {
            *state.old.borrow_mut() = effect.run();
        }

        WatchHandle { state }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use std::cell::Cell;

    #[test]
    fn getter_watch_reports_new_and_old() {
        let rt = Runtime::new();
        let state = rt.reactive(&record! { "n" => 1 });
        let calls = Rc::new(RefCell::new(Vec::new()));
        let (s, c) = (state.clone(), calls.clone());

        let _handle = rt.watch(
            WatchSource::getter(move || s.get("n")),
            move |new, old, _| c.borrow_mut().push((new.clone(), old.clone())),
            WatchOptions::new(),
        );

        // Not immediate: nothing yet
        assert!(calls.borrow().is_empty());

        state.set("n", 2);
        assert_eq!(*calls.borrow(), vec![(Value::from(2), Value::from(1))]);
    }

    #[test]
    fn getter_watch_ignores_same_value_results() {
        let rt = Runtime::new();
        let state = rt.reactive(&record! { "n" => 1 });
        let calls = Rc::new(Cell::new(0));
        let (s, c) = (state.clone(), calls.clone());

        let _handle = rt.watch(
            WatchSource::getter(move || Value::from(s.get("n").as_number().unwrap_or(0.0) > 0.0)),
            move |_, _, _| c.set(c.get() + 1),
            WatchOptions::new(),
        );

        // The getter re-runs but its result did not change
        state.set("n", 2);
        assert_eq!(calls.get(), 0);

        state.set("n", -1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn immediate_watch_calls_at_creation() {
        let rt = Runtime::new();
        let state = rt.reactive(&record! { "n" => 1 });
        let calls = Rc::new(RefCell::new(Vec::new()));
        let (s, c) = (state.clone(), calls.clone());

        let _handle = rt.watch(
            WatchSource::getter(move || s.get("n")),
            move |new, old, _| c.borrow_mut().push((new.clone(), old.clone())),
            WatchOptions::new().immediate(),
        );

        assert_eq!(*calls.borrow(), vec![(Value::from(1), Value::Null)]);
    }

    #[test]
    fn immediate_watch_calls_even_for_null_source() {
        let rt = Runtime::new();
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();

        let _handle = rt.watch(
            WatchSource::getter(|| Value::Null),
            move |new, old, _| {
                assert!(new.is_null() && old.is_null());
                c.set(c.get() + 1);
            },
            WatchOptions::new().immediate(),
        );

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn deep_watch_sees_nested_writes() {
        let rt = Runtime::new();
        let nested = record! { "leaf" => 1 };
        let state = rt.reactive(&record! { "nested" => nested });
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();

        let _handle = rt.watch(&state, move |_, _, _| c.set(c.get() + 1), WatchOptions::new());

        if let Value::Proxy(inner) = state.get("nested") {
            inner.set("leaf", 2);
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn deep_watch_survives_cycles() {
        let rt = Runtime::new();
        let a = record! {};
        let b = record! { "a" => a.clone() };
        a.set_field("b", b);
        let state = rt.reactive(&a);
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();

        let _handle = rt.watch(&state, move |_, _, _| c.set(c.get() + 1), WatchOptions::new());
        state.set("x", 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn invalidation_runs_before_next_call_and_on_stop() {
        let rt = Runtime::new();
        let state = rt.reactive(&record! { "n" => 0 });
        let log = Rc::new(RefCell::new(Vec::new()));
        let (s, l) = (state.clone(), log.clone());

        let handle = rt.watch(
            WatchSource::getter(move || s.get("n")),
            move |new, _, on_invalidate| {
                l.borrow_mut().push(format!("call {new}"));
                let l = l.clone();
                let new = new.clone();
                on_invalidate.register(move || l.borrow_mut().push(format!("cleanup {new}")));
            },
            WatchOptions::new(),
        );

        state.set("n", 1);
        state.set("n", 2);
        handle.stop();
        state.set("n", 3);

        assert_eq!(
            *log.borrow(),
            vec!["call 1", "cleanup 1", "call 2", "cleanup 2"]
        );
        assert!(!handle.is_active());
    }

    #[test]
    fn post_flush_watch_batches_until_microtasks_run() {
        let rt = Runtime::new();
        let state = rt.reactive(&record! { "n" => 0 });
        let calls = Rc::new(RefCell::new(Vec::new()));
        let (s, c) = (state.clone(), calls.clone());

        let _handle = rt.watch(
            WatchSource::getter(move || s.get("n")),
            move |new, old, _| c.borrow_mut().push((new.clone(), old.clone())),
            WatchOptions::new().flush(FlushMode::Post),
        );

        state.set("n", 1);
        state.set("n", 2);
        assert!(calls.borrow().is_empty());

        rt.run_microtasks();
        assert_eq!(*calls.borrow(), vec![(Value::from(2), Value::from(0))]);
    }
}
