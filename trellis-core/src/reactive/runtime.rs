//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects wrapped containers,
//! effects, computed values and the job queue. It owns the dependency table,
//! the running-effect stack, the proxy identity cache and the scheduler
//! queues. Nothing is process-global: independent runtimes never see each
//! other's effects.
//!
//! # How It Works
//!
//! 1. A read through a [`Reactive`] wrapper calls [`Runtime::track`], which
//!    registers the running effect under `(target, key)` in both directions.
//!
//! 2. A write calls [`Runtime::trigger`], which collects the effects under
//!    `(target, key)` plus the synthetic keys implied by the change, drops the
//!    effect that is currently running, and for each of the rest either calls
//!    its scheduler or re-runs it synchronously.
//!
//! 3. Before every run an effect is removed from all entries it was in, so
//!    stale dependencies never survive a run.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use super::computed::Computed;
use super::effect::{Effect, EffectCore, EffectOptions, ReactiveEffect};
use super::proxy::{ProxyInner, ProxyKind, Reactive};
use super::subscriber::ObjectId;
use super::tracker::{TrackKey, Tracker, TriggerOp};
use super::value::{ContainerKind, RawObject};
use super::context::ContextStack;
use crate::error::Warning;
use crate::render::InstanceHooks;
use crate::scheduler::{JobQueue, MicrotaskQueue};

/// Handler receiving every reported [`Warning`].
pub type WarningHandler = Rc<dyn Fn(&Warning)>;

/// Runtime configuration.
#[derive(Clone, Default)]
pub struct RuntimeOptions {
    pub(crate) name: Option<&'static str>,
    pub(crate) warning_handler: Option<WarningHandler>,
}

impl RuntimeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name reported in log fields.
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    /// Receive warnings in addition to the `tracing` event.
    pub fn on_warning<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Warning) + 'static,
    {
        self.warning_handler = Some(Rc::new(handler));
        self
    }
}

impl fmt::Debug for RuntimeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeOptions")
            .field("name", &self.name)
            .field("warning_handler", &self.warning_handler.is_some())
            .finish()
    }
}

pub(crate) type ProxyCacheKey = (ObjectId, ProxyKind, bool);

pub(crate) struct RuntimeInner {
    pub(crate) options: RuntimeOptions,
    pub(crate) tracker: Tracker,
    pub(crate) context: ContextStack,
    /// Raw object + flavor to its live wrapper.
    pub(crate) proxies: RefCell<HashMap<ProxyCacheKey, Weak<ProxyInner>>>,
    pub(crate) jobs: JobQueue,
    pub(crate) microtasks: MicrotaskQueue,
    /// Hook registry of the component whose setup is running.
    pub(crate) current_instance: RefCell<Option<Rc<InstanceHooks>>>,
}

/// A reactivity engine instance.
///
/// Cloning a `Runtime` clones the handle.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

/// Non-owning runtime handle held by wrappers and effects.
#[derive(Clone, Default)]
pub struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }
}

impl fmt::Debug for WeakRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.strong_count() > 0 {
            "WeakRuntime(live)"
        } else {
            "WeakRuntime(dropped)"
        })
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_options(RuntimeOptions::default())
    }

    pub fn with_options(options: RuntimeOptions) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                options,
                tracker: Tracker::default(),
                context: ContextStack::default(),
                proxies: RefCell::new(HashMap::new()),
                jobs: JobQueue::default(),
                microtasks: MicrotaskQueue::default(),
                current_instance: RefCell::new(None),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Rc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn label(&self) -> &'static str {
        self.inner.options.name.unwrap_or("trellis")
    }

    // ------------------------------------------------------------------
    // Wrappers
    // ------------------------------------------------------------------

    /// Deep reactive wrapper over `raw`. Wrapping the same object twice
    /// returns the same wrapper.
    pub fn reactive(&self, raw: &RawObject) -> Reactive {
        Reactive::wrap(self, raw, ProxyKind::Reactive, true)
    }

    /// Reactive wrapper that hands out nested values unwrapped.
    pub fn shallow_reactive(&self, raw: &RawObject) -> Reactive {
        Reactive::wrap(self, raw, ProxyKind::ShallowReactive, true)
    }

    /// Deep readonly wrapper. Reads are not tracked.
    pub fn readonly(&self, raw: &RawObject) -> Reactive {
        Reactive::wrap(self, raw, ProxyKind::Readonly, false)
    }

    pub fn shallow_readonly(&self, raw: &RawObject) -> Reactive {
        Reactive::wrap(self, raw, ProxyKind::ShallowReadonly, false)
    }

    // ------------------------------------------------------------------
    // Effects
    // ------------------------------------------------------------------

    /// Register an effect and run it immediately.
    pub fn effect<T, F>(&self, body: F) -> Effect<T>
    where
        T: 'static,
        F: Fn() -> T + 'static,
    {
        self.effect_with(body, EffectOptions::default())
    }

    pub fn effect_with<T, F>(&self, body: F, options: EffectOptions) -> Effect<T>
    where
        T: 'static,
        F: Fn() -> T + 'static,
    {
        let effect = Effect::create(self.downgrade(), body, &options);
        if !options.lazy {
            effect.run();
        }
        effect
    }

    /// A cached value recomputed only after an upstream dependency changed.
    pub fn computed<T, F>(&self, getter: F) -> Computed<T>
    where
        T: Clone + 'static,
        F: Fn() -> T + 'static,
    {
        Computed::new(self, getter)
    }

    /// Run `f` without registering dependencies.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _paused = self.inner.context.pause();
        f()
    }

    /// Number of effects registered under `(target, key)`.
    pub fn subscriber_count(&self, target: ObjectId, key: &TrackKey) -> usize {
        self.inner.tracker.subscriber_count(target, key)
    }

    /// Whether an effect is running right now.
    pub fn is_tracking(&self) -> bool {
        self.inner.context.should_track()
    }

    // ------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------

    /// Register the running effect under `(target, key)`. No-op when no
    /// effect is running or tracking is paused.
    pub fn track(&self, target: ObjectId, key: TrackKey) {
        if !self.inner.context.should_track() {
            return;
        }
        let Some(effect) = self.inner.context.current() else {
            return;
        };
        if self.inner.tracker.add(target, &key, &effect) {
            effect.deps.borrow_mut().push((target, key));
        }
    }

    /// Notify the effects depending on `(target, key)` of a change.
    pub fn trigger(&self, target: ObjectId, kind: ContainerKind, op: TriggerOp, key: TrackKey) {
        if op == TriggerOp::Clear {
            self.trigger_clear(target);
            return;
        }
        let mut keys = vec![key];
        keys.extend_from_slice(op.extra_keys(kind));
        self.trigger_keys(target, &keys);
    }

    /// Notify every effect depending on any key of `target`.
    pub(crate) fn trigger_clear(&self, target: ObjectId) {
        let keys = self.inner.tracker.keys_of(target);
        self.trigger_keys(target, &keys);
    }

    /// Notify the slots of a sequence in `range`, plus its length if it
    /// changed. Structural sequence edits report through here once.
    pub(crate) fn trigger_sequence(&self, target: ObjectId, range: Range<usize>, length_changed: bool) {
        let mut keys = self.inner.tracker.indices_in(target, &range);
        if length_changed {
            keys.push(TrackKey::Length);
        }
        self.trigger_keys(target, &keys);
    }

    pub(crate) fn trigger_keys(&self, target: ObjectId, keys: &[TrackKey]) {
        if keys.is_empty() {
            return;
        }
        let effects = self.inner.tracker.collect(target, keys);
        if effects.is_empty() {
            return;
        }
        trace!(
            runtime = self.label(),
            target = target.raw(),
            subscribers = effects.len(),
            "trigger"
        );

        let running = self.inner.context.current_id();
        for effect in effects {
            // The running effect never re-triggers itself. Effects it is
            // nested in are notified.
            if !effect.is_active() || running == Some(effect.id) {
                continue;
            }
            match &effect.scheduler {
                Some(scheduler) => {
                    let scheduler = Rc::clone(scheduler);
                    scheduler(&ReactiveEffect::from_core(effect));
                }
                None => effect.rerun(),
            }
        }
    }

    /// Remove `effect` from every entry it is registered in.
    pub(crate) fn cleanup(&self, effect: &EffectCore) {
        let deps = std::mem::take(&mut *effect.deps.borrow_mut());
        for (target, key) in deps {
            self.inner.tracker.remove(target, &key, effect.id);
        }
    }

    // ------------------------------------------------------------------
    // Warnings
    // ------------------------------------------------------------------

    /// Report a non-fatal invariant violation.
    pub fn warn(&self, warning: Warning) {
        warn!(runtime = self.label(), "{}", warning);
        if let Some(handler) = &self.inner.options.warning_handler {
            handler(&warning);
        }
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("name", &self.inner.options.name)
            .field("pending_jobs", &self.pending_jobs())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Value;
    use crate::{record, seq};
    use std::cell::Cell;

    #[test]
    fn track_registers_both_directions() {
        let rt = Runtime::new();
        let raw = record! { "a" => 1 };
        let state = rt.reactive(&raw);
        let s = state.clone();

        let effect = rt.effect(move || {
            s.get("a");
        });

        let key = TrackKey::Field("a".into());
        assert!(rt.inner.tracker.contains(raw.id(), &key, effect.id()));
        assert_eq!(effect.dependency_count(), 1);

        effect.stop();
        assert!(!rt.inner.tracker.contains(raw.id(), &key, effect.id()));
        assert_eq!(rt.subscriber_count(raw.id(), &key), 0);
    }

    #[test]
    fn track_outside_effect_is_noop() {
        let rt = Runtime::new();
        let raw = record! { "a" => 1 };
        rt.reactive(&raw).get("a");
        assert_eq!(rt.subscriber_count(raw.id(), &TrackKey::Field("a".into())), 0);
    }

    #[test]
    fn self_trigger_is_excluded() {
        let rt = Runtime::new();
        let state = rt.reactive(&record! { "n" => 0 });
        let runs = Rc::new(Cell::new(0));
        let (s, r) = (state.clone(), runs.clone());

        let _effect = rt.effect(move || {
            r.set(r.get() + 1);
            let n = s.get("n").as_number().unwrap_or(0.0);
            s.set("n", n + 1.0);
        });

        // Reading and writing the same key does not recurse
        assert_eq!(runs.get(), 1);
        assert_eq!(state.get("n"), Value::from(1));

        state.set("n", 10);
        assert_eq!(runs.get(), 2);
        assert_eq!(state.get("n"), Value::from(11));
    }

    #[test]
    fn nested_write_notifies_enclosing_effect() {
        let rt = Runtime::new();
        let state = rt.reactive(&record! { "ready" => false });
        let notified = Rc::new(Cell::new(0));
        let children = Rc::new(RefCell::new(Vec::new()));

        let (s, n, kids, inner_rt) = (state.clone(), notified.clone(), children.clone(), rt.clone());
        let _outer = rt.effect_with(
            move || {
                s.get("ready");
                if kids.borrow().is_empty() {
                    let s = s.clone();
                    let child = inner_rt.effect(move || {
                        s.set("ready", true);
                    });
                    kids.borrow_mut().push(child);
                }
            },
            EffectOptions::new().scheduler(move |_| n.set(n.get() + 1)),
        );

        assert_eq!(notified.get(), 1);
        assert_eq!(state.get("ready"), Value::from(true));
    }

    #[test]
    fn clear_triggers_every_key() {
        let rt = Runtime::new();
        let map = rt.reactive(&crate::reactive::RawObject::map_from([("k", 1)]));
        let runs = Rc::new(Cell::new(0));
        let (m, r) = (map.clone(), runs.clone());

        let _effect = rt.effect(move || {
            m.get_entry(&Value::from("k"));
            r.set(r.get() + 1);
        });

        map.clear();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn sequence_trigger_reaches_shifted_slots() {
        let rt = Runtime::new();
        let list = rt.reactive(&seq![1, 2, 3]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (l, s) = (list.clone(), seen.clone());

        let _effect = rt.effect(move || {
            s.borrow_mut().push(l.at(2));
        });

        list.shift();
        assert_eq!(*seen.borrow(), vec![Value::from(3), Value::Null]);
    }

    #[test]
    fn warnings_reach_handler() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let rt = Runtime::with_options(
            RuntimeOptions::new()
                .name("test")
                .on_warning(move |w| sink.borrow_mut().push(w.clone())),
        );

        let ro = rt.readonly(&record! { "a" => 1 });
        assert!(!ro.set("a", 2));
        assert_eq!(
            *seen.borrow(),
            vec![Warning::ReadonlyWrite { key: "a".into() }]
        );
    }

    #[test]
    fn runtimes_are_independent() {
        let rt1 = Runtime::new();
        let rt2 = Runtime::new();
        let raw = record! { "a" => 1 };
        let runs = Rc::new(Cell::new(0));
        let (p, r) = (rt1.reactive(&raw), runs.clone());

        let _effect = rt1.effect(move || {
            p.get("a");
            r.set(r.get() + 1);
        });

        // Writing through another runtime's wrapper is invisible to rt1
        rt2.reactive(&raw).set("a", 2);
        assert_eq!(runs.get(), 1);
        assert!(!rt1.ptr_eq(&rt2));
    }
}
