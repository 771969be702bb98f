//! Effect Implementation
//!
//! An effect is a computation whose reads are tracked as dependencies and
//! which re-runs when one of them changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its body immediately to establish
//!    initial dependencies (unless created lazy).
//!
//! 2. Before every run the effect removes itself from every dependency entry
//!    it was registered in, then re-registers during the run. The dependency
//!    set is always exactly what the most recent run read.
//!
//! 3. When a dependency changes, the runtime calls the effect's scheduler if
//!    it has one, otherwise re-runs it synchronously.
//!
//! # Disposal
//!
//! [`Effect::stop`] unregisters the effect everywhere. Later triggers are
//! no-ops; running a stopped effect manually calls the body untracked.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::trace;

use super::runtime::WeakRuntime;
use super::subscriber::{ObjectId, SubscriberId};
use super::tracker::TrackKey;

/// Custom scheduler invoked instead of a synchronous re-run.
pub type Scheduler = Rc<dyn Fn(&ReactiveEffect)>;

/// Options for [`Runtime::effect_with`](super::Runtime::effect_with).
#[derive(Clone, Default)]
pub struct EffectOptions {
    pub(crate) lazy: bool,
    pub(crate) scheduler: Option<Scheduler>,
    pub(crate) name: Option<&'static str>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not run the body on creation.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Intercept every trigger-driven re-run.
    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(&ReactiveEffect) + 'static,
    {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Name reported in log fields.
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .field("name", &self.name)
            .finish()
    }
}

/// Shared state of an effect, referenced by the dependency table.
pub(crate) struct EffectCore {
    pub(crate) id: SubscriberId,
    pub(crate) name: Option<&'static str>,
    pub(crate) runtime: WeakRuntime,
    /// Entries this effect is currently registered in.
    pub(crate) deps: RefCell<SmallVec<[(ObjectId, TrackKey); 4]>>,
    active: Cell<bool>,
    runs: Cell<usize>,
    pub(crate) scheduler: Option<Scheduler>,
    /// Type-erased re-run used by triggers.
    runner: Box<dyn Fn(&Rc<EffectCore>)>,
}

impl EffectCore {
    pub(crate) fn label(&self) -> &'static str {
        self.name.unwrap_or("anonymous")
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Re-run through the type-erased runner.
    pub(crate) fn rerun(self: &Rc<Self>) {
        (self.runner)(self);
    }

    pub(crate) fn stop(&self) {
        if !self.active.replace(false) {
            return;
        }
        if let Some(rt) = self.runtime.upgrade() {
            rt.cleanup(self);
        }
        trace!(effect = self.label(), id = self.id.raw(), "effect stopped");
    }
}

/// Run `body` with `core` as the current effect.
pub(crate) fn run_tracked<T>(core: &Rc<EffectCore>, body: &dyn Fn() -> T) -> T {
    let rt = match core.runtime.upgrade() {
        Some(rt) if core.is_active() => rt,
        _ => return body(),
    };

    rt.cleanup(core);
    let _ctx = rt.inner.context.enter(Rc::clone(core));
    core.runs.set(core.runs.get() + 1);
    trace!(effect = core.label(), id = core.id.raw(), run = core.runs.get(), "running effect");

    body()
}

/// A computation that re-runs when its dependencies change.
///
/// Cloning an `Effect` clones the handle; both handles drive the same
/// computation.
pub struct Effect<T: 'static> {
    core: Rc<EffectCore>,
    body: Rc<dyn Fn() -> T>,
}

impl<T: 'static> Effect<T> {
    pub(crate) fn create<F>(runtime: WeakRuntime, body: F, options: &EffectOptions) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let body: Rc<dyn Fn() -> T> = Rc::new(body);
        let erased = Rc::clone(&body);
        let core = Rc::new(EffectCore {
            id: SubscriberId::new(),
            name: options.name,
            runtime,
            deps: RefCell::new(SmallVec::new()),
            active: Cell::new(true),
            runs: Cell::new(0),
            scheduler: options.scheduler.clone(),
            runner: Box::new(move |core| {
                run_tracked(core, &*erased);
            }),
        });
        Self { core, body }
    }

    /// Run the body now, tracking its reads, and return its result.
    pub fn run(&self) -> T {
        run_tracked(&self.core, &*self.body)
    }

    /// Unregister from every dependency and ignore later triggers.
    pub fn stop(&self) {
        self.core.stop();
    }

    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.core.id
    }

    /// Number of dependency entries recorded by the most recent run.
    pub fn dependency_count(&self) -> usize {
        self.core.deps.borrow().len()
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> usize {
        self.core.runs.get()
    }

    /// Type-erased handle to the same computation.
    pub fn as_reactive_effect(&self) -> ReactiveEffect {
        ReactiveEffect {
            core: Rc::clone(&self.core),
        }
    }

    pub(crate) fn core(&self) -> &Rc<EffectCore> {
        &self.core
    }
}

impl<T: 'static> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
            body: Rc::clone(&self.body),
        }
    }
}

impl<T: 'static> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.core.id)
            .field("name", &self.core.name)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Type-erased effect handle passed to schedulers.
#[derive(Clone)]
pub struct ReactiveEffect {
    core: Rc<EffectCore>,
}

impl ReactiveEffect {
    pub(crate) fn from_core(core: Rc<EffectCore>) -> Self {
        Self { core }
    }

    /// Re-run the computation, discarding its result.
    pub fn run(&self) {
        self.core.rerun();
    }

    pub fn stop(&self) {
        self.core.stop();
    }

    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    pub fn id(&self) -> SubscriberId {
        self.core.id
    }

    pub fn name(&self) -> Option<&'static str> {
        self.core.name
    }
}

impl fmt::Debug for ReactiveEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.core.id)
            .field("name", &self.core.name)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Runtime;
    use crate::record;

    #[test]
    fn effect_runs_on_creation() {
        let rt = Runtime::new();
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();

        let _effect = rt.effect(move || runs_clone.set(runs_clone.get() + 1));

        // Effect should have run once on creation
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let rt = Runtime::new();
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();

        let effect = rt.effect_with(
            move || runs_clone.set(runs_clone.get() + 1),
            EffectOptions::new().lazy(),
        );

        // Effect should not have run
        assert_eq!(runs.get(), 0);
        assert_eq!(effect.run_count(), 0);

        // Manually execute
        effect.run();
        assert_eq!(runs.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn manual_run_returns_body_result() {
        let rt = Runtime::new();
        let state = rt.reactive(&record! { "n" => 2 });
        let s = state.clone();

        let effect = rt.effect(move || s.get("n").as_number().unwrap_or(0.0) * 10.0);
        assert_eq!(effect.run(), 20.0);

        state.set("n", 3);
        assert_eq!(effect.run(), 30.0);
    }

    #[test]
    fn effect_does_not_rerun_after_stop() {
        let rt = Runtime::new();
        let state = rt.reactive(&record! { "n" => 0 });
        let runs = Rc::new(Cell::new(0));
        let (s, r) = (state.clone(), runs.clone());

        let effect = rt.effect(move || {
            s.get("n");
            r.set(r.get() + 1);
        });
        assert_eq!(effect.dependency_count(), 1);

        effect.stop();
        assert!(!effect.is_active());
        assert_eq!(effect.dependency_count(), 0);

        state.set("n", 1);
        assert_eq!(runs.get(), 1);

        // Manual runs still call the body, without tracking
        effect.run();
        assert_eq!(runs.get(), 2);
        assert_eq!(effect.dependency_count(), 0);
    }

    #[test]
    fn scheduler_intercepts_reruns() {
        let rt = Runtime::new();
        let state = rt.reactive(&record! { "n" => 0 });
        let scheduled = Rc::new(Cell::new(0));
        let runs = Rc::new(Cell::new(0));
        let (s, r, sc) = (state.clone(), runs.clone(), scheduled.clone());

        let effect = rt.effect_with(
            move || {
                s.get("n");
                r.set(r.get() + 1);
            },
            EffectOptions::new().scheduler(move |_| sc.set(sc.get() + 1)),
        );

        state.set("n", 1);
        state.set("n", 2);
        assert_eq!(scheduled.get(), 2);
        assert_eq!(runs.get(), 1);

        effect.as_reactive_effect().run();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn effect_clone_shares_state() {
        let rt = Runtime::new();
        let effect1 = rt.effect(|| {});
        let effect2 = effect1.clone();

        // Same ID
        assert_eq!(effect1.id(), effect2.id());
        assert_eq!(effect2.run_count(), 1);

        effect1.run();
        assert_eq!(effect2.run_count(), 2);

        // Shared disposal state
        effect1.stop();
        assert!(!effect2.is_active());
    }
}
