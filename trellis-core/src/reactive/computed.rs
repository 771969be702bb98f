//! Computed Values
//!
//! A computed value is a cached derived value that re-evaluates only after
//! one of its dependencies changed.
//!
//! # How Computed Values Work
//!
//! 1. The getter is wrapped in a lazy effect. Nothing runs on creation.
//!
//! 2. The effect's scheduler does not re-run anything. It flips the `dirty`
//!    flag and triggers the computed value's own synthetic key, so effects
//!    that read the computed value learn that it may have changed.
//!
//! 3. Reading [`Computed::value`] recomputes only when dirty, and always
//!    tracks the synthetic key.
//!
//! Between two reads the getter runs at most once, and only if an upstream
//! dependency actually triggered.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::effect::{Effect, EffectOptions};
use super::runtime::{Runtime, WeakRuntime};
use super::subscriber::ObjectId;
use super::tracker::TrackKey;

/// Cache state of a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,

    /// An upstream dependency changed (or the value was never computed).
    Dirty,
}

struct ComputedInner<T: 'static> {
    /// Synthetic target readers depend on.
    target: ObjectId,
    effect: Effect<T>,
    value: RefCell<Option<T>>,
    dirty: Rc<Cell<bool>>,
    runtime: WeakRuntime,
}

impl<T: 'static> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.effect.stop();
    }
}

/// A cached derived value.
///
/// Cloning a `Computed` clones the handle. The getter's effect is stopped
/// when the last handle drops.
pub struct Computed<T: Clone + 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: Clone + 'static> Computed<T> {
    pub(crate) fn new<F>(rt: &Runtime, getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let target = ObjectId::new();
        let dirty = Rc::new(Cell::new(true));

        let flag = Rc::clone(&dirty);
        let weak = rt.downgrade();
        let effect = rt.effect_with(
            getter,
            EffectOptions::new().lazy().name("computed").scheduler(move |_| {
                if !flag.replace(true) {
                    if let Some(rt) = weak.upgrade() {
                        rt.trigger_keys(target, &[TrackKey::Value]);
                    }
                }
            }),
        );

        Self {
            inner: Rc::new(ComputedInner {
                target,
                effect,
                value: RefCell::new(None),
                dirty,
                runtime: rt.downgrade(),
            }),
        }
    }

    /// Current value, recomputed first if an upstream dependency changed.
    pub fn value(&self) -> T {
        let inner = &self.inner;
        let cached = if inner.dirty.get() {
            None
        } else {
            inner.value.borrow().clone()
        };

        let value = match cached {
            Some(value) => value,
            None => {
                let value = inner.effect.run();
                *inner.value.borrow_mut() = Some(value.clone());
                inner.dirty.set(false);
                value
            }
        };

        if let Some(rt) = inner.runtime.upgrade() {
            rt.track(inner.target, TrackKey::Value);
        }
        value
    }

    pub fn state(&self) -> ComputedState {
        if self.inner.dirty.get() {
            ComputedState::Dirty
        } else {
            ComputedState::Clean
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// The synthetic target readers register under.
    pub fn target(&self) -> ObjectId {
        self.inner.target
    }

    /// The getter's effect.
    pub fn effect(&self) -> &Effect<T> {
        &self.inner.effect
    }
}

impl<T: Clone + 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("target", &self.inner.target)
            .field("state", &self.state())
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
