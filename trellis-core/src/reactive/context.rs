//! Reactive Context
//!
//! The reactive context tracks which effect is currently running. This
//! enables automatic dependency tracking: when a wrapped container is read,
//! the runtime registers the current effect as a dependent.
//!
//! # Implementation
//!
//! Each [`Runtime`](super::Runtime) owns one stack. Running an effect pushes
//! it and the returned guard pops it again, so nested runs (an effect
//! triggered while another is mid-run) restore the outer effect as current.
//!
//! A separate tracking flag can be lowered with [`ContextStack::pause`]. The
//! sequence mutators and `untracked` use it to read without registering
//! dependencies. Entering an effect always raises the flag for the duration
//! of the run.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::effect::EffectCore;
use super::subscriber::SubscriberId;

/// The stack of running effects plus the tracking flag.
pub(crate) struct ContextStack {
    stack: RefCell<Vec<Rc<EffectCore>>>,
    tracking: Cell<bool>,
}

impl Default for ContextStack {
    fn default() -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
            tracking: Cell::new(true),
        }
    }
}

impl ContextStack {
    /// Push `effect` as the current effect until the guard drops.
    pub(crate) fn enter(&self, effect: Rc<EffectCore>) -> ActiveEffect<'_> {
        let id = effect.id;
        self.stack.borrow_mut().push(effect);
        let was_tracking = self.tracking.replace(true);
        ActiveEffect {
            stack: self,
            id,
            was_tracking,
        }
    }

    /// The effect currently running, if any.
    pub(crate) fn current(&self) -> Option<Rc<EffectCore>> {
        self.stack.borrow().last().cloned()
    }

    pub(crate) fn current_id(&self) -> Option<SubscriberId> {
        self.stack.borrow().last().map(|effect| effect.id)
    }

    pub(crate) fn is_active(&self) -> bool {
        !self.stack.borrow().is_empty()
    }

    /// Whether a read right now should register a dependency.
    pub(crate) fn should_track(&self) -> bool {
        self.tracking.get() && self.is_active()
    }

    /// Suspend tracking until the guard drops.
    pub(crate) fn pause(&self) -> PausedTracking<'_> {
        PausedTracking {
            flag: &self.tracking,
            previous: self.tracking.replace(false),
        }
    }
}

/// Guard that pops the running effect when dropped.
///
/// Dropping also happens during unwinding, so a panicking effect body never
/// leaves a stale entry behind.
pub(crate) struct ActiveEffect<'a> {
    stack: &'a ContextStack,
    id: SubscriberId,
    was_tracking: bool,
}

impl Drop for ActiveEffect<'_> {
    fn drop(&mut self) {
        let popped = self.stack.stack.borrow_mut().pop();
        self.stack.tracking.set(self.was_tracking);

        if let Some(effect) = popped {
            debug_assert_eq!(
                effect.id, self.id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.id, effect.id
            );
        }
    }
}

/// Guard that restores the previous tracking flag when dropped.
pub(crate) struct PausedTracking<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl Drop for PausedTracking<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{EffectOptions, Runtime};

    fn core(rt: &Runtime) -> Rc<EffectCore> {
        let effect = rt.effect_with(|| {}, EffectOptions::new().lazy());
        effect.core().clone()
    }

    #[test]
    fn context_tracks_current_effect() {
        let rt = Runtime::new();
        let stack = ContextStack::default();
        let effect = core(&rt);

        assert!(!stack.is_active());
        assert!(stack.current_id().is_none());

        {
            let _ctx = stack.enter(effect.clone());
            assert!(stack.is_active());
            assert_eq!(stack.current_id(), Some(effect.id));
            assert!(stack.should_track());
        }

        // Context should be cleaned up after drop
        assert!(!stack.is_active());
        assert!(stack.current_id().is_none());
    }

    #[test]
    fn nested_contexts() {
        let rt = Runtime::new();
        let stack = ContextStack::default();
        let outer = core(&rt);
        let inner = core(&rt);

        {
            let _ctx1 = stack.enter(outer.clone());
            assert_eq!(stack.current_id(), Some(outer.id));

            {
                let _ctx2 = stack.enter(inner.clone());
                assert_eq!(stack.current_id(), Some(inner.id));
            }

            // After inner context drops, outer should be current
            assert_eq!(stack.current_id(), Some(outer.id));
        }

        assert!(stack.current_id().is_none());
    }

    #[test]
    fn pause_suspends_tracking_until_dropped() {
        let rt = Runtime::new();
        let stack = ContextStack::default();
        let _ctx = stack.enter(core(&rt));

        {
            let _paused = stack.pause();
            assert!(!stack.should_track());

            // Entering an effect re-enables tracking for its run
            let nested = stack.enter(core(&rt));
            assert!(stack.should_track());
            drop(nested);

            assert!(!stack.should_track());
        }

        assert!(stack.should_track());
    }
}
