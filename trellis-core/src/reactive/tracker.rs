//! Dependency Tracker
//!
//! Maps `(target, key)` pairs to the effects that read them during their most
//! recent run. Each effect keeps the reverse list of entries it is registered
//! in (see [`EffectCore`]), so both directions can be cleaned up together.
//!
//! # Keys
//!
//! Besides real property keys there are synthetic keys:
//!
//! - [`TrackKey::Iterate`]: structural enumeration of a record, map or set
//!   (keys added or removed).
//! - [`TrackKey::MapKeyIterate`]: enumeration of map keys only. A map value
//!   overwrite does not invalidate it.
//! - [`TrackKey::Length`]: sequence length.
//! - [`TrackKey::Value`]: the single key a computed value exposes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Range;
use std::rc::Rc;

use indexmap::IndexMap;

use super::effect::EffectCore;
use super::subscriber::{ObjectId, SubscriberId};
use super::value::{ContainerKind, Value};

/// The key half of a dependency entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackKey {
    /// A record field.
    Field(Rc<str>),
    /// A sequence slot.
    Index(usize),
    /// A map or set entry, keyed by the raw entry key.
    Entry(Value),
    Iterate,
    MapKeyIterate,
    Length,
    Value,
}

/// The kind of change a trigger reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    /// An existing key changed value.
    Set,
    /// A key that did not exist was added.
    Add,
    /// An existing key was removed.
    Delete,
    /// The whole container was emptied.
    Clear,
}

impl TriggerOp {
    /// Keys invalidated by this change besides `key` itself.
    pub(crate) fn extra_keys(self, kind: ContainerKind) -> &'static [TrackKey] {
        match (self, kind) {
            (TriggerOp::Add | TriggerOp::Delete, ContainerKind::Record | ContainerKind::Set) => {
                &[TrackKey::Iterate]
            }
            (TriggerOp::Add | TriggerOp::Delete, ContainerKind::Map) => {
                &[TrackKey::Iterate, TrackKey::MapKeyIterate]
            }
            (TriggerOp::Add | TriggerOp::Delete, ContainerKind::Sequence) => &[TrackKey::Length],
            (TriggerOp::Set, ContainerKind::Map) => &[TrackKey::Iterate],
            _ => &[],
        }
    }
}

type Subscribers = IndexMap<SubscriberId, Rc<EffectCore>>;

/// The dependency table.
#[derive(Default)]
pub(crate) struct Tracker {
    targets: RefCell<HashMap<ObjectId, IndexMap<TrackKey, Subscribers>>>,
}

impl Tracker {
    /// Register `effect` under `(target, key)`. Returns `false` if it was
    /// already registered there.
    pub(crate) fn add(&self, target: ObjectId, key: &TrackKey, effect: &Rc<EffectCore>) -> bool {
        let mut targets = self.targets.borrow_mut();
        let subscribers = targets
            .entry(target)
            .or_default()
            .entry(key.clone())
            .or_default();
        if subscribers.contains_key(&effect.id) {
            return false;
        }
        subscribers.insert(effect.id, Rc::clone(effect));
        true
    }

    /// Remove `id` from `(target, key)`, dropping empty entries.
    pub(crate) fn remove(&self, target: ObjectId, key: &TrackKey, id: SubscriberId) {
        let mut targets = self.targets.borrow_mut();
        let Some(keys) = targets.get_mut(&target) else {
            return;
        };
        if let Some(subscribers) = keys.get_mut(key) {
            subscribers.shift_remove(&id);
            if subscribers.is_empty() {
                keys.shift_remove(key);
            }
        }
        if keys.is_empty() {
            targets.remove(&target);
        }
    }

    /// Collect the effects registered under any of `keys`, deduplicated, in
    /// registration order.
    pub(crate) fn collect<'k>(
        &self,
        target: ObjectId,
        keys: impl IntoIterator<Item = &'k TrackKey>,
    ) -> Vec<Rc<EffectCore>> {
        let targets = self.targets.borrow();
        let Some(entries) = targets.get(&target) else {
            return Vec::new();
        };
        let mut collected: Subscribers = IndexMap::new();
        for key in keys {
            if let Some(subscribers) = entries.get(key) {
                for (id, effect) in subscribers {
                    collected.entry(*id).or_insert_with(|| Rc::clone(effect));
                }
            }
        }
        collected.into_values().collect()
    }

    /// Every key currently tracked on `target`.
    pub(crate) fn keys_of(&self, target: ObjectId) -> Vec<TrackKey> {
        self.targets
            .borrow()
            .get(&target)
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Tracked sequence slots of `target` that fall inside `range`.
    pub(crate) fn indices_in(&self, target: ObjectId, range: &Range<usize>) -> Vec<TrackKey> {
        self.targets
            .borrow()
            .get(&target)
            .map(|keys| {
                keys.keys()
                    .filter(|key| matches!(key, TrackKey::Index(i) if range.contains(i)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn subscriber_count(&self, target: ObjectId, key: &TrackKey) -> usize {
        self.targets
            .borrow()
            .get(&target)
            .and_then(|keys| keys.get(key))
            .map_or(0, IndexMap::len)
    }

    /// Whether `id` is registered under `(target, key)`.
    #[cfg(test)]
    pub(crate) fn contains(&self, target: ObjectId, key: &TrackKey, id: SubscriberId) -> bool {
        self.targets
            .borrow()
            .get(&target)
            .and_then(|keys| keys.get(key))
            .is_some_and(|subscribers| subscribers.contains_key(&id))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
