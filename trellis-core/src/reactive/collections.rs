//! Sequence, map and set operations on [`Reactive`].
//!
//! Structural sequence edits (`push`, `pop`, `shift`, `unshift`, `splice`,
//! `set_len`) run with tracking paused and report their net effect with one
//! trigger covering the slots that moved and the length. Lookups
//! (`includes`, `index_of`, `last_index_of`) compare against the wrapped
//! items first and fall back to the raw items, so both a value obtained
//! through the wrapper and the raw value are found.

use std::cmp::min;

use indexmap::{IndexMap, IndexSet};

use super::proxy::Reactive;
use super::tracker::{TrackKey, TriggerOp};
use super::value::{Container, Value};

impl Reactive {
    fn read_sequence<R>(&self, operation: &'static str, f: impl FnOnce(&Vec<Value>) -> R) -> Option<R> {
        let result = match &*self.data() {
            Container::Sequence(items) => Ok(f(items)),
            other => Err(other.kind()),
        };
        result.map_err(|kind| self.mismatch(operation, kind)).ok()
    }

    /// Apply a structural edit and trigger the slots from the returned index
    /// on, plus the length when it changed.
    fn edit_sequence<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Vec<Value>) -> (R, Option<usize>),
    ) -> Option<R> {
        if self.reject_write(operation) {
            return None;
        }
        let rt = self.runtime();
        let _paused = rt.as_ref().map(|rt| rt.inner.context.pause());

        let result = match &mut *self.raw().data_mut() {
            Container::Sequence(items) => {
                let before = items.len();
                let (value, changed_from) = f(items);
                Ok((value, changed_from, before != items.len()))
            }
            other => Err(other.kind()),
        };
        let (value, changed_from, length_changed) = match result {
            Ok(result) => result,
            Err(kind) => {
                self.mismatch(operation, kind);
                return None;
            }
        };

        drop(_paused);
        if let (Some(rt), Some(from)) = (rt, changed_from) {
            rt.trigger_sequence(self.id(), from..usize::MAX, length_changed);
        }
        Some(value)
    }

    // ------------------------------------------------------------------
    // Sequences
    // ------------------------------------------------------------------

    /// Sequence length. Tracks the length key.
    pub fn len(&self) -> usize {
        let len = self.read_sequence("len", Vec::len).unwrap_or(0);
        self.track(TrackKey::Length);
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Item at `index`, `Null` when out of range.
    pub fn at(&self, index: usize) -> Value {
        let item = self.read_sequence("at", |items| items.get(index).cloned()).flatten();
        self.track(TrackKey::Index(index));
        item.map_or(Value::Null, |item| self.wrap_nested(item))
    }

    /// Write the slot at `index`. Writing at or past the end extends the
    /// sequence with `Null` padding, which is an add.
    pub fn set_at(&self, index: usize, value: impl Into<Value>) -> bool {
        let value = value.into().to_raw();
        let mut changed = false;
        let extended = self.edit_sequence("set_at", |items| {
            if index < items.len() {
                changed = !items[index].same_value(&value);
                items[index] = value;
                ((), None)
            } else {
                let from = items.len();
                items.resize(index, Value::Null);
                items.push(value);
                ((), Some(from))
            }
        });
        if extended.is_some() && changed {
            self.trigger(TriggerOp::Set, TrackKey::Index(index));
        }
        extended.is_some()
    }

    /// Truncate or pad with `Null`.
    pub fn set_len(&self, len: usize) -> bool {
        self.edit_sequence("set_len", |items| {
            let from = min(items.len(), len);
            let changed = items.len() != len;
            items.resize(len, Value::Null);
            ((), changed.then_some(from))
        })
        .is_some()
    }

    /// Append an item, returning the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        let value = value.into().to_raw();
        self.edit_sequence("push", |items| {
            items.push(value);
            (items.len(), Some(items.len() - 1))
        })
        .unwrap_or_else(|| self.raw().len())
    }

    /// Remove the last item. `Null` (and no trigger) when empty.
    pub fn pop(&self) -> Value {
        self.edit_sequence("pop", |items| {
            let popped = items.pop();
            let from = popped.as_ref().map(|_| items.len());
            (popped, from)
        })
        .flatten()
        .map_or(Value::Null, |item| self.wrap_nested(item))
    }

    /// Remove the first item.
    pub fn shift(&self) -> Value {
        self.edit_sequence("shift", |items| {
            if items.is_empty() {
                (None, None)
            } else {
                (Some(items.remove(0)), Some(0))
            }
        })
        .flatten()
        .map_or(Value::Null, |item| self.wrap_nested(item))
    }

    /// Prepend an item, returning the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> usize {
        let value = value.into().to_raw();
        self.edit_sequence("unshift", |items| {
            items.insert(0, value);
            (items.len(), Some(0))
        })
        .unwrap_or_else(|| self.raw().len())
    }

    /// Remove `delete_count` items at `start` and insert `items` there.
    /// Returns the removed items.
    pub fn splice<I, V>(&self, start: usize, delete_count: usize, insert: I) -> Vec<Value>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let insert: Vec<Value> = insert.into_iter().map(|v| v.into().to_raw()).collect();
        let removed = self.edit_sequence("splice", |items| {
            let start = min(start, items.len());
            let end = min(start.saturating_add(delete_count), items.len());
            let touched = end > start || !insert.is_empty();
            let removed: Vec<Value> = items.splice(start..end, insert).collect();
            (removed, touched.then_some(start))
        });
        removed
            .unwrap_or_default()
            .into_iter()
            .map(|item| self.wrap_nested(item))
            .collect()
    }

    /// All items, wrapped. Tracks the length and every slot.
    pub fn to_vec(&self) -> Vec<Value> {
        let items = self.read_sequence("to_vec", Vec::clone).unwrap_or_default();
        self.track(TrackKey::Length);
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                self.track(TrackKey::Index(index));
                self.wrap_nested(item)
            })
            .collect()
    }

    pub fn includes(&self, needle: &Value) -> bool {
        self.index_of(needle).is_some()
    }

    pub fn index_of(&self, needle: &Value) -> Option<usize> {
        self.search("index_of", needle, false)
    }

    pub fn last_index_of(&self, needle: &Value) -> Option<usize> {
        self.search("last_index_of", needle, true)
    }

    fn search(&self, operation: &'static str, needle: &Value, from_end: bool) -> Option<usize> {
        let items = self.read_sequence(operation, Vec::clone)?;
        self.track(TrackKey::Length);
        for index in 0..items.len() {
            self.track(TrackKey::Index(index));
        }

        let find = |matches: &dyn Fn(&Value) -> bool| {
            if from_end {
                items.iter().rposition(matches)
            } else {
                items.iter().position(matches)
            }
        };
        find(&|item: &Value| self.wrap_nested(item.clone()).same_value(needle)).or_else(|| {
            let raw = needle.to_raw();
            find(&|item: &Value| item.same_value(&raw))
        })
    }

    // ------------------------------------------------------------------
    // Maps and sets
    // ------------------------------------------------------------------

    fn read_keyed<R>(
        &self,
        operation: &'static str,
        map: impl FnOnce(&IndexMap<Value, Value>) -> R,
        set: impl FnOnce(&IndexSet<Value>) -> R,
    ) -> Option<R> {
        let result = match &*self.data() {
            Container::Map(entries) => Ok(map(entries)),
            Container::Set(values) => Ok(set(values)),
            other => Err(other.kind()),
        };
        result.map_err(|kind| self.mismatch(operation, kind)).ok()
    }

    /// Map lookup. Tracks the entry.
    pub fn get_entry(&self, key: &Value) -> Value {
        let key = key.to_raw();
        let found = match &*self.data() {
            Container::Map(entries) => Ok(entries.get(&key).cloned()),
            other => Err(other.kind()),
        };
        match found {
            Ok(found) => {
                self.track(TrackKey::Entry(key));
                found.map_or(Value::Null, |value| self.wrap_nested(value))
            }
            Err(kind) => {
                self.mismatch("get_entry", kind);
                Value::Null
            }
        }
    }

    /// Map insert. `Add` for a new key, `Set` for a changed value.
    pub fn insert(&self, key: impl Into<Value>, value: impl Into<Value>) -> bool {
        let (key, value) = (key.into().to_raw(), value.into().to_raw());
        if self.reject_write(&key) {
            return false;
        }
        let previous = match &mut *self.raw().data_mut() {
            Container::Map(entries) => Ok(entries.insert(key.clone(), value.clone())),
            other => Err(other.kind()),
        };
        match previous {
            Ok(None) => self.trigger(TriggerOp::Add, TrackKey::Entry(key)),
            Ok(Some(old)) if !old.same_value(&value) => {
                self.trigger(TriggerOp::Set, TrackKey::Entry(key))
            }
            Ok(Some(_)) => {}
            Err(kind) => {
                self.mismatch("insert", kind);
                return false;
            }
        }
        true
    }

    /// Set insert. Returns whether the value was new.
    pub fn add(&self, value: impl Into<Value>) -> bool {
        let value = value.into().to_raw();
        if self.reject_write(&value) {
            return false;
        }
        let added = match &mut *self.raw().data_mut() {
            Container::Set(values) => Ok(values.insert(value.clone())),
            other => Err(other.kind()),
        };
        match added {
            Ok(added) => {
                if added {
                    self.trigger(TriggerOp::Add, TrackKey::Entry(value));
                }
                added
            }
            Err(kind) => {
                self.mismatch("add", kind);
                false
            }
        }
    }

    /// Map key or set member test. Tracks the entry.
    pub fn contains(&self, key: &Value) -> bool {
        let key = key.to_raw();
        let found = self.read_keyed(
            "contains",
            |entries| entries.contains_key(&key),
            |values| values.contains(&key),
        );
        match found {
            Some(found) => {
                self.track(TrackKey::Entry(key));
                found
            }
            None => false,
        }
    }

    /// Remove a map entry or set member. Returns whether it existed.
    pub fn remove(&self, key: &Value) -> bool {
        let key = key.to_raw();
        if self.reject_delete(&key) {
            return false;
        }
        let removed = match &mut *self.raw().data_mut() {
            Container::Map(entries) => Ok(entries.shift_remove(&key).is_some()),
            Container::Set(values) => Ok(values.shift_remove(&key)),
            other => Err(other.kind()),
        };
        match removed {
            Ok(removed) => {
                if removed {
                    self.trigger(TriggerOp::Delete, TrackKey::Entry(key));
                }
                removed
            }
            Err(kind) => {
                self.mismatch("remove", kind);
                false
            }
        }
    }

    /// Empty a map or set, notifying everything that depended on it.
    pub fn clear(&self) {
        if self.reject_delete("clear") {
            return;
        }
        let had_entries = match &mut *self.raw().data_mut() {
            Container::Map(entries) => {
                let had = !entries.is_empty();
                entries.clear();
                Ok(had)
            }
            Container::Set(values) => {
                let had = !values.is_empty();
                values.clear();
                Ok(had)
            }
            other => Err(other.kind()),
        };
        match had_entries {
            Ok(true) => self.trigger(TriggerOp::Clear, TrackKey::Iterate),
            Ok(false) => {}
            Err(kind) => self.mismatch("clear", kind),
        }
    }

    /// Entry count. Tracks structure.
    pub fn size(&self) -> usize {
        let size = self
            .read_keyed("size", IndexMap::len, IndexSet::len)
            .unwrap_or(0);
        self.track(TrackKey::Iterate);
        size
    }

    /// `(key, value)` pairs; a set yields each member as both.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        let entries = self
            .read_keyed(
                "entries",
                |entries| entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                |values| values.iter().map(|v| (v.clone(), v.clone())).collect(),
            )
            .unwrap_or_else(Vec::new);
        self.track(TrackKey::Iterate);
        entries
            .into_iter()
            .map(|(k, v)| (self.wrap_nested(k), self.wrap_nested(v)))
            .collect()
    }

    /// Map values or set members.
    pub fn values(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, value)| value).collect()
    }

    /// Map keys. Tracks key structure only, so overwriting a value does not
    /// invalidate the caller.
    pub fn map_keys(&self) -> Vec<Value> {
        let keys = match &*self.data() {
            Container::Map(entries) => Ok(entries.keys().cloned().collect::<Vec<_>>()),
            other => Err(other.kind()),
        };
        match keys {
            Ok(keys) => {
                self.track(TrackKey::MapKeyIterate);
                keys.into_iter().map(|k| self.wrap_nested(k)).collect()
            }
            Err(kind) => {
                self.mismatch("map_keys", kind);
                Vec::new()
            }
        }
    }

    /// Call `f(value, key)` for each entry.
    pub fn for_each(&self, mut f: impl FnMut(&Value, &Value)) {
        for (key, value) in self.entries() {
            f(&value, &key);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
