//! Reactive Wrappers
//!
//! A [`Reactive`] is an explicit wrapper over a [`RawObject`]. Reads through
//! it register dependencies, writes through it trigger the effects that
//! depend on what changed. The wrapper comes in four flavors:
//!
//! | flavor             | tracks reads | accepts writes | wraps nested objects |
//! |--------------------|--------------|----------------|----------------------|
//! | `reactive`         | yes          | yes            | reactive             |
//! | `shallow_reactive` | yes          | yes            | no                   |
//! | `readonly`         | no           | no             | readonly             |
//! | `shallow_readonly` | no           | no             | no                   |
//!
//! A readonly view taken from a tracking wrapper (see
//! [`Reactive::as_readonly`]) rejects writes but keeps tracking reads, which
//! is how components hand their props to `setup`.
//!
//! Wrappers are cached per runtime: wrapping the same raw object with the
//! same flavor returns the same wrapper for as long as it is alive.
//!
//! This module covers records. Sequence, map and set operations live in
//! `collections.rs`.

use std::cell::Ref;
use std::fmt;
use std::rc::Rc;

use super::runtime::{Runtime, WeakRuntime};
use super::tracker::{TrackKey, TriggerOp};
use super::value::{Container, ContainerKind, RawObject, Record, Value};
use super::subscriber::ObjectId;
use crate::error::Warning;

/// Wrapper flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyKind {
    Reactive,
    ShallowReactive,
    Readonly,
    ShallowReadonly,
}

impl ProxyKind {
    pub fn is_readonly(self) -> bool {
        matches!(self, ProxyKind::Readonly | ProxyKind::ShallowReadonly)
    }

    pub fn is_shallow(self) -> bool {
        matches!(self, ProxyKind::ShallowReactive | ProxyKind::ShallowReadonly)
    }
}

pub(crate) struct ProxyInner {
    raw: RawObject,
    kind: ProxyKind,
    /// Whether reads register dependencies.
    tracked: bool,
    runtime: WeakRuntime,
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        let Some(rt) = self.runtime.upgrade() else {
            return;
        };
        let Ok(mut cache) = rt.inner.proxies.try_borrow_mut() else {
            return;
        };
        let key = (self.raw.id(), self.kind, self.tracked);
        if cache.get(&key).is_some_and(|entry| entry.strong_count() == 0) {
            cache.remove(&key);
        }
    }
}

/// A tracking wrapper over a raw container.
#[derive(Clone)]
pub struct Reactive {
    inner: Rc<ProxyInner>,
}

impl Reactive {
    pub(crate) fn wrap(rt: &Runtime, raw: &RawObject, kind: ProxyKind, tracked: bool) -> Self {
        let key = (raw.id(), kind, tracked);
        let cached = rt.inner.proxies.borrow().get(&key).and_then(|weak| weak.upgrade());
        if let Some(inner) = cached {
            return Self { inner };
        }

        let inner = Rc::new(ProxyInner {
            raw: raw.clone(),
            kind,
            tracked,
            runtime: rt.downgrade(),
        });
        rt.inner.proxies.borrow_mut().insert(key, Rc::downgrade(&inner));
        Self { inner }
    }

    fn wrap_in(runtime: &WeakRuntime, raw: &RawObject, kind: ProxyKind, tracked: bool) -> Self {
        match runtime.upgrade() {
            Some(rt) => Self::wrap(&rt, raw, kind, tracked),
            None => Self {
                inner: Rc::new(ProxyInner {
                    raw: raw.clone(),
                    kind,
                    tracked,
                    runtime: WeakRuntime::default(),
                }),
            },
        }
    }

    /// The wrapped raw container.
    pub fn raw(&self) -> &RawObject {
        &self.inner.raw
    }

    pub fn id(&self) -> ObjectId {
        self.inner.raw.id()
    }

    pub fn kind(&self) -> ContainerKind {
        self.inner.raw.kind()
    }

    pub fn proxy_kind(&self) -> ProxyKind {
        self.inner.kind
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.kind.is_readonly()
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.kind.is_shallow()
    }

    /// Whether two handles are the same wrapper.
    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    /// Readonly view of the same container. Reads keep tracking when `self`
    /// tracks.
    pub fn as_readonly(&self) -> Reactive {
        self.view(ProxyKind::Readonly)
    }

    pub fn as_shallow_readonly(&self) -> Reactive {
        self.view(ProxyKind::ShallowReadonly)
    }

    fn view(&self, kind: ProxyKind) -> Reactive {
        if self.is_readonly() {
            return self.clone();
        }
        Self::wrap_in(&self.inner.runtime, &self.inner.raw, kind, self.inner.tracked)
    }

    pub(crate) fn runtime(&self) -> Option<Runtime> {
        self.inner.runtime.upgrade()
    }

    // ------------------------------------------------------------------
    // Shared plumbing
    // ------------------------------------------------------------------

    pub(crate) fn track(&self, key: TrackKey) {
        if !self.inner.tracked {
            return;
        }
        if let Some(rt) = self.runtime() {
            rt.track(self.id(), key);
        }
    }

    pub(crate) fn trigger(&self, op: TriggerOp, key: TrackKey) {
        if let Some(rt) = self.runtime() {
            rt.trigger(self.id(), self.kind(), op, key);
        }
    }

    pub(crate) fn warn(&self, warning: Warning) {
        match self.runtime() {
            Some(rt) => rt.warn(warning),
            None => tracing::warn!("{}", warning),
        }
    }

    pub(crate) fn mismatch(&self, operation: &'static str, kind: ContainerKind) {
        self.warn(Warning::ContainerMismatch {
            operation,
            kind: kind.as_str(),
        });
    }

    /// Reject a write on a readonly wrapper. Returns `true` if rejected.
    pub(crate) fn reject_write(&self, key: impl fmt::Display) -> bool {
        if self.is_readonly() {
            self.warn(Warning::ReadonlyWrite {
                key: key.to_string(),
            });
            return true;
        }
        false
    }

    pub(crate) fn reject_delete(&self, key: impl fmt::Display) -> bool {
        if self.is_readonly() {
            self.warn(Warning::ReadonlyDelete {
                key: key.to_string(),
            });
            return true;
        }
        false
    }

    /// Wrap a value read out of the container with this wrapper's flavor.
    pub(crate) fn wrap_nested(&self, value: Value) -> Value {
        match value {
            Value::Object(raw) if !self.is_shallow() => Value::Proxy(Self::wrap_in(
                &self.inner.runtime,
                &raw,
                self.inner.kind,
                self.inner.tracked,
            )),
            other => other,
        }
    }

    pub(crate) fn data(&self) -> Ref<'_, Container> {
        self.inner.raw.data()
    }

    fn read_record<R>(&self, operation: &'static str, f: impl FnOnce(&Record) -> R) -> Option<R> {
        let result = match &*self.data() {
            Container::Record(record) => Ok(f(record)),
            other => Err(other.kind()),
        };
        result.map_err(|kind| self.mismatch(operation, kind)).ok()
    }

    fn write_record<R>(&self, operation: &'static str, f: impl FnOnce(&mut Record) -> R) -> Option<R> {
        let result = match &mut *self.inner.raw.data_mut() {
            Container::Record(record) => Ok(f(record)),
            other => Err(other.kind()),
        };
        result.map_err(|kind| self.mismatch(operation, kind)).ok()
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    /// Read a field. Misses fall through to the prototype chain; both the
    /// record and the prototype track the key.
    pub fn get(&self, key: &str) -> Value {
        let Some(found) = self.read_record("get", |record| match record.fields.get(key) {
            Some(value) => Ok(value.clone()),
            None => Err(record.proto.clone()),
        }) else {
            return Value::Null;
        };

        self.track(TrackKey::Field(key.into()));
        match found {
            Ok(value) => self.wrap_nested(value),
            Err(Some(proto)) => {
                Self::wrap_in(&self.inner.runtime, &proto, self.inner.kind, self.inner.tracked)
                    .get(key)
            }
            Err(None) => Value::Null,
        }
    }

    /// Write a field. Triggers `Add` for a new key, `Set` for a changed
    /// value, nothing for a same-value write. Returns `false` when rejected.
    ///
    /// The write always lands on this record, never on its prototype.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        if self.reject_write(key) {
            return false;
        }
        let value = value.into().to_raw();
        let Some(previous) = self.write_record("set", |record| {
            record.fields.insert(Rc::from(key), value.clone())
        }) else {
            return false;
        };

        match previous {
            None => self.trigger(TriggerOp::Add, TrackKey::Field(key.into())),
            Some(old) if !old.same_value(&value) => {
                self.trigger(TriggerOp::Set, TrackKey::Field(key.into()))
            }
            Some(_) => {}
        }
        true
    }

    /// Whether the record or its prototype chain has `key`.
    pub fn has(&self, key: &str) -> bool {
        let Some(found) = self.read_record("has", |record| {
            if record.fields.contains_key(key) {
                Ok(())
            } else {
                Err(record.proto.clone())
            }
        }) else {
            return false;
        };

        self.track(TrackKey::Field(key.into()));
        match found {
            Ok(()) => true,
            Err(Some(proto)) => {
                Self::wrap_in(&self.inner.runtime, &proto, self.inner.kind, self.inner.tracked)
                    .has(key)
            }
            Err(None) => false,
        }
    }

    /// Remove a field. Returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        if self.reject_delete(key) {
            return false;
        }
        let removed = self
            .write_record("delete", |record| record.fields.shift_remove(key))
            .flatten();
        if removed.is_some() {
            self.trigger(TriggerOp::Delete, TrackKey::Field(key.into()));
        }
        removed.is_some()
    }

    /// Own field names in insertion order. Tracks structural changes.
    pub fn keys(&self) -> Vec<Rc<str>> {
        let keys = self
            .read_record("keys", |record| record.fields.keys().cloned().collect())
            .unwrap_or_default();
        self.track(TrackKey::Iterate);
        keys
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("kind", &self.inner.kind)
            .field("raw", &self.inner.raw)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
