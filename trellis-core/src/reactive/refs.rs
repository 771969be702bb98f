//! Refs
//!
//! A [`Ref`] is a handle to a single observed slot, read and written through
//! [`Ref::value`] and [`Ref::set_value`]. There are two flavors:
//!
//! - an owned ref wraps a one-field record `{ value }` in a reactive wrapper,
//!   so a bare number or string can be observed like any container field;
//! - a field ref forwards to `key` on an existing wrapper, so handing a single
//!   field out of reactive state keeps it connected to its source.
//!
//! Refs stored in a component's setup bindings are unwrapped on read and
//! written through on assignment by the render context.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::proxy::Reactive;
use super::runtime::Runtime;
use super::value::{RawObject, Value};

const VALUE_KEY: &str = "value";

#[derive(Clone)]
enum RefSlot {
    Owned(Reactive),
    Field { source: Reactive, key: Rc<str> },
}

/// Handle to one observed value.
#[derive(Clone)]
pub struct Ref {
    slot: RefSlot,
}

impl Ref {
    pub(crate) fn owned(rt: &Runtime, value: Value) -> Self {
        let raw = RawObject::record_from([(VALUE_KEY, value)]);
        Self {
            slot: RefSlot::Owned(rt.reactive(&raw)),
        }
    }

    pub(crate) fn field(source: &Reactive, key: &str) -> Self {
        Self {
            slot: RefSlot::Field {
                source: source.clone(),
                key: key.into(),
            },
        }
    }

    /// Read the value, tracking it when an effect is running.
    pub fn value(&self) -> Value {
        match &self.slot {
            RefSlot::Owned(wrapper) => wrapper.get(VALUE_KEY),
            RefSlot::Field { source, key } => source.get(key),
        }
    }

    /// Write the value. Returns `false` when the underlying wrapper is
    /// readonly.
    pub fn set_value(&self, value: impl Into<Value>) -> bool {
        match &self.slot {
            RefSlot::Owned(wrapper) => wrapper.set(VALUE_KEY, value),
            RefSlot::Field { source, key } => source.set(key, value),
        }
    }

    /// Whether this ref forwards to a field of another wrapper.
    pub fn is_field(&self) -> bool {
        matches!(self.slot, RefSlot::Field { .. })
    }

    pub fn ptr_eq(&self, other: &Ref) -> bool {
        match (&self.slot, &other.slot) {
            (RefSlot::Owned(a), RefSlot::Owned(b)) => a.ptr_eq(b),
            (
                RefSlot::Field { source: a, key: ka },
                RefSlot::Field { source: b, key: kb },
            ) => a.ptr_eq(b) && ka == kb,
            _ => false,
        }
    }

    pub(crate) fn addr(&self) -> usize {
        match &self.slot {
            RefSlot::Owned(wrapper) | RefSlot::Field { source: wrapper, .. } => wrapper.addr(),
        }
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.slot {
            RefSlot::Owned(wrapper) => write!(f, "Ref({:?})", wrapper.id()),
            RefSlot::Field { source, key } => write!(f, "Ref({:?}.{key})", source.id()),
        }
    }
}

impl Runtime {
    /// A ref holding `value`.
    pub fn new_ref(&self, value: impl Into<Value>) -> Ref {
        Ref::owned(self, value.into())
    }

    /// A ref forwarding to `key` on `source`.
    pub fn to_ref(&self, source: &Reactive, key: &str) -> Ref {
        Ref::field(source, key)
    }

    /// One field ref per own field of `source`, in field order.
    pub fn to_refs(&self, source: &Reactive) -> IndexMap<Rc<str>, Ref> {
        self.untracked(|| source.keys())
            .into_iter()
            .map(|key| {
                let field = Ref::field(source, &key);
                (key, field)
            })
            .collect()
    }
}

impl Value {
    pub fn as_ref_handle(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// The value a ref points at, or the value itself.
    pub fn unref(&self) -> Value {
        match self {
            Value::Ref(r) => r.value(),
            other => other.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::record;

    #[test]
    fn owned_ref_triggers_on_change() {
        let rt = Runtime::new();
        let count = rt.new_ref(1);
        let runs = Rc::new(Cell::new(0));
        let (c, r) = (count.clone(), runs.clone());

        let _effect = rt.effect(move || {
            c.value();
            r.set(r.get() + 1);
        });

        assert!(count.set_value(2));
        count.set_value(2);
        assert_eq!(count.value(), Value::from(2));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn field_ref_stays_connected_to_its_source() {
        let rt = Runtime::new();
        let state = rt.reactive(&record! { "foo" => 1, "bar" => 2 });
        let foo = rt.to_ref(&state, "foo");

        state.set("foo", 10);
        assert_eq!(foo.value(), Value::from(10));

        foo.set_value(20);
        assert_eq!(state.get("foo"), Value::from(20));
        assert!(foo.is_field());
    }

    #[test]
    fn to_refs_covers_every_field() {
        let rt = Runtime::new();
        let state = rt.reactive(&record! { "foo" => 1, "bar" => 2 });
        let refs = rt.to_refs(&state);

        let keys: Vec<&str> = refs.keys().map(|k| &**k).collect();
        assert_eq!(keys, vec!["foo", "bar"]);

        let runs = Rc::new(Cell::new(0));
        let (bar, r) = (refs["bar"].clone(), runs.clone());
        let _effect = rt.effect(move || {
            bar.value();
            r.set(r.get() + 1);
        });
        state.set("bar", 3);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn readonly_source_rejects_ref_writes() {
        let rt = Runtime::new();
        let raw = record! { "a" => 1 };
        let a = rt.to_ref(&rt.readonly(&raw), "a");

        assert!(!a.set_value(5));
        assert_eq!(a.value(), Value::from(1));
    }

    #[test]
    fn unref_reads_through_refs_only() {
        let rt = Runtime::new();
        let r = rt.new_ref("x");

        assert_eq!(Value::from(r.clone()).unref(), Value::from("x"));
        assert_eq!(Value::from(3).unref(), Value::from(3));
        assert_eq!(Value::from(r.clone()), Value::from(r));
    }
}
