//! Dynamic Values and Raw Containers
//!
//! Observed state is plain data: records, sequences, maps and sets holding
//! [`Value`]s. The raw containers defined here know nothing about tracking.
//! The proxy layer ([`Reactive`]) wraps them and adds track-on-read and
//! trigger-on-write.
//!
//! # Identity
//!
//! A [`RawObject`] is a shared handle. Cloning it clones the handle, not the
//! data, and every raw object carries a stable [`ObjectId`]. Object values
//! compare by identity, never by content.
//!
//! # Equality
//!
//! [`Value::same_value`] is the equality used for change detection and for
//! map/set keys. It is the usual equality except that `NaN` equals itself and
//! `+0` equals `-0`, so writing `NaN` over `NaN` is not a change.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use super::proxy::Reactive;
use super::refs::Ref as ValueRef;
use super::subscriber::ObjectId;
use crate::error::Result;

/// A function value: event handlers, emitted-event targets, callbacks stored
/// in state.
///
/// Callbacks compare by identity.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&[Value]) -> Value>);

impl Callback {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        Self(Rc::new(func))
    }

    /// Wrap a handler whose return value is irrelevant.
    pub fn handler<F>(func: F) -> Self
    where
        F: Fn(&[Value]) + 'static,
    {
        Self::new(move |args| {
            func(args);
            Value::Null
        })
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }

    pub fn ptr_eq(&self, other: &Callback) -> bool {
        self.addr() == other.addr()
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const u8 as usize
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:#x})", self.addr())
    }
}

/// A dynamically typed value held by observed containers and node props.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    /// A raw, untracked container.
    Object(RawObject),
    /// A container seen through a reactive wrapper.
    Proxy(Reactive),
    Callback(Callback),
    /// A handle to a single observed slot.
    Ref(ValueRef),
}

impl Value {
    /// Same-value-zero comparison.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Proxy(a), Value::Proxy(b)) => a.ptr_eq(b),
            (Value::Callback(a), Value::Callback(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Replace a wrapper by the raw container it wraps.
    pub fn to_raw(&self) -> Value {
        match self {
            Value::Proxy(proxy) => Value::Object(proxy.raw().clone()),
            other => other.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value is a container, raw or wrapped.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Proxy(_))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Reactive> {
        match self {
            Value::Proxy(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&RawObject> {
        match self {
            Value::Object(o) => Some(o),
            Value::Proxy(p) => Some(p.raw()),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Value::Callback(c) => Some(c),
            _ => None,
        }
    }

    /// Convert parsed JSON into values, building raw containers for arrays
    /// and objects.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s.as_str().into()),
            serde_json::Value::Array(items) => {
                Value::Object(RawObject::sequence(items.iter().map(Value::from_json)))
            }
            serde_json::Value::Object(fields) => Value::Object(RawObject::record_from(
                fields
                    .iter()
                    .map(|(key, value)| (key.as_str(), Value::from_json(value))),
            )),
        }
    }

    /// Parse a JSON document into a value.
    pub fn parse_json(json: &str) -> Result<Value> {
        let parsed: serde_json::Value = serde_json::from_str(json)?;
        Ok(Value::from_json(&parsed))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => {
                let bits = if n.is_nan() {
                    f64::NAN.to_bits()
                } else if *n == 0.0 {
                    0
                } else {
                    n.to_bits()
                };
                bits.hash(state);
            }
            Value::Str(s) => s.hash(state),
            Value::Object(o) => o.id().hash(state),
            Value::Proxy(p) => p.addr().hash(state),
            Value::Callback(c) => c.addr().hash(state),
            Value::Ref(r) => r.addr().hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Object(o) => o.fmt(f),
            Value::Proxy(p) => p.fmt(f),
            Value::Callback(c) => c.fmt(f),
            Value::Ref(r) => fmt::Debug::fmt(r, f),
        }
    }
}

/// Text form used when a value ends up as node content.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::Object(_) | Value::Proxy(_) => f.write_str("[object]"),
            Value::Callback(_) => f.write_str("[function]"),
            Value::Ref(r) => fmt::Display::fmt(&r.value(), f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n.into())
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<RawObject> for Value {
    fn from(o: RawObject) -> Self {
        Value::Object(o)
    }
}

impl From<&RawObject> for Value {
    fn from(o: &RawObject) -> Self {
        Value::Object(o.clone())
    }
}

impl From<Reactive> for Value {
    fn from(p: Reactive) -> Self {
        Value::Proxy(p)
    }
}

impl From<ValueRef> for Value {
    fn from(r: ValueRef) -> Self {
        Value::Ref(r)
    }
}

impl From<Callback> for Value {
    fn from(c: Callback) -> Self {
        Value::Callback(c)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// The shape of a raw container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Record,
    Sequence,
    Map,
    Set,
}

impl ContainerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Record => "record",
            ContainerKind::Sequence => "sequence",
            ContainerKind::Map => "map",
            ContainerKind::Set => "set",
        }
    }
}

/// A keyed record with insertion-ordered fields and an optional prototype.
///
/// Reads that miss on the record fall through to the prototype chain.
#[derive(Default)]
pub struct Record {
    pub(crate) fields: IndexMap<Rc<str>, Value>,
    pub(crate) proto: Option<RawObject>,
}

impl Record {
    pub fn fields(&self) -> &IndexMap<Rc<str>, Value> {
        &self.fields
    }

    pub fn prototype(&self) -> Option<&RawObject> {
        self.proto.as_ref()
    }
}

/// Storage behind a [`RawObject`].
pub enum Container {
    Record(Record),
    Sequence(Vec<Value>),
    Map(IndexMap<Value, Value>),
    Set(IndexSet<Value>),
}

impl Container {
    pub fn kind(&self) -> ContainerKind {
        match self {
            Container::Record(_) => ContainerKind::Record,
            Container::Sequence(_) => ContainerKind::Sequence,
            Container::Map(_) => ContainerKind::Map,
            Container::Set(_) => ContainerKind::Set,
        }
    }
}

struct RawInner {
    id: ObjectId,
    data: RefCell<Container>,
}

/// A shared, untracked container.
#[derive(Clone)]
pub struct RawObject {
    inner: Rc<RawInner>,
}

impl RawObject {
    pub fn new(container: Container) -> Self {
        Self {
            inner: Rc::new(RawInner {
                id: ObjectId::new(),
                data: RefCell::new(container),
            }),
        }
    }

    /// An empty record.
    pub fn record() -> Self {
        Self::new(Container::Record(Record::default()))
    }

    pub fn record_from<K, V, I>(fields: I) -> Self
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into().to_raw()))
            .collect();
        Self::new(Container::Record(Record {
            fields,
            proto: None,
        }))
    }

    /// An empty record whose missing reads fall through to `proto`.
    pub fn record_with_prototype(proto: &RawObject) -> Self {
        Self::new(Container::Record(Record {
            fields: IndexMap::new(),
            proto: Some(proto.clone()),
        }))
    }

    pub fn sequence<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::new(Container::Sequence(
            items.into_iter().map(|v| v.into().to_raw()).collect(),
        ))
    }

    pub fn map() -> Self {
        Self::new(Container::Map(IndexMap::new()))
    }

    pub fn map_from<K, V, I>(entries: I) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::new(Container::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into().to_raw(), v.into().to_raw()))
                .collect(),
        ))
    }

    pub fn set() -> Self {
        Self::new(Container::Set(IndexSet::new()))
    }

    pub fn set_from<V, I>(values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::new(Container::Set(
            values.into_iter().map(|v| v.into().to_raw()).collect(),
        ))
    }

    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    pub fn kind(&self) -> ContainerKind {
        self.inner.data.borrow().kind()
    }

    pub fn ptr_eq(&self, other: &RawObject) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn data(&self) -> Ref<'_, Container> {
        self.inner.data.borrow()
    }

    pub(crate) fn data_mut(&self) -> RefMut<'_, Container> {
        self.inner.data.borrow_mut()
    }

    /// Untracked field read with prototype fallback. `None` for absent
    /// fields and for non-record containers.
    pub fn field(&self, key: &str) -> Option<Value> {
        let proto = match &*self.data() {
            Container::Record(record) => match record.fields.get(key) {
                Some(value) => return Some(value.clone()),
                None => record.proto.clone(),
            },
            _ => return None,
        };
        proto.and_then(|proto| proto.field(key))
    }

    /// Untracked field write. Does nothing on non-record containers.
    pub fn set_field(&self, key: &str, value: impl Into<Value>) {
        if let Container::Record(record) = &mut *self.data_mut() {
            record.fields.insert(key.into(), value.into().to_raw());
        }
    }

    /// Number of fields, items or entries.
    pub fn len(&self) -> usize {
        match &*self.data() {
            Container::Record(r) => r.fields.len(),
            Container::Sequence(s) => s.len(),
            Container::Map(m) => m.len(),
            Container::Set(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Untracked copy of a sequence's items. Empty for other containers.
    pub fn items(&self) -> Vec<Value> {
        match &*self.data() {
            Container::Sequence(items) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Untracked own field names of a record. Empty for other containers.
    pub fn keys(&self) -> Vec<Rc<str>> {
        match &*self.data() {
            Container::Record(record) => record.fields.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawObject")
            .field("id", &self.id().raw())
            .field("kind", &self.kind())
            .field("len", &self.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn nan_is_same_value_as_itself() {
        let a = Value::Number(f64::NAN);
        let b = Value::Number(f64::NAN);
        assert!(a.same_value(&b));
        assert!(Value::Number(0.0).same_value(&Value::Number(-0.0)));
        assert!(!Value::Number(1.0).same_value(&Value::Str("1".into())));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = RawObject::record();
        let b = RawObject::record();
        assert_eq!(Value::from(&a), Value::from(&a));
        assert_ne!(Value::from(&a), Value::from(&b));
    }

    #[test]
    fn hashing_agrees_with_equality() {
        let mut set = HashSet::new();
        set.insert(Value::Number(f64::NAN));
        set.insert(Value::Number(f64::NAN));
        set.insert(Value::Number(0.0));
        set.insert(Value::Number(-0.0));
        set.insert(Value::from("a"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn record_reads_fall_through_to_prototype() {
        let proto = RawObject::record_from([("greeting", "hi")]);
        let child = RawObject::record_with_prototype(&proto);
        assert_eq!(child.field("greeting"), Some(Value::from("hi")));

        child.set_field("greeting", "hello");
        assert_eq!(child.field("greeting"), Some(Value::from("hello")));
        assert_eq!(proto.field("greeting"), Some(Value::from("hi")));
    }

    #[test]
    fn json_builds_nested_containers() {
        let value = Value::parse_json(r#"{"user": {"name": "ada"}, "tags": [1, 2]}"#).unwrap();
        let root = value.as_object().unwrap();
        assert_eq!(root.kind(), ContainerKind::Record);

        let user = root.field("user").unwrap();
        assert_eq!(user.as_object().unwrap().field("name"), Some(Value::from("ada")));

        let tags = root.field("tags").unwrap();
        assert_eq!(tags.as_object().unwrap().items(), vec![Value::from(1), Value::from(2)]);
    }

    #[test]
    fn display_formats_integers_without_fraction() {
        assert_eq!(Value::from(3).to_string(), "3");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::Null.to_string(), "");
    }
}
