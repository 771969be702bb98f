//! Virtual Nodes
//!
//! A [`VNode`] describes one node of the tree a render function produces:
//! an element, a text node, a fragment grouping siblings without a node of
//! its own, or a component. After the renderer mounts a node it records the
//! host node it created (`el`) and, for components, the instance.
//!
//! Nodes are built with a small builder API:
//!
//! ```rust,ignore
//! let list = VNode::element("ul").children(
//!     items.iter().map(|item| VNode::element("li").key(item.id).text_child(&item.label)),
//! );
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::component::{ComponentDef, ComponentInstance};
use crate::reactive::{Callback, Value};

/// Identifier of a node owned by a [`HostAdapter`](super::HostAdapter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostNode(u64);

impl HostNode {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for HostNode {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Attributes, properties and event bindings of a node.
pub type Props = IndexMap<Rc<str>, Value>;

/// Sibling identity used by keyed reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    Int(i64),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => write!(f, "\"{s}\""),
            Key::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Key::Str(key.into())
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Key::Str(key.into())
    }
}

impl From<Rc<str>> for Key {
    fn from(key: Rc<str>) -> Self {
        Key::Str(key)
    }
}

impl From<i64> for Key {
    fn from(key: i64) -> Self {
        Key::Int(key)
    }
}

impl From<i32> for Key {
    fn from(key: i32) -> Self {
        Key::Int(key.into())
    }
}

impl From<u32> for Key {
    fn from(key: u32) -> Self {
        Key::Int(key.into())
    }
}

impl From<usize> for Key {
    fn from(key: usize) -> Self {
        Key::Int(key as i64)
    }
}

/// What a node is.
#[derive(Clone)]
pub enum NodeKind {
    Element(Rc<str>),
    Text(Rc<str>),
    /// Children mounted directly into the parent.
    Fragment,
    Component(Rc<ComponentDef>),
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Element(tag) => write!(f, "Element({tag})"),
            NodeKind::Text(content) => write!(f, "Text({content:?})"),
            NodeKind::Fragment => f.write_str("Fragment"),
            NodeKind::Component(def) => write!(f, "Component({})", def.name()),
        }
    }
}

/// Children of a node.
#[derive(Debug, Clone, Default)]
pub enum Children {
    #[default]
    Empty,
    /// Text content set directly on the element.
    Text(Rc<str>),
    Nodes(Vec<VNode>),
}

impl Children {
    pub fn is_empty(&self) -> bool {
        match self {
            Children::Empty => true,
            Children::Text(_) => false,
            Children::Nodes(nodes) => nodes.is_empty(),
        }
    }

    pub fn nodes(&self) -> &[VNode] {
        match self {
            Children::Nodes(nodes) => nodes,
            _ => &[],
        }
    }
}

/// A virtual node.
pub struct VNode {
    pub(crate) kind: NodeKind,
    pub(crate) key: Option<Key>,
    pub(crate) props: Props,
    pub(crate) children: Children,
    /// Host node created on mount.
    pub(crate) el: Cell<Option<HostNode>>,
    pub(crate) component: RefCell<Option<Rc<ComponentInstance>>>,
}

impl VNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            key: None,
            props: Props::new(),
            children: Children::Empty,
            el: Cell::new(None),
            component: RefCell::new(None),
        }
    }

    pub fn element(tag: impl Into<Rc<str>>) -> Self {
        Self::new(NodeKind::Element(tag.into()))
    }

    pub fn text(content: impl Into<Rc<str>>) -> Self {
        Self::new(NodeKind::Text(content.into()))
    }

    pub fn fragment(children: impl IntoIterator<Item = VNode>) -> Self {
        Self::new(NodeKind::Fragment).children(children)
    }

    pub fn component(def: &Rc<ComponentDef>) -> Self {
        Self::new(NodeKind::Component(Rc::clone(def)))
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn prop(mut self, name: impl Into<Rc<str>>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    /// Bind `handler` to `event`, stored as the `on<Event>` prop.
    pub fn on<F>(self, event: &str, handler: F) -> Self
    where
        F: Fn(&[Value]) + 'static,
    {
        let name = event_prop_name(event);
        self.prop(name, Callback::handler(handler))
    }

    pub fn child(mut self, child: VNode) -> Self {
        match &mut self.children {
            Children::Nodes(nodes) => nodes.push(child),
            _ => self.children = Children::Nodes(vec![child]),
        }
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = VNode>) -> Self {
        self.children = Children::Nodes(children.into_iter().collect());
        self
    }

    /// Text content. On a fragment this becomes a single text child.
    pub fn text_child(mut self, content: impl Into<Rc<str>>) -> Self {
        self.children = match self.kind {
            NodeKind::Fragment => Children::Nodes(vec![VNode::text(content)]),
            _ => Children::Text(content.into()),
        };
        self
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn get_key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn get_children(&self) -> &Children {
        &self.children
    }

    /// Host node created for this node, once mounted. Fragments and
    /// components have none of their own.
    pub fn el(&self) -> Option<HostNode> {
        self.el.get()
    }

    /// The component instance, once a component node is mounted.
    pub fn instance(&self) -> Option<Rc<ComponentInstance>> {
        self.component.borrow().clone()
    }

    /// Whether a diff may patch `self` into `other` in place.
    pub fn same_type(&self, other: &VNode) -> bool {
        match (&self.kind, &other.kind) {
            (NodeKind::Element(a), NodeKind::Element(b)) => a == b,
            (NodeKind::Text(_), NodeKind::Text(_)) => true,
            (NodeKind::Fragment, NodeKind::Fragment) => true,
            (NodeKind::Component(a), NodeKind::Component(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// `"click"` to `"onClick"`.
pub(crate) fn event_prop_name(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
        None => "on".to_string(),
    }
}

/// Whether a prop name is an event binding: `on` followed by anything but
/// a lowercase letter.
pub(crate) fn is_event_prop(name: &str) -> bool {
    name.strip_prefix("on")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| !c.is_ascii_lowercase())
}

/// Clones describe the same node but are unmounted.
impl Clone for VNode {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            key: self.key.clone(),
            props: self.props.clone(),
            children: self.children.clone(),
            el: Cell::new(None),
            component: RefCell::new(None),
        }
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("VNode");
        s.field("kind", &self.kind);
        if let Some(key) = &self.key {
            s.field("key", key);
        }
        if !self.props.is_empty() {
            s.field("props", &self.props);
        }
        if !self.children.is_empty() {
            s.field("children", &self.children);
        }
        s.field("el", &self.el.get()).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
