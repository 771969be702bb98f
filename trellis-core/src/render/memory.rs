//! In-memory host tree.
//!
//! [`MemoryHost`] implements [`HostAdapter`] over a plain node table and
//! logs every operation it performs. It is the adapter used by tests and
//! benchmarks, and a reference for how props are meant to land on a node:
//!
//! - `on<Event>` props bind or unbind an event handler.
//! - `class` is normalized from a string, a sequence or a record of flags.
//! - `style` is normalized from a string or a record of declarations.
//! - A small set of live properties (`value`, `checked`, ...) is stored as
//!   properties, except `form` on `input`, which is always an attribute.
//! - Everything else is an attribute. `Null` and `false` remove it.

use std::collections::HashMap;
use std::fmt::Write as _;

use indexmap::IndexMap;

use super::adapter::HostAdapter;
use super::vnode::{is_event_prop, HostNode};
use crate::reactive::{Callback, Container, Value};

/// One logged host operation.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    CreateElement { node: HostNode, tag: String },
    CreateText { node: HostNode, content: String },
    SetText { node: HostNode, content: String },
    SetElementText { node: HostNode, content: String },
    /// `moved` is set when the node was already attached.
    Insert {
        node: HostNode,
        parent: HostNode,
        anchor: Option<HostNode>,
        moved: bool,
    },
    Remove { node: HostNode, parent: HostNode },
    PatchProp { node: HostNode, key: String },
}

const PROPERTIES: &[&str] = &["value", "checked", "disabled", "selected", "muted", "indeterminate"];
const BOOLEAN_PROPERTIES: &[&str] = &["checked", "disabled", "selected", "muted", "indeterminate"];

#[derive(Debug)]
enum MemKind {
    Element(String),
    Text(String),
}

#[derive(Debug)]
struct MemNode {
    kind: MemKind,
    parent: Option<HostNode>,
    children: Vec<HostNode>,
    attrs: IndexMap<String, String>,
    properties: IndexMap<String, Value>,
    handlers: IndexMap<String, Callback>,
}

impl MemNode {
    fn new(kind: MemKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            attrs: IndexMap::new(),
            properties: IndexMap::new(),
            handlers: IndexMap::new(),
        }
    }

    fn tag(&self) -> Option<&str> {
        match &self.kind {
            MemKind::Element(tag) => Some(tag),
            MemKind::Text(_) => None,
        }
    }
}

/// A host tree held in memory.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: HashMap<HostNode, MemNode>,
    next_id: u64,
    log: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, kind: MemKind) -> HostNode {
        self.next_id += 1;
        let node = HostNode::new(self.next_id);
        self.nodes.insert(node, MemNode::new(kind));
        node
    }

    /// A detached container element to render into. Not logged.
    pub fn create_root(&mut self) -> HostNode {
        self.alloc(MemKind::Element("root".to_string()))
    }

    pub fn log(&self) -> &[HostOp] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Inserts of nodes that were already attached.
    pub fn moves(&self) -> usize {
        self.count(|op| matches!(op, HostOp::Insert { moved: true, .. }))
    }

    /// Inserts of freshly created nodes.
    pub fn inserts(&self) -> usize {
        self.count(|op| matches!(op, HostOp::Insert { moved: false, .. }))
    }

    pub fn removes(&self) -> usize {
        self.count(|op| matches!(op, HostOp::Remove { .. }))
    }

    pub fn creates(&self) -> usize {
        self.count(|op| matches!(op, HostOp::CreateElement { .. } | HostOp::CreateText { .. }))
    }

    pub fn prop_patches(&self) -> usize {
        self.count(|op| matches!(op, HostOp::PatchProp { .. }))
    }

    fn count(&self, pred: impl Fn(&HostOp) -> bool) -> usize {
        self.log.iter().filter(|op| pred(op)).count()
    }

    pub fn contains(&self, node: HostNode) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn parent(&self, node: HostNode) -> Option<HostNode> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: HostNode) -> Vec<HostNode> {
        self.nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn tag(&self, node: HostNode) -> Option<&str> {
        self.nodes.get(&node).and_then(MemNode::tag)
    }

    pub fn attribute(&self, node: HostNode, key: &str) -> Option<&str> {
        self.nodes
            .get(&node)
            .and_then(|n| n.attrs.get(key))
            .map(String::as_str)
    }

    pub fn property(&self, node: HostNode, key: &str) -> Option<&Value> {
        self.nodes.get(&node).and_then(|n| n.properties.get(key))
    }

    /// Handler bound for `event` (`"click"`, not `"onClick"`).
    pub fn handler(&self, node: HostNode, event: &str) -> Option<Callback> {
        self.nodes
            .get(&node)
            .and_then(|n| n.handlers.get(event))
            .cloned()
    }

    /// Concatenated text of `node` and its descendants.
    pub fn text_content(&self, node: HostNode) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: HostNode, out: &mut String) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        match &n.kind {
            MemKind::Text(content) => out.push_str(content),
            MemKind::Element(_) => {
                for child in &n.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Serialize the children of `node` as markup. Properties and handlers
    /// are not part of the markup.
    pub fn inner_markup(&self, node: HostNode) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_markup(child, &mut out);
        }
        out
    }

    pub fn markup(&self, node: HostNode) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    fn write_markup(&self, node: HostNode, out: &mut String) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        match &n.kind {
            MemKind::Text(content) => out.push_str(&escape(content)),
            MemKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (key, value) in &n.attrs {
                    if value.is_empty() {
                        let _ = write!(out, " {key}");
                    } else {
                        let _ = write!(out, " {key}=\"{}\"", escape(value));
                    }
                }
                out.push('>');
                for child in &n.children {
                    self.write_markup(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn detach(&mut self, node: HostNode) -> bool {
        let Some(parent) = self.nodes.get_mut(&node).and_then(|n| n.parent.take()) else {
            return false;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|child| *child != node);
        }
        true
    }

    fn drop_subtree(&mut self, node: HostNode) {
        if let Some(n) = self.nodes.remove(&node) {
            for child in n.children {
                self.drop_subtree(child);
            }
        }
    }

    fn patch_event(&mut self, node: HostNode, key: &str, next: Option<&Value>) {
        let event = key[2..].to_lowercase();
        let Some(n) = self.nodes.get_mut(&node) else {
            return;
        };
        match next.and_then(Value::as_callback) {
            Some(handler) => {
                n.handlers.insert(event, handler.clone());
            }
            None => {
                n.handlers.shift_remove(&event);
            }
        }
    }

    fn patch_attribute(&mut self, node: HostNode, key: &str, value: Option<String>) {
        let Some(n) = self.nodes.get_mut(&node) else {
            return;
        };
        match value {
            Some(value) => {
                n.attrs.insert(key.to_string(), value);
            }
            None => {
                n.attrs.shift_remove(key);
            }
        }
    }

    /// Dispatch `event` on `node`. Returns whether a handler ran.
    ///
    /// The handler runs while `self` is borrowed; handlers that render
    /// synchronously should be dispatched through
    /// [`Renderer::dispatch`](super::Renderer::dispatch) instead.
    pub fn dispatch(&self, node: HostNode, event: &str, args: &[Value]) -> bool {
        match self.handler(node, event) {
            Some(handler) => {
                handler.call(args);
                true
            }
            None => false,
        }
    }
}

fn should_set_as_property(tag: Option<&str>, key: &str) -> bool {
    if key == "form" && tag == Some("input") {
        return false;
    }
    PROPERTIES.contains(&key)
}

fn normalize_class(value: &Value) -> Option<String> {
    let class = match value {
        Value::Null | Value::Bool(false) => return None,
        Value::Str(s) => s.to_string(),
        other => match other.as_object() {
            Some(raw) => match &*raw.data() {
                Container::Sequence(items) => items
                    .iter()
                    .filter_map(normalize_class)
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
                    .join(" "),
                Container::Record(record) => record
                    .fields
                    .iter()
                    .filter(|(_, on)| on.truthy())
                    .map(|(name, _)| name.to_string())
                    .collect::<Vec<_>>()
                    .join(" "),
                _ => String::new(),
            },
            None => other.to_string(),
        },
    };
    Some(class)
}

fn normalize_style(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        other => match other.as_object() {
            Some(raw) => match &*raw.data() {
                Container::Record(record) => Some(
                    record
                        .fields
                        .iter()
                        .filter(|(_, v)| !v.is_null())
                        .map(|(name, v)| format!("{name}: {v}"))
                        .collect::<Vec<_>>()
                        .join("; "),
                ),
                _ => None,
            },
            None => Some(other.to_string()),
        },
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl HostAdapter for MemoryHost {
    fn create_element(&mut self, tag: &str) -> HostNode {
        let node = self.alloc(MemKind::Element(tag.to_string()));
        self.log.push(HostOp::CreateElement {
            node,
            tag: tag.to_string(),
        });
        node
    }

    fn create_text(&mut self, content: &str) -> HostNode {
        let node = self.alloc(MemKind::Text(content.to_string()));
        self.log.push(HostOp::CreateText {
            node,
            content: content.to_string(),
        });
        node
    }

    fn set_text(&mut self, node: HostNode, content: &str) {
        if let Some(MemNode {
            kind: MemKind::Text(text),
            ..
        }) = self.nodes.get_mut(&node)
        {
            *text = content.to_string();
        }
        self.log.push(HostOp::SetText {
            node,
            content: content.to_string(),
        });
    }

    fn set_element_text(&mut self, node: HostNode, content: &str) {
        let old = self
            .nodes
            .get_mut(&node)
            .map(|n| std::mem::take(&mut n.children))
            .unwrap_or_default();
        for child in old {
            self.drop_subtree(child);
        }
        if !content.is_empty() {
            let text = self.alloc(MemKind::Text(content.to_string()));
            if let Some(t) = self.nodes.get_mut(&text) {
                t.parent = Some(node);
            }
            if let Some(n) = self.nodes.get_mut(&node) {
                n.children.push(text);
            }
        }
        self.log.push(HostOp::SetElementText {
            node,
            content: content.to_string(),
        });
    }

    fn insert(&mut self, node: HostNode, parent: HostNode, anchor: Option<HostNode>) {
        let moved = self.detach(node);
        if let Some(n) = self.nodes.get_mut(&node) {
            n.parent = Some(parent);
        }
        if let Some(p) = self.nodes.get_mut(&parent) {
            let at = anchor
                .and_then(|a| p.children.iter().position(|child| *child == a))
                .unwrap_or(p.children.len());
            p.children.insert(at, node);
        }
        self.log.push(HostOp::Insert {
            node,
            parent,
            anchor,
            moved,
        });
    }

    fn remove(&mut self, parent: HostNode, node: HostNode) {
        self.detach(node);
        self.drop_subtree(node);
        self.log.push(HostOp::Remove { node, parent });
    }

    fn patch_prop(&mut self, node: HostNode, key: &str, _prev: Option<&Value>, next: Option<&Value>) {
        let tag = self.tag(node).map(str::to_string);
        if is_event_prop(key) {
            self.patch_event(node, key, next);
        } else if key == "class" {
            self.patch_attribute(node, key, next.and_then(normalize_class));
        } else if key == "style" {
            self.patch_attribute(node, key, next.and_then(normalize_style));
        } else if should_set_as_property(tag.as_deref(), key) {
            let value = match next {
                // An empty string switches a boolean property on.
                Some(Value::Str(s)) if s.is_empty() && BOOLEAN_PROPERTIES.contains(&key) => {
                    Value::Bool(true)
                }
                Some(value) => value.clone(),
                None => Value::Null,
            };
            if let Some(n) = self.nodes.get_mut(&node) {
                n.properties.insert(key.to_string(), value);
            }
        } else {
            let value = match next {
                None | Some(Value::Null) | Some(Value::Bool(false)) => None,
                Some(Value::Bool(true)) => Some(String::new()),
                Some(value) => Some(value.to_string()),
            };
            self.patch_attribute(node, key, value);
        }
        self.log.push(HostOp::PatchProp {
            node,
            key: key.to_string(),
        });
    }

    fn next_sibling(&self, node: HostNode) -> Option<HostNode> {
        let parent = self.nodes.get(&node)?.parent?;
        let siblings = &self.nodes.get(&parent)?.children;
        let at = siblings.iter().position(|child| *child == node)?;
        siblings.get(at + 1).copied()
    }

    fn first_child(&self, parent: HostNode) -> Option<HostNode> {
        self.nodes.get(&parent)?.children.first().copied()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{record, seq};
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn insert_before_anchor_and_move() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let a = host.create_element("a");
        let b = host.create_element("b");
        host.insert(a, root, None);
        host.insert(b, root, Some(a));
        assert_eq!(host.children(root), vec![b, a]);
        assert_eq!(host.moves(), 0);

        host.insert(b, root, None);
        assert_eq!(host.children(root), vec![a, b]);
        assert_eq!(host.moves(), 1);
        assert_eq!(host.next_sibling(a), Some(b));
        assert_eq!(host.next_sibling(b), None);
    }

    #[test]
    fn attributes_and_class_normalization() {
        let mut host = MemoryHost::new();
        let div = host.create_element("div");

        host.patch_prop(div, "id", None, Some(&Value::from("main")));
        host.patch_prop(div, "class", None, Some(&Value::from(seq!["a", "b"])));
        host.patch_prop(div, "hidden", None, Some(&Value::from(true)));
        assert_eq!(host.markup(div), "<div id=\"main\" class=\"a b\" hidden></div>");

        let flags = record! { "on" => true, "off" => false };
        host.patch_prop(div, "class", None, Some(&Value::from(flags)));
        host.patch_prop(div, "hidden", None, Some(&Value::from(false)));
        host.patch_prop(div, "id", None, None);
        assert_eq!(host.markup(div), "<div class=\"on\"></div>");
    }

    #[test]
    fn properties_are_kept_off_the_markup() {
        let mut host = MemoryHost::new();
        let input = host.create_element("input");

        host.patch_prop(input, "disabled", None, Some(&Value::from("")));
        host.patch_prop(input, "form", None, Some(&Value::from("f1")));
        assert_eq!(host.property(input, "disabled"), Some(&Value::Bool(true)));
        assert_eq!(host.attribute(input, "form"), Some("f1"));
    }

    #[test]
    fn events_bind_and_unbind() {
        let mut host = MemoryHost::new();
        let button = host.create_element("button");
        let clicks = Rc::new(Cell::new(0));
        let c = clicks.clone();
        let handler = Value::from(Callback::handler(move |_| c.set(c.get() + 1)));

        host.patch_prop(button, "onClick", None, Some(&handler));
        assert!(host.dispatch(button, "click", &[]));
        assert_eq!(clicks.get(), 1);

        host.patch_prop(button, "onClick", Some(&handler), None);
        assert!(!host.dispatch(button, "click", &[]));
        assert_eq!(clicks.get(), 1);
    }

    #[test]
    fn element_text_replaces_children() {
        let mut host = MemoryHost::new();
        let p = host.create_element("p");
        let span = host.create_element("span");
        host.insert(span, p, None);

        host.set_element_text(p, "a < b");
        assert_eq!(host.markup(p), "<p>a &lt; b</p>");
        assert!(!host.contains(span));

        host.set_element_text(p, "");
        assert_eq!(host.markup(p), "<p></p>");
    }
}
