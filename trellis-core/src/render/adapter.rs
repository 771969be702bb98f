//! Host adapter interface.
//!
//! The renderer never touches a concrete node tree. Every structural change
//! goes through a [`HostAdapter`], so the same diff drives a browser DOM, a
//! terminal buffer or the in-memory tree used in tests.

use super::vnode::HostNode;
use crate::reactive::Value;

/// Operations the renderer needs from the platform that owns the nodes.
pub trait HostAdapter {
    fn create_element(&mut self, tag: &str) -> HostNode;

    fn create_text(&mut self, content: &str) -> HostNode;

    /// Replace the content of a text node.
    fn set_text(&mut self, node: HostNode, content: &str);

    /// Replace all children of an element with `content` as text. An empty
    /// string clears the element.
    fn set_element_text(&mut self, node: HostNode, content: &str);

    /// Insert `node` into `parent` before `anchor`, or append when `anchor`
    /// is `None`. A node that is already attached moves.
    fn insert(&mut self, node: HostNode, parent: HostNode, anchor: Option<HostNode>);

    fn remove(&mut self, parent: HostNode, node: HostNode);

    /// Apply one prop change. `next == None` removes the prop.
    ///
    /// The adapter decides how a prop lands on the node: as an event
    /// binding, a property or an attribute.
    fn patch_prop(&mut self, node: HostNode, key: &str, prev: Option<&Value>, next: Option<&Value>);

    fn next_sibling(&self, node: HostNode) -> Option<HostNode>;

    fn first_child(&self, parent: HostNode) -> Option<HostNode>;
}
