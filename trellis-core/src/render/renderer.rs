//! Renderer
//!
//! The renderer turns virtual trees into host nodes and keeps them in sync.
//! [`Renderer::render`] diffs the new tree for a container against the one
//! rendered into it last time and applies the minimal set of host
//! operations through the [`HostAdapter`].
//!
//! # Diffing Rules
//!
//! - Nodes of different type are never patched into each other: the old node
//!   is unmounted and the new one mounted in its place.
//! - Elements keep their host node. Props are diffed key by key, then the
//!   children.
//! - Children transitions between empty, text and node lists are handled
//!   case by case. Two node lists go through the keyed diff in `keyed.rs`.
//! - Fragments have no host node. Their children live directly in the
//!   parent, so positions are derived from the first and last host node
//!   they contain.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::adapter::HostAdapter;
use super::component::ComponentInstance;
use super::memory::MemoryHost;
use super::vnode::{Children, HostNode, NodeKind, VNode};
use crate::reactive::{Runtime, Value};

type PostCallback = Box<dyn FnOnce()>;

pub(crate) struct RendererInner<A> {
    runtime: Runtime,
    host: RefCell<A>,
    /// Last tree rendered into each container.
    roots: RefCell<HashMap<HostNode, VNode>>,
    /// Callbacks run once the outermost render or job finishes.
    post: RefCell<VecDeque<PostCallback>>,
    depth: Cell<usize>,
}

/// Renders virtual trees into a host.
///
/// Cloning a `Renderer` clones the handle.
pub struct Renderer<A: HostAdapter + 'static> {
    pub(crate) inner: Rc<RendererInner<A>>,
}

impl<A: HostAdapter + 'static> Clone for Renderer<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Tracks render nesting; drops pending post callbacks when unwinding.
struct DepthGuard<'a, A> {
    inner: &'a RendererInner<A>,
}

impl<'a, A> DepthGuard<'a, A> {
    fn enter(inner: &'a RendererInner<A>) -> Self {
        inner.depth.set(inner.depth.get() + 1);
        Self { inner }
    }
}

impl<A> Drop for DepthGuard<'_, A> {
    fn drop(&mut self) {
        let depth = self.inner.depth.get() - 1;
        self.inner.depth.set(depth);
        if depth == 0 && std::thread::panicking() {
            if let Ok(mut post) = self.inner.post.try_borrow_mut() {
                post.clear();
            }
        }
    }
}

impl<A: HostAdapter + 'static> Renderer<A> {
    pub fn new(runtime: &Runtime, host: A) -> Self {
        Self {
            inner: Rc::new(RendererInner {
                runtime: runtime.clone(),
                host: RefCell::new(host),
                roots: RefCell::new(HashMap::new()),
                post: RefCell::new(VecDeque::new()),
                depth: Cell::new(0),
            }),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// The host adapter. Do not hold the borrow across a render.
    pub fn host(&self) -> Ref<'_, A> {
        self.inner.host.borrow()
    }

    pub fn host_mut(&self) -> RefMut<'_, A> {
        self.inner.host.borrow_mut()
    }

    /// Render `vnode` into `container`, diffing against the previous render.
    /// `None` unmounts whatever was rendered there.
    pub fn render(&self, vnode: Option<VNode>, container: HostNode) {
        self.batch(|| {
            let old = self.inner.roots.borrow_mut().remove(&container);
            match vnode {
                Some(vnode) => {
                    self.patch(old.as_ref(), &vnode, container, None);
                    self.inner.roots.borrow_mut().insert(container, vnode);
                }
                None => {
                    if let Some(old) = old {
                        self.unmount(&old, container);
                    }
                }
            }
        });
    }

    /// Whether something is rendered into `container`.
    pub fn is_mounted(&self, container: HostNode) -> bool {
        self.inner.roots.borrow().contains_key(&container)
    }

    /// Instance of the component rendered as the root of `container`.
    pub fn root_instance(&self, container: HostNode) -> Option<Rc<ComponentInstance>> {
        self.inner
            .roots
            .borrow()
            .get(&container)
            .and_then(VNode::instance)
    }

    // ------------------------------------------------------------------
    // Post callbacks
    // ------------------------------------------------------------------

    /// Run `f`, then the post callbacks queued during it if this is the
    /// outermost call.
    pub(crate) fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        let result = {
            let _depth = DepthGuard::enter(&self.inner);
            f()
        };
        if self.inner.depth.get() == 0 {
            self.flush_post();
        }
        result
    }

    pub(crate) fn queue_post(&self, callback: PostCallback) {
        self.inner.post.borrow_mut().push_back(callback);
    }

    fn flush_post(&self) {
        loop {
            let next = self.inner.post.borrow_mut().pop_front();
            let Some(callback) = next else {
                break;
            };
            self.inner.runtime.untracked(callback);
        }
    }

    // ------------------------------------------------------------------
    // Patch
    // ------------------------------------------------------------------

    /// Bring the host in line with `new`. `old` is the node previously
    /// rendered at this position; `anchor` is where a fresh mount goes.
    pub(crate) fn patch(&self, old: Option<&VNode>, new: &VNode, container: HostNode, anchor: Option<HostNode>) {
        let old = match old {
            Some(old) if !old.same_type(new) => {
                let anchor = match last_host(old) {
                    Some(last) => self.host().next_sibling(last),
                    None => anchor,
                };
                self.unmount(old, container);
                self.mount(new, container, anchor);
                return;
            }
            other => other,
        };
        let Some(old) = old else {
            self.mount(new, container, anchor);
            return;
        };

        match &new.kind {
            NodeKind::Element(_) => self.patch_element(old, new),
            NodeKind::Text(content) => {
                let el = old.el.get();
                new.el.set(el);
                if let (Some(el), NodeKind::Text(previous)) = (el, &old.kind) {
                    if previous != content {
                        self.host_mut().set_text(el, content);
                    }
                }
            }
            NodeKind::Fragment => {
                let tail = match last_host(old) {
                    Some(last) => self.host().next_sibling(last),
                    None => anchor,
                };
                self.patch_children(old, new, container, tail);
            }
            NodeKind::Component(_) => self.patch_component(old, new, container, anchor),
        }
    }

    pub(crate) fn mount(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) {
        match &vnode.kind {
            NodeKind::Element(tag) => self.mount_element(vnode, tag, container, anchor),
            NodeKind::Text(content) => {
                let el = self.host_mut().create_text(content);
                vnode.el.set(Some(el));
                self.host_mut().insert(el, container, anchor);
            }
            NodeKind::Fragment => {
                for child in vnode.children.nodes() {
                    self.mount(child, container, anchor);
                }
            }
            NodeKind::Component(def) => self.mount_component(vnode, def, container, anchor),
        }
    }

    fn mount_element(&self, vnode: &VNode, tag: &str, container: HostNode, anchor: Option<HostNode>) {
        let el = self.host_mut().create_element(tag);
        vnode.el.set(Some(el));
        for (key, value) in &vnode.props {
            self.host_mut().patch_prop(el, key, None, Some(value));
        }
        match &vnode.children {
            Children::Empty => {}
            Children::Text(text) => self.host_mut().set_element_text(el, text),
            Children::Nodes(children) => {
                for child in children {
                    self.mount(child, el, None);
                }
            }
        }
        self.host_mut().insert(el, container, anchor);
        trace!(tag, el = el.raw(), "mount element");
    }

    fn patch_element(&self, old: &VNode, new: &VNode) {
        let Some(el) = old.el.get() else {
            return;
        };
        new.el.set(Some(el));

        for (key, next) in &new.props {
            let previous = old.props.get(key);
            if previous.map_or(true, |previous| !previous.same_value(next)) {
                self.host_mut().patch_prop(el, key, previous, Some(next));
            }
        }
        for (key, previous) in &old.props {
            if !new.props.contains_key(key) {
                self.host_mut().patch_prop(el, key, Some(previous), None);
            }
        }

        self.patch_children(old, new, el, None);
    }

    /// Diff the children of `old` and `new` inside `container`. `anchor` is
    /// where appended children go; it only matters for fragments.
    fn patch_children(&self, old: &VNode, new: &VNode, container: HostNode, anchor: Option<HostNode>) {
        // A fragment shares its container with siblings, so it never sets
        // the container's text.
        let owns_container = !matches!(new.kind, NodeKind::Fragment);

        match (&old.children, &new.children) {
            (Children::Nodes(old_children), Children::Nodes(new_children)) => {
                self.patch_keyed_children(old_children, new_children, container, anchor);
            }
            (old_children, Children::Text(text)) => {
                match old_children {
                    Children::Text(previous) if previous == text => return,
                    Children::Nodes(nodes) => {
                        for node in nodes {
                            self.unmount(node, container);
                        }
                    }
                    _ => {}
                }
                if owns_container {
                    self.host_mut().set_element_text(container, text);
                }
            }
            (old_children, Children::Nodes(new_children)) => {
                if matches!(old_children, Children::Text(_)) && owns_container {
                    self.host_mut().set_element_text(container, "");
                }
                for child in new_children {
                    self.mount(child, container, anchor);
                }
            }
            (Children::Nodes(nodes), Children::Empty) => {
                for node in nodes {
                    self.unmount(node, container);
                }
            }
            (Children::Text(_), Children::Empty) => {
                if owns_container {
                    self.host_mut().set_element_text(container, "");
                }
            }
            (Children::Empty, Children::Empty) => {}
        }
    }

    // ------------------------------------------------------------------
    // Unmount and move
    // ------------------------------------------------------------------

    pub(crate) fn unmount(&self, vnode: &VNode, container: HostNode) {
        self.unmount_inner(vnode, container, true);
    }

    /// Tear down `vnode`. Components below it are always unmounted; host
    /// nodes are only detached when `detach` is set, since removing an
    /// element removes its descendants with it.
    pub(crate) fn unmount_inner(&self, vnode: &VNode, container: HostNode, detach: bool) {
        match &vnode.kind {
            NodeKind::Element(_) => {
                let Some(el) = vnode.el.get() else {
                    return;
                };
                for child in vnode.children.nodes() {
                    self.unmount_inner(child, el, false);
                }
                if detach {
                    self.host_mut().remove(container, el);
                }
            }
            NodeKind::Text(_) => {
                if let (true, Some(el)) = (detach, vnode.el.get()) {
                    self.host_mut().remove(container, el);
                }
            }
            NodeKind::Fragment => {
                for child in vnode.children.nodes() {
                    self.unmount_inner(child, container, detach);
                }
            }
            NodeKind::Component(_) => {
                let instance = vnode.component.borrow_mut().take();
                if let Some(instance) = instance {
                    self.unmount_component(&instance, container, detach);
                }
            }
        }
    }

    /// Move the host nodes of `vnode` before `anchor`.
    pub(crate) fn move_vnode(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) {
        match &vnode.kind {
            NodeKind::Element(_) | NodeKind::Text(_) => {
                if let Some(el) = vnode.el.get() {
                    self.host_mut().insert(el, container, anchor);
                }
            }
            NodeKind::Fragment => {
                for child in vnode.children.nodes() {
                    self.move_vnode(child, container, anchor);
                }
            }
            NodeKind::Component(_) => {
                let instance = vnode.component.borrow().clone();
                if let Some(instance) = instance {
                    let subtree = instance.subtree.borrow();
                    if let Some(subtree) = subtree.as_ref() {
                        self.move_vnode(subtree, container, anchor);
                    }
                }
            }
        }
    }
}

impl Renderer<MemoryHost> {
    /// Dispatch `event` on `node`, calling its handler outside the host
    /// borrow so the handler may render.
    pub fn dispatch(&self, node: HostNode, event: &str, args: &[Value]) -> bool {
        let handler = self.host().handler(node, event);
        match handler {
            Some(handler) => {
                handler.call(args);
                true
            }
            None => false,
        }
    }
}

impl<A: HostAdapter + 'static> fmt::Debug for Renderer<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("runtime", &self.inner.runtime)
            .field("containers", &self.inner.roots.borrow().len())
            .finish()
    }
}

/// First host node in document order under `vnode`.
pub(crate) fn first_host(vnode: &VNode) -> Option<HostNode> {
    match &vnode.kind {
        NodeKind::Element(_) | NodeKind::Text(_) => vnode.el.get(),
        NodeKind::Fragment => vnode.children.nodes().iter().find_map(first_host),
        NodeKind::Component(_) => {
            let instance = vnode.component.borrow().clone();
            instance.and_then(|instance| instance.el())
        }
    }
}

/// Last host node in document order under `vnode`.
pub(crate) fn last_host(vnode: &VNode) -> Option<HostNode> {
    match &vnode.kind {
        NodeKind::Element(_) | NodeKind::Text(_) => vnode.el.get(),
        NodeKind::Fragment => vnode.children.nodes().iter().rev().find_map(last_host),
        NodeKind::Component(_) => {
            let instance = vnode.component.borrow().clone();
            instance.and_then(|instance| {
                let subtree = instance.subtree.borrow();
                subtree.as_ref().and_then(last_host)
            })
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
