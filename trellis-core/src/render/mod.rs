//! Rendering
//!
//! Virtual node trees, the host adapter interface, the reconciler that keeps
//! host nodes in sync with the latest tree, and component instances.
//!
//! # Pipeline
//!
//! ```text
//!   render fn ──▶ VNode tree ──▶ Renderer::patch ──▶ HostAdapter ops
//!        ▲                             │
//!        └──── component effect ◀──────┘  (re-render on state change)
//! ```
//!
//! The renderer is generic over the adapter. [`MemoryHost`] is the
//! in-memory implementation used by the tests.

mod adapter;
mod component;
mod json;
mod keyed;
mod memory;
mod renderer;
mod vnode;

pub use adapter::HostAdapter;
pub use component::{
    define_component, functional, ComponentBuilder, ComponentDef, ComponentInstance, Emitter,
    Hook, LifecycleHook, RenderContext, RenderFn, SetupContext, SetupFn, SetupResult,
};
pub use memory::{HostOp, MemoryHost};
pub use renderer::Renderer;
pub use vnode::{Children, HostNode, Key, NodeKind, Props, VNode};

pub(crate) use component::InstanceHooks;
