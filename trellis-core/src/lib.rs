//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis reactive UI framework.
//! It implements:
//!
//! - Reactive primitives (wrapped containers, effects, computed values, watchers)
//! - A batching job queue flushed at a microtask boundary
//! - Virtual nodes and a keyed reconciler driving a pluggable host adapter
//! - Component instances with props, state, setup and lifecycle hooks
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Dependency tracking, wrappers, effects and computed values
//! - `scheduler`: Deduplicating job queue and the microtask queue
//! - `render`: Virtual nodes, the reconciler and component instances
//! - `error`: Warnings and errors
//!
//! Everything is single-threaded and owned by a [`Runtime`]. Nothing is
//! process-global.
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::{record, Runtime};
//!
//! let rt = Runtime::new();
//! let state = rt.reactive(&record! { "count" => 0 });
//!
//! // Create a derived value
//! let s = state.clone();
//! let doubled = rt.computed(move || s.get("count").as_number().unwrap_or(0.0) * 2.0);
//!
//! // Create an effect
//! let d = doubled.clone();
//! let _effect = rt.effect(move || println!("doubled: {}", d.value()));
//!
//! // Update the state
//! state.set("count", 5);
//! // Effect automatically runs, prints: "doubled: 10"
//! ```

#[macro_use]
mod macros;

pub mod error;
pub mod reactive;
pub mod render;
pub mod scheduler;

pub use error::{Error, Result, Warning};
pub use reactive::{Computed, Effect, Reactive, Runtime, RuntimeOptions, Value};
pub use render::{define_component, HostAdapter, MemoryHost, Renderer, VNode};
