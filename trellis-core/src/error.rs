//! Error and warning types.
//!
//! Trellis separates two failure channels:
//!
//! - [`Warning`]: invariant violations that the runtime reports and then
//!   ignores (writing through a readonly wrapper, mutating a prop from inside
//!   a component, reading an unknown binding). Rendering never stops because
//!   of a warning; the offending operation simply has no effect.
//!
//! - [`Error`]: failures of the fallible entry points, currently limited to
//!   loading data and node descriptions from JSON.
//!
//! Panics raised by user code (render functions, effect bodies, jobs) are not
//! caught and propagate to whoever triggered them.

use thiserror::Error;

/// A reported, non-fatal invariant violation.
///
/// Warnings are logged through `tracing` and forwarded to the handler
/// configured in [`RuntimeOptions`](crate::reactive::RuntimeOptions).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    /// A write was issued through a readonly wrapper.
    #[error("set operation on key \"{key}\" failed: target is readonly")]
    ReadonlyWrite { key: String },

    /// A delete was issued through a readonly wrapper.
    #[error("delete operation on key \"{key}\" failed: target is readonly")]
    ReadonlyDelete { key: String },

    /// A component tried to assign one of its own props.
    #[error("attempting to mutate prop \"{key}\"; props are readonly")]
    PropMutation { key: String },

    /// A render context was asked for a name that is neither state, a prop,
    /// nor a setup binding.
    #[error("property \"{key}\" is not defined on the component instance")]
    UnknownBinding { key: String },

    /// An operation was applied to the wrong kind of container.
    #[error("`{operation}` is not supported on a {kind} container")]
    ContainerMismatch {
        operation: &'static str,
        kind: &'static str,
    },

    /// A lifecycle registration function ran outside of `setup`.
    #[error("`{hook}` can only be called while a component is being set up")]
    HookOutsideSetup { hook: &'static str },

    /// `setup` returned a render function although one was declared.
    #[error("setup of \"{component}\" returned a render function; the declared render is ignored")]
    RenderOverride { component: String },

    /// A component has neither a declared render function nor a setup that
    /// returned one. It renders nothing.
    #[error("component \"{component}\" is missing a render function")]
    MissingRender { component: String },

    /// `emit` found no handler for the event.
    #[error("no handler bound for emitted event \"{event}\"")]
    MissingEventHandler { event: String },

    /// Two siblings in one keyed list share a key.
    #[error("duplicate key {key} among siblings; keyed reconciliation order is undefined")]
    DuplicateKey { key: String },
}

/// Errors returned by the fallible loading entry points.
#[derive(Debug, Error)]
pub enum Error {
    /// The input was not valid JSON or did not match the expected shape.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The JSON was well-formed but describes an impossible node.
    #[error("invalid node description: {0}")]
    InvalidNode(String),
}

/// Result alias for the fallible entry points.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_render_their_context() {
        let warning = Warning::ReadonlyWrite { key: "count".into() };
        assert_eq!(
            warning.to_string(),
            "set operation on key \"count\" failed: target is readonly"
        );

        let warning = Warning::ContainerMismatch {
            operation: "push",
            kind: "record",
        };
        assert_eq!(warning.to_string(), "`push` is not supported on a record container");
    }

    #[test]
    fn json_errors_convert() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.to_string().starts_with("malformed JSON"));
    }
}
