//! Structured logging helpers.
//!
//! The registry doesn't own a subscriber (that's the embedding
//! application's job); it only emits spans and events at dispatch-failure
//! and snapshot-conflict points, in the idiom of `tracing` used throughout
//! this corpus rather than ad hoc `eprintln!`.

use tracing::{Level, Span, span};

/// A span scoping one broadcast dispatch, so dispatch failures and
/// snapshot warnings logged underneath it carry the task kind and origin
/// without repeating them at every log site.
pub fn dispatch_span(task_kind: &'static str, service: &str) -> Span {
    span!(Level::DEBUG, "occupant_registry.dispatch", task_kind, service)
}
