//! Assignment cycle span helpers.
//!
//! Provides span creation and result recording for one engine tick.

use tracing::Span;

/// Start a span for one reload-and-assign tick.
///
/// The result fields are declared empty and filled in via
/// [`record_cycle_result`].
pub fn start_cycle_span() -> Span {
    tracing::info_span!(
        "autoassign.cycle",
        "cycle.conversations" = tracing::field::Empty,
        "cycle.assigned" = tracing::field::Empty,
    )
}

/// Record how many conversations a cycle saw and assigned.
pub fn record_cycle_result(span: &Span, conversations: usize, assigned: usize) {
    span.record("cycle.conversations", conversations as u64);
    span.record("cycle.assigned", assigned as u64);
}
