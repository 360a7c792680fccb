//! Metric instrument factories for helpdesk-autoassign.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"helpdesk-autoassign"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("helpdesk-autoassign")
}

/// Counter: conversations assigned to a user by the engine.
/// Labels: `team_id`.
pub fn conversations_assigned() -> Counter<u64> {
    meter()
        .u64_counter("autoassign.conversations.assigned")
        .with_description("Number of conversations auto-assigned to a user")
        .build()
}

/// Counter: conversations left unassigned in a cycle.
/// Labels: `reason` ("no_pool" | "empty_pool" | "capacity" | "store_error").
pub fn conversations_skipped() -> Counter<u64> {
    meter()
        .u64_counter("autoassign.conversations.skipped")
        .with_description("Number of conversations skipped during an assignment cycle")
        .build()
}

/// Counter: registry reloads.
/// Labels: `result` ("ok" | "error").
pub fn registry_reloads() -> Counter<u64> {
    meter()
        .u64_counter("autoassign.registry.reloads")
        .with_description("Number of assignment registry reloads")
        .build()
}

/// Histogram: assignment cycle duration in milliseconds.
pub fn cycle_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("autoassign.cycle.duration_ms")
        .with_description("Assignment cycle duration in milliseconds")
        .with_unit("ms")
        .build()
}
