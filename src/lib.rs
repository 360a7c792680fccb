//! # helpdesk-autoassign
//!
//! Automatic conversation assignment for a helpdesk.
//!
//! Periodically distributes conversations that are assigned to a team but
//! not to a user across that team's members in round-robin order, skipping
//! members who already hold the team's maximum number of active
//! conversations. Backed by Postgres (sqlx) with OpenTelemetry observability.

pub mod assign;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod store;
pub mod telemetry;

pub use assign::{CycleReport, Engine};
