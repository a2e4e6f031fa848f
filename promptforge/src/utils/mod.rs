//! Utility functions for run identifiers and timestamps.

use chrono::Utc;
use uuid::Uuid;

/// Returns the current UTC time as an ISO 8601 formatted string
/// (`YYYY-MM-DDTHH:MM:SS.ffffff+00:00`).
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Generates a time-ordered run identifier.
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::now_v7()
}
