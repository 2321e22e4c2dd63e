//! # Kinship application library
//!
//! Exposes the API and CLI modules so integration tests can exercise the
//! router without starting a real server.

pub mod api;
pub mod cli;
pub mod config;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as Unix epoch milliseconds.
///
/// The core engine is wall-clock-free; this is the single place the binary
/// reads the system clock before handing `now_ms` to engine calls.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
