//! # Cooling-Off Periods
//!
//! A party-initiated withdrawal freezes progression and opens a fixed
//! 24-hour reflection window. The window is evaluated lazily: there is no
//! background timer. Every engine entry point settles an elapsed window
//! against the caller-supplied `now_ms` before doing anything else, so a
//! stale `is_frozen` flag is never trusted on its own.

use crate::stage::Stage;
use crate::types::PartyId;
use serde::{Deserialize, Serialize};

/// Fixed reflection window: 24 hours, in milliseconds.
pub const COOLING_OFF_DURATION_MS: u64 = 24 * 60 * 60 * 1000;

// =============================================================================
// RESOLUTION
// =============================================================================

/// How a cooling-off period ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoolingOffResolution {
    /// The window lapsed with no end signal; progress resumed.
    Resumed,
    /// The withdrawing party followed through; the relationship ended.
    RelationshipEnded,
}

// =============================================================================
// COOLING-OFF PERIOD
// =============================================================================

/// One reflection window, active while `resolution` is `None`.
///
/// At most one period per relationship is active at a time; resolved
/// periods are retained on the relationship record for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoolingOffPeriod {
    pub started_at_ms: u64,
    pub duration_ms: u64,
    /// Stage held constant for the duration of the freeze.
    pub frozen_stage: Stage,
    /// Progress percentage captured at the moment of withdrawal.
    pub frozen_progress_percent: u8,
    pub requested_by: PartyId,
    pub reason: String,
    pub resolution: Option<CoolingOffResolution>,
}

impl CoolingOffPeriod {
    /// Open a new window at `now_ms`.
    #[must_use]
    pub fn open(
        now_ms: u64,
        frozen_stage: Stage,
        frozen_progress_percent: u8,
        requested_by: PartyId,
        reason: String,
    ) -> Self {
        Self {
            started_at_ms: now_ms,
            duration_ms: COOLING_OFF_DURATION_MS,
            frozen_stage,
            frozen_progress_percent,
            requested_by,
            reason,
            resolution: None,
        }
    }

    /// Whether the window is still unresolved.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.resolution.is_none()
    }

    /// Whether the window's full duration has passed at `now_ms`.
    ///
    /// Saturating: a `now_ms` earlier than `started_at_ms` (clock skew
    /// between callers) reads as zero elapsed, never as elapsed.
    #[must_use]
    pub fn has_elapsed(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.started_at_ms) >= self.duration_ms
    }

    /// Countdown remaining at `now_ms`, zero once elapsed.
    #[must_use]
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.duration_ms
            .saturating_sub(now_ms.saturating_sub(self.started_at_ms))
    }

    /// The instant the window lapses.
    #[must_use]
    pub fn ends_at_ms(&self) -> u64 {
        self.started_at_ms.saturating_add(self.duration_ms)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn period(started_at_ms: u64) -> CoolingOffPeriod {
        CoolingOffPeriod::open(
            started_at_ms,
            Stage::TrialPeriod,
            75,
            PartyId(1),
            "need time to reflect".to_string(),
        )
    }

    #[test]
    fn window_is_24_hours() {
        assert_eq!(COOLING_OFF_DURATION_MS, 86_400_000);
        assert_eq!(period(0).ends_at_ms(), 86_400_000);
    }

    #[test]
    fn elapsed_exactly_at_deadline() {
        let p = period(1000);
        assert!(!p.has_elapsed(1000 + COOLING_OFF_DURATION_MS - 1));
        assert!(p.has_elapsed(1000 + COOLING_OFF_DURATION_MS));
    }

    #[test]
    fn remaining_counts_down_and_floors_at_zero() {
        let p = period(0);
        assert_eq!(p.remaining_ms(0), COOLING_OFF_DURATION_MS);
        assert_eq!(p.remaining_ms(COOLING_OFF_DURATION_MS / 2), COOLING_OFF_DURATION_MS / 2);
        assert_eq!(p.remaining_ms(COOLING_OFF_DURATION_MS * 2), 0);
    }

    #[test]
    fn skewed_clock_does_not_elapse() {
        let p = period(5000);
        assert!(!p.has_elapsed(0));
        assert_eq!(p.remaining_ms(0), COOLING_OFF_DURATION_MS);
    }

    #[test]
    fn resolution_deactivates() {
        let mut p = period(0);
        assert!(p.is_active());
        p.resolution = Some(CoolingOffResolution::Resumed);
        assert!(!p.is_active());
    }
}
