//! # Activity Metrics Source
//!
//! Automatic requirements are satisfied by measured external facts: days of
//! qualifying activity, completed calendar activities, completed calls.
//! Those facts are owned by an external collaborator; this engine only reads
//! them through the [`MetricsSource`] trait.
//!
//! ## Degradation
//!
//! A source may be transiently unreachable. Callers (the evaluator) treat an
//! `Err` as "fall back to last-known values, mark the result stale" — a
//! stage must never regress because a read failed.

use crate::types::{KinshipError, RelationshipId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// METRIC KINDS
// =============================================================================

/// The measurable facts the catalog can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Days on which the relationship had qualifying activity.
    ActiveDays,
    /// Completed shared calendar activities.
    ActivitiesCompleted,
    /// Completed calls.
    CallsCompleted,
}

// =============================================================================
// ACTIVITY SNAPSHOT
// =============================================================================

/// Point-in-time counts for one relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ActivitySnapshot {
    pub active_days: u64,
    pub activities_completed: u64,
    pub calls_completed: u64,
}

impl ActivitySnapshot {
    /// Read one counter by kind.
    #[must_use]
    pub fn value(&self, kind: MetricKind) -> u64 {
        match kind {
            MetricKind::ActiveDays => self.active_days,
            MetricKind::ActivitiesCompleted => self.activities_completed,
            MetricKind::CallsCompleted => self.calls_completed,
        }
    }

    /// Pointwise maximum of two snapshots.
    ///
    /// Counts are cumulative: merging with max makes duplicated or
    /// out-of-order reports harmless.
    #[must_use]
    pub fn merged(self, other: ActivitySnapshot) -> ActivitySnapshot {
        ActivitySnapshot {
            active_days: self.active_days.max(other.active_days),
            activities_completed: self.activities_completed.max(other.activities_completed),
            calls_completed: self.calls_completed.max(other.calls_completed),
        }
    }
}

// =============================================================================
// METRICS SOURCE TRAIT
// =============================================================================

/// Read-only view onto the external activity/metrics collaborator.
///
/// # Extension Point
///
/// Implementors adapt whatever upstream actually holds the counts (an
/// activity service, a calendar backend). Implementations must be cheap to
/// call: the evaluator reads a snapshot on every refresh.
pub trait MetricsSource {
    /// Current counts for the relationship.
    ///
    /// Returns `KinshipError::UpstreamUnavailable` when the collaborator
    /// cannot be reached; the evaluator then reuses last-known values.
    fn snapshot(&self, relationship: RelationshipId) -> Result<ActivitySnapshot, KinshipError>;
}

// =============================================================================
// RECORDED METRICS (in-process implementation)
// =============================================================================

/// An in-process metrics source fed by pushed activity reports.
///
/// The binary exposes an activity-report endpoint that external
/// collaborators push counts to; this type records them. Reports merge
/// monotonically (pointwise max), so retries and redeliveries are no-ops.
#[derive(Debug, Default)]
pub struct RecordedMetrics {
    counts: BTreeMap<RelationshipId, ActivitySnapshot>,
}

impl RecordedMetrics {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pushed activity report for a relationship.
    pub fn report(&mut self, relationship: RelationshipId, snapshot: ActivitySnapshot) {
        let merged = self
            .counts
            .get(&relationship)
            .copied()
            .unwrap_or_default()
            .merged(snapshot);
        self.counts.insert(relationship, merged);
    }
}

impl MetricsSource for RecordedMetrics {
    fn snapshot(&self, relationship: RelationshipId) -> Result<ActivitySnapshot, KinshipError> {
        // A relationship with no reports yet has zero counts, not an error.
        Ok(self.counts.get(&relationship).copied().unwrap_or_default())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_pointwise_max() {
        let a = ActivitySnapshot {
            active_days: 10,
            activities_completed: 2,
            calls_completed: 0,
        };
        let b = ActivitySnapshot {
            active_days: 7,
            activities_completed: 5,
            calls_completed: 1,
        };
        let merged = a.merged(b);
        assert_eq!(merged.active_days, 10);
        assert_eq!(merged.activities_completed, 5);
        assert_eq!(merged.calls_completed, 1);
    }

    #[test]
    fn duplicate_reports_are_noops() {
        let mut recorder = RecordedMetrics::new();
        let id = RelationshipId(1);
        let snapshot = ActivitySnapshot {
            active_days: 3,
            activities_completed: 1,
            calls_completed: 1,
        };

        recorder.report(id, snapshot);
        recorder.report(id, snapshot);

        assert_eq!(recorder.snapshot(id).expect("snapshot"), snapshot);
    }

    #[test]
    fn unknown_relationship_reads_zero() {
        let recorder = RecordedMetrics::new();
        let snapshot = recorder.snapshot(RelationshipId(99)).expect("snapshot");
        assert_eq!(snapshot, ActivitySnapshot::default());
    }

    #[test]
    fn counters_never_regress() {
        let mut recorder = RecordedMetrics::new();
        let id = RelationshipId(1);
        recorder.report(
            id,
            ActivitySnapshot {
                active_days: 9,
                activities_completed: 4,
                calls_completed: 2,
            },
        );
        // A stale upstream replay with lower counts must not lower ours.
        recorder.report(
            id,
            ActivitySnapshot {
                active_days: 2,
                activities_completed: 1,
                calls_completed: 0,
            },
        );
        let snapshot = recorder.snapshot(id).expect("snapshot");
        assert_eq!(snapshot.active_days, 9);
        assert_eq!(snapshot.calls_completed, 2);
    }
}
