//! # Requirement Evaluator
//!
//! Computes, per stage, whether each requirement is satisfied: automatic
//! requirements from the external metrics snapshot, manual requirements from
//! the recorded attestation flags.
//!
//! Evaluation is split read/apply: [`RequirementEvaluator::evaluate`] is a
//! pure function producing an [`Evaluation`], and the engine decides whether
//! to apply it (never while the relationship is frozen). When the metrics
//! source is unreachable the evaluation falls back to the record's
//! last-known values and is marked `stale` — a transient read failure must
//! never block the caller or regress a stage.

use crate::catalog::{self, CompletionMode};
use crate::metrics::MetricsSource;
use crate::relationship::Relationship;
use crate::types::RequirementId;
use serde::Serialize;

// =============================================================================
// CHECKLIST VIEW
// =============================================================================

/// One checklist row, as rendered by consuming surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct RequirementProgress {
    pub id: RequirementId,
    pub label: &'static str,
    /// `"automatic"` or `"manual"`.
    pub mode: &'static str,
    /// Fresh measured value (automatic) or signature count (manual).
    pub current_value: u64,
    /// Threshold (automatic) or 2 (manual).
    pub required_value: u64,
    pub initiator_signed: bool,
    pub recipient_signed: bool,
    pub completed: bool,
}

// =============================================================================
// EVALUATION
// =============================================================================

/// The result of evaluating a relationship's current-stage requirements.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Checklist rows in catalog order.
    pub checklist: Vec<RequirementProgress>,
    /// Requirements that transitioned incomplete → complete in this pass.
    pub newly_completed: Vec<RequirementId>,
    /// Fresh automatic values to persist, in catalog order.
    values: Vec<(RequirementId, u64)>,
    /// Every requirement of the stage is (now) complete.
    pub all_complete: bool,
    /// The metrics source was unreachable; values are last-known.
    pub stale: bool,
}

impl Evaluation {
    /// Write the evaluation back onto the record.
    ///
    /// Sets fresh automatic values and latches newly-completed requirements
    /// with `completed_at_ms = now_ms`. Returns whether anything changed, so
    /// the caller can skip a store write on a no-op pass.
    pub fn apply_to(&self, record: &mut Relationship, now_ms: u64) -> bool {
        let mut changed = false;
        for (id, value) in &self.values {
            if let Some(state) = record.requirement_mut(*id) {
                if state.current_value != *value {
                    state.current_value = *value;
                    changed = true;
                }
            }
        }
        for id in &self.newly_completed {
            if let Some(state) = record.requirement_mut(*id) {
                if !state.completed {
                    state.completed = true;
                    state.completed_at_ms = Some(now_ms);
                    changed = true;
                }
            }
        }
        changed
    }
}

// =============================================================================
// EVALUATOR
// =============================================================================

/// Pure evaluation of a relationship's current-stage requirements.
pub struct RequirementEvaluator;

impl RequirementEvaluator {
    /// Checklist rows from the persisted record only, no metrics read.
    ///
    /// Used for frozen and ended relationships, where the displayed state is
    /// the state at freeze time rather than a live recomputation.
    #[must_use]
    pub fn describe(record: &Relationship) -> Vec<RequirementProgress> {
        record
            .requirements
            .iter()
            .filter_map(|state| {
                let spec = catalog::spec(state.id)?;
                let row = match spec.mode {
                    CompletionMode::Automatic { required_value, .. } => RequirementProgress {
                        id: state.id,
                        label: spec.label,
                        mode: spec.mode.key(),
                        current_value: state.current_value,
                        required_value,
                        initiator_signed: false,
                        recipient_signed: false,
                        completed: state.completed,
                    },
                    CompletionMode::Manual => {
                        let initiator_signed = state.initiator_signed_at_ms.is_some();
                        let recipient_signed = state.recipient_signed_at_ms.is_some();
                        RequirementProgress {
                            id: state.id,
                            label: spec.label,
                            mode: spec.mode.key(),
                            current_value: u64::from(initiator_signed)
                                + u64::from(recipient_signed),
                            required_value: 2,
                            initiator_signed,
                            recipient_signed,
                            completed: state.completed,
                        }
                    }
                };
                Some(row)
            })
            .collect()
    }

    /// Evaluate all requirements of the record's current stage.
    ///
    /// Never fails: an unreachable metrics source degrades to last-known
    /// values with `stale = true`. Manual requirements depend only on the
    /// local attestation flags and are unaffected by upstream health.
    #[must_use]
    pub fn evaluate(record: &Relationship, metrics: &impl MetricsSource) -> Evaluation {
        let snapshot = metrics.snapshot(record.id);
        let stale = snapshot.is_err();
        let snapshot = snapshot.ok();

        let mut checklist = Vec::with_capacity(record.requirements.len());
        let mut newly_completed = Vec::new();
        let mut values = Vec::new();
        let mut all_complete = true;

        for state in &record.requirements {
            let Some(spec) = catalog::spec(state.id) else {
                // Unknown id in a persisted record: surface as an incomplete
                // opaque row rather than inventing completion.
                all_complete = false;
                continue;
            };

            let row = match spec.mode {
                CompletionMode::Automatic {
                    metric,
                    required_value,
                } => {
                    // Counters are cumulative: never let a lower upstream
                    // reading walk a persisted value backwards.
                    let fresh = match snapshot {
                        Some(s) => state.current_value.max(s.value(metric)),
                        None => state.current_value,
                    };
                    let completed = state.completed || (!stale && fresh >= required_value);
                    if completed && !state.completed {
                        newly_completed.push(state.id);
                    }
                    values.push((state.id, fresh));
                    RequirementProgress {
                        id: state.id,
                        label: spec.label,
                        mode: spec.mode.key(),
                        current_value: fresh,
                        required_value,
                        initiator_signed: false,
                        recipient_signed: false,
                        completed,
                    }
                }
                CompletionMode::Manual => {
                    let initiator_signed = state.initiator_signed_at_ms.is_some();
                    let recipient_signed = state.recipient_signed_at_ms.is_some();
                    RequirementProgress {
                        id: state.id,
                        label: spec.label,
                        mode: spec.mode.key(),
                        current_value: u64::from(initiator_signed)
                            + u64::from(recipient_signed),
                        required_value: 2,
                        initiator_signed,
                        recipient_signed,
                        completed: state.completed,
                    }
                }
            };

            all_complete &= row.completed;
            checklist.push(row);
        }

        Evaluation {
            checklist,
            newly_completed,
            values,
            all_complete,
            stale,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{ActivitySnapshot, RecordedMetrics};
    use crate::types::{KinshipError, PartyId, RelationshipId};

    struct DownSource;

    impl MetricsSource for DownSource {
        fn snapshot(&self, _: RelationshipId) -> Result<ActivitySnapshot, KinshipError> {
            Err(KinshipError::UpstreamUnavailable("connection refused".into()))
        }
    }

    fn record() -> Relationship {
        Relationship::new(RelationshipId(1), PartyId(10), PartyId(20), 0)
    }

    #[test]
    fn automatic_requirement_completes_at_threshold() {
        let record = record();
        let mut metrics = RecordedMetrics::new();
        metrics.report(
            record.id,
            ActivitySnapshot {
                active_days: 7,
                ..Default::default()
            },
        );

        let evaluation = RequirementEvaluator::evaluate(&record, &metrics);

        assert!(!evaluation.stale);
        assert_eq!(evaluation.newly_completed, vec![record.requirements[0].id]);
        // The manual "met in person" requirement is still open.
        assert!(!evaluation.all_complete);
    }

    #[test]
    fn below_threshold_stays_open() {
        let record = record();
        let mut metrics = RecordedMetrics::new();
        metrics.report(
            record.id,
            ActivitySnapshot {
                active_days: 6,
                ..Default::default()
            },
        );

        let evaluation = RequirementEvaluator::evaluate(&record, &metrics);
        assert!(evaluation.newly_completed.is_empty());
        assert_eq!(evaluation.checklist[0].current_value, 6);
    }

    #[test]
    fn stale_fallback_keeps_last_known_values() {
        let mut record = record();
        record.requirements[0].current_value = 5;

        let evaluation = RequirementEvaluator::evaluate(&record, &DownSource);

        assert!(evaluation.stale);
        assert!(evaluation.newly_completed.is_empty());
        assert_eq!(evaluation.checklist[0].current_value, 5);
    }

    #[test]
    fn stale_never_uncompletes() {
        let mut record = record();
        record.requirements[0].completed = true;
        record.requirements[0].current_value = 7;

        let evaluation = RequirementEvaluator::evaluate(&record, &DownSource);
        assert!(evaluation.checklist[0].completed);
    }

    #[test]
    fn lower_upstream_reading_does_not_regress_values() {
        let mut record = record();
        record.requirements[0].current_value = 6;
        let metrics = RecordedMetrics::new(); // reads as zero

        let evaluation = RequirementEvaluator::evaluate(&record, &metrics);
        assert_eq!(evaluation.checklist[0].current_value, 6);
    }

    #[test]
    fn apply_is_idempotent() {
        let mut record = record();
        let mut metrics = RecordedMetrics::new();
        metrics.report(
            record.id,
            ActivitySnapshot {
                active_days: 7,
                ..Default::default()
            },
        );

        let evaluation = RequirementEvaluator::evaluate(&record, &metrics);
        assert!(evaluation.apply_to(&mut record, 100));
        assert!(record.requirements[0].completed);
        assert_eq!(record.requirements[0].completed_at_ms, Some(100));

        // A second identical pass changes nothing.
        let again = RequirementEvaluator::evaluate(&record, &metrics);
        assert!(again.newly_completed.is_empty());
        assert!(!again.apply_to(&mut record, 200));
        assert_eq!(record.requirements[0].completed_at_ms, Some(100));
    }

    #[test]
    fn manual_rows_count_signatures() {
        let mut record = record();
        let manual_id = record.requirements[1].id;
        record
            .requirement_mut(manual_id)
            .expect("manual state")
            .initiator_signed_at_ms = Some(50);

        let evaluation = RequirementEvaluator::evaluate(&record, &RecordedMetrics::new());
        let row = &evaluation.checklist[1];
        assert_eq!(row.mode, "manual");
        assert_eq!(row.current_value, 1);
        assert_eq!(row.required_value, 2);
        assert!(row.initiator_signed);
        assert!(!row.recipient_signed);
    }
}
