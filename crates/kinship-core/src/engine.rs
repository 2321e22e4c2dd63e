//! # Progression Engine
//!
//! The service object owning all relationship mutations: sign-offs,
//! withdrawal requests, end signals, and evaluation refreshes. Composes the
//! Requirement Evaluator, the Attestation Ledger, the cooling-off subsystem
//! and the Feature Unlock Resolver over a [`StoreBackend`].
//!
//! ## Discipline
//!
//! Every entry point follows the same shape:
//!
//! 1. Read the record at its current version.
//! 2. **Settle** any elapsed cooling-off window against the caller's
//!    `now_ms` (the lazy timer — no background worker exists).
//! 3. Validate and apply the operation on the in-memory copy.
//! 4. Write back conditionally on the version; on conflict, retry from a
//!    fresh read (bounded).
//!
//! Transitions are computed, never requested, and move exactly one stage per
//! entry point. Events are returned to the caller from the call whose
//! conditional write succeeded, so each logical transition is emitted
//! exactly once.

use crate::attestation::{self, SigningStatus};
use crate::catalog::{self, CompletionMode, MAX_REASON_LENGTH};
use crate::cooling_off::{CoolingOffPeriod, CoolingOffResolution};
use crate::evaluator::{RequirementEvaluator, RequirementProgress};
use crate::features::{self, FeatureKey};
use crate::metrics::{MetricKind, MetricsSource};
use crate::relationship::Relationship;
use crate::stage::{Stage, StageProgress};
use crate::store::{RelationshipStore, StoreBackend};
use crate::types::{
    EngineEvent, JourneyStats, KinshipError, PartyId, RelationshipId, RequirementId,
};
use std::collections::BTreeSet;

/// Bounded optimistic retries before surfacing `Conflict` to the caller.
pub const MAX_CONFLICT_RETRIES: usize = 4;

// =============================================================================
// OUTCOMES
// =============================================================================

/// Countdown view of an active cooling-off window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoolingOffStatus {
    pub started_at_ms: u64,
    pub ends_at_ms: u64,
    pub remaining_ms: u64,
    pub requested_by: PartyId,
    pub reason: String,
}

/// Full display state for one relationship, read at one logical instant.
#[derive(Debug)]
pub struct StatusReport {
    pub id: RelationshipId,
    pub stage: Stage,
    pub progress: StageProgress,
    pub is_frozen: bool,
    pub ended: bool,
    /// The metrics source was unreachable; automatic values are last-known.
    pub stale: bool,
    pub cooling_off: Option<CoolingOffStatus>,
    pub checklist: Vec<RequirementProgress>,
    pub features: BTreeSet<FeatureKey>,
    pub events: Vec<EngineEvent>,
}

/// Result of a sign-off call.
#[derive(Debug)]
pub struct SignOffOutcome {
    pub status: SigningStatus,
    /// Stage after the call (the sign-off may have completed the stage).
    pub stage: Stage,
    pub events: Vec<EngineEvent>,
}

/// Result of a withdrawal request.
#[derive(Debug)]
pub struct WithdrawalOutcome {
    pub ends_at_ms: u64,
    pub events: Vec<EngineEvent>,
}

/// Result of an end signal.
#[derive(Debug)]
pub struct EndOutcome {
    pub events: Vec<EngineEvent>,
}

/// Result of a change-feed-triggered refresh.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub stage: Stage,
    pub stale: bool,
    pub events: Vec<EngineEvent>,
}

/// Result of a feature resolution read.
#[derive(Debug)]
pub struct FeatureSet {
    pub stage: Stage,
    pub is_frozen: bool,
    pub features: BTreeSet<FeatureKey>,
    pub events: Vec<EngineEvent>,
}

// =============================================================================
// ENGINE
// =============================================================================

/// The progression engine service object.
///
/// Constructed with its store backend and metrics source (dependency
/// injection — no module-level singletons), which makes deterministic
/// testing with in-memory fakes trivial.
#[derive(Debug)]
pub struct ProgressionEngine<M: MetricsSource> {
    store: StoreBackend,
    metrics: M,
}

impl<M: MetricsSource> ProgressionEngine<M> {
    /// Create an engine over the given backend and metrics source.
    #[must_use]
    pub fn new(store: StoreBackend, metrics: M) -> Self {
        Self { store, metrics }
    }

    /// Read-only access to the metrics source.
    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    /// Mutable access to the metrics source (activity-report ingestion).
    pub fn metrics_mut(&mut self) -> &mut M {
        &mut self.metrics
    }

    /// Number of stored relationships.
    pub fn relationship_count(&self) -> Result<usize, KinshipError> {
        self.store.count()
    }

    /// All stored relationship ids, ascending.
    pub fn relationship_ids(&self) -> Result<Vec<RelationshipId>, KinshipError> {
        self.store.ids()
    }

    // =========================================================================
    // CREATION
    // =========================================================================

    /// Create a relationship for an approved match.
    ///
    /// The entry stage's checklist is initialized immediately. Creation
    /// emits no event: approval notification is the reviewing process's
    /// concern, not this engine's.
    pub fn create_relationship(
        &mut self,
        id: RelationshipId,
        initiator: PartyId,
        recipient: PartyId,
        now_ms: u64,
    ) -> Result<(), KinshipError> {
        if initiator == recipient {
            return Err(KinshipError::validation(
                "initiator and recipient must be distinct parties",
            ));
        }
        self.store
            .insert(&Relationship::new(id, initiator, recipient, now_ms))
    }

    // =========================================================================
    // SIGN-OFF (Attestation Ledger entry point)
    // =========================================================================

    /// Record one party's sign-off for a manual requirement.
    ///
    /// Returns immediately with `WaitingForPartner` rather than suspending —
    /// no entry point ever blocks on the other party's action. When the call
    /// completes the requirement, advancement is re-checked in the same
    /// atomic write.
    pub fn sign_off(
        &mut self,
        id: RelationshipId,
        requirement_id: RequirementId,
        party: PartyId,
        now_ms: u64,
    ) -> Result<SignOffOutcome, KinshipError> {
        let (outcome, events) = Self::run(
            &mut self.store,
            &self.metrics,
            id,
            |record, metrics| {
                let (mut events, mut dirty) = settle(record, now_ms)?;
                ensure_open(record)?;

                let role = record.role_of(party).ok_or_else(|| {
                    KinshipError::validation("signer is not a party to this relationship")
                })?;
                let spec = catalog::spec(requirement_id)
                    .ok_or_else(|| KinshipError::validation("unknown requirement"))?;
                if spec.stage != record.current_stage {
                    return Err(KinshipError::validation(
                        "requirement does not belong to the current stage",
                    ));
                }
                if spec.mode != CompletionMode::Manual {
                    return Err(KinshipError::validation(
                        "requirement is not completed by sign-off",
                    ));
                }
                let state = record.requirement_mut(requirement_id).ok_or_else(|| {
                    KinshipError::InvariantViolation(
                        "catalog requirement missing from record".to_string(),
                    )
                })?;

                let (status, entry) = attestation::apply_sign_off(state, role, party, now_ms);
                if let Some(entry) = entry {
                    record.attestations.push(entry);
                    dirty = true;
                }

                if status == SigningStatus::Completed {
                    // Completion moment: re-check the full requirement set.
                    events.extend(check_advancement(record, metrics, now_ms)?);
                }

                Ok(((status, record.current_stage), events, dirty))
            },
        )?;

        Ok(SignOffOutcome {
            status: outcome.0,
            stage: outcome.1,
            events,
        })
    }

    // =========================================================================
    // WITHDRAWAL / COOLING-OFF
    // =========================================================================

    /// Open a cooling-off window for a party's withdrawal request.
    pub fn request_withdrawal(
        &mut self,
        id: RelationshipId,
        party: PartyId,
        reason: impl Into<String>,
        now_ms: u64,
    ) -> Result<WithdrawalOutcome, KinshipError> {
        let reason = reason.into();
        if reason.len() > MAX_REASON_LENGTH {
            return Err(KinshipError::validation("withdrawal reason is too long"));
        }

        let (ends_at_ms, events) = Self::run(
            &mut self.store,
            &self.metrics,
            id,
            move |record, _metrics| {
                let (mut events, _) = settle(record, now_ms)?;
                ensure_open(record)?;
                if record.role_of(party).is_none() {
                    return Err(KinshipError::validation(
                        "requester is not a party to this relationship",
                    ));
                }

                let percent = record.computed_progress_percent();
                let period = CoolingOffPeriod::open(
                    now_ms,
                    record.current_stage,
                    percent,
                    party,
                    reason.clone(),
                );
                let ends_at_ms = period.ends_at_ms();

                record.is_frozen = true;
                record.frozen_at_progress_percent = Some(percent);
                record.cooling_off = Some(period);
                events.push(EngineEvent::WithdrawalStarted {
                    relationship: record.id,
                    requested_by: party,
                    at_ms: now_ms,
                });

                Ok((ends_at_ms, events, true))
            },
        )?;

        Ok(WithdrawalOutcome { ends_at_ms, events })
    }

    /// Record the external signal that the withdrawing party followed
    /// through on ending the relationship.
    ///
    /// Only valid while a cooling-off window is still active: once the
    /// window has lapsed, settlement has already resumed the relationship
    /// and a late end signal is rejected.
    pub fn record_relationship_ended(
        &mut self,
        id: RelationshipId,
        now_ms: u64,
    ) -> Result<EndOutcome, KinshipError> {
        let ((), events) = Self::run(
            &mut self.store,
            &self.metrics,
            id,
            |record, _metrics| {
                let (mut events, _) = settle(record, now_ms)?;
                if record.ended {
                    return Err(KinshipError::validation("relationship has already ended"));
                }
                if !record.is_frozen {
                    return Err(KinshipError::validation(
                        "no active cooling-off period to resolve",
                    ));
                }
                let Some(mut period) = record.cooling_off.take() else {
                    return Err(KinshipError::InvariantViolation(
                        "frozen relationship has no cooling-off period".to_string(),
                    ));
                };

                period.resolution = Some(CoolingOffResolution::RelationshipEnded);
                record.cooling_off_history.push(period);
                record.is_frozen = false;
                record.ended = true;
                events.push(EngineEvent::RelationshipEnded {
                    relationship: record.id,
                    at_ms: now_ms,
                });

                Ok(((), events, true))
            },
        )?;

        Ok(EndOutcome { events })
    }

    // =========================================================================
    // EVALUATION (change-feed trigger)
    // =========================================================================

    /// Re-run requirement evaluation for a relationship.
    ///
    /// This is the idempotent re-evaluation the change-notification feed
    /// triggers: missed or duplicated notifications cannot corrupt state,
    /// and a repeat call with identical inputs emits no second event.
    pub fn refresh(
        &mut self,
        id: RelationshipId,
        now_ms: u64,
    ) -> Result<RefreshOutcome, KinshipError> {
        let ((stage, stale), events) = Self::run(
            &mut self.store,
            &self.metrics,
            id,
            |record, metrics| {
                let (mut events, mut dirty) = settle(record, now_ms)?;
                let mut stale = false;

                if !record.ended {
                    let evaluation = RequirementEvaluator::evaluate(record, metrics);
                    stale = evaluation.stale;
                    // Results are not applied while frozen: the evaluator
                    // still runs, the state machine does not move.
                    if !record.is_frozen && !stale {
                        dirty |= evaluation.apply_to(record, now_ms);
                        if record.all_requirements_complete()
                            && !record.current_stage.is_terminal()
                        {
                            events.extend(advance(record, metrics, now_ms)?);
                            dirty = true;
                        }
                    }
                }

                Ok(((record.current_stage, stale), events, dirty))
            },
        )?;

        Ok(RefreshOutcome {
            stage,
            stale,
            events,
        })
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Full display state: stage, progress, countdown, checklist, features.
    ///
    /// A status read is also an evaluation trigger (lazy recomputation): it
    /// settles cooling-off and applies fresh non-stale automatic values, so
    /// a party's client reflects the other party's actions without polling
    /// anything but this endpoint.
    pub fn status(
        &mut self,
        id: RelationshipId,
        now_ms: u64,
    ) -> Result<StatusReport, KinshipError> {
        let (report, events) = Self::run(
            &mut self.store,
            &self.metrics,
            id,
            |record, metrics| {
                let (mut events, mut dirty) = settle(record, now_ms)?;

                let mut stale = false;
                let checklist;
                if record.ended || record.is_frozen {
                    // Frozen/ended reads show the state captured at freeze
                    // time, never a live recomputation.
                    checklist = RequirementEvaluator::describe(record);
                } else {
                    let mut evaluation = RequirementEvaluator::evaluate(record, metrics);
                    stale = evaluation.stale;
                    if !stale {
                        dirty |= evaluation.apply_to(record, now_ms);
                        if record.all_requirements_complete()
                            && !record.current_stage.is_terminal()
                        {
                            events.extend(advance(record, metrics, now_ms)?);
                            dirty = true;
                            // Fill in the fresh stage's automatic values so
                            // the new checklist renders with live numbers.
                            evaluation = RequirementEvaluator::evaluate(record, metrics);
                            if !evaluation.stale {
                                evaluation.apply_to(record, now_ms);
                            }
                        }
                    }
                    checklist = evaluation.checklist;
                }

                let cooling_off = record
                    .cooling_off
                    .as_ref()
                    .filter(|period| period.is_active())
                    .map(|period| CoolingOffStatus {
                        started_at_ms: period.started_at_ms,
                        ends_at_ms: period.ends_at_ms(),
                        remaining_ms: period.remaining_ms(now_ms),
                        requested_by: period.requested_by,
                        reason: period.reason.clone(),
                    });

                // An ended relationship accepts no further interaction of
                // any kind, advisor channel included.
                let unlocked = if record.ended {
                    BTreeSet::new()
                } else {
                    features::resolve(record.current_stage, record.is_frozen)
                };

                let report = StatusReport {
                    id: record.id,
                    stage: record.current_stage,
                    progress: record.progress(),
                    is_frozen: record.is_frozen,
                    ended: record.ended,
                    stale,
                    cooling_off,
                    checklist,
                    features: unlocked,
                    events: Vec::new(),
                };

                Ok((report, events, dirty))
            },
        )?;

        Ok(StatusReport { events, ..report })
    }

    /// The unlocked capability set, read cheaply (no metric evaluation).
    pub fn features(
        &mut self,
        id: RelationshipId,
        now_ms: u64,
    ) -> Result<FeatureSet, KinshipError> {
        let ((stage, is_frozen, unlocked), events) = Self::run(
            &mut self.store,
            &self.metrics,
            id,
            |record, _metrics| {
                let (events, dirty) = settle(record, now_ms)?;
                let unlocked = if record.ended {
                    BTreeSet::new()
                } else {
                    features::resolve(record.current_stage, record.is_frozen)
                };
                Ok((
                    (record.current_stage, record.is_frozen, unlocked),
                    events,
                    dirty,
                ))
            },
        )?;

        Ok(FeatureSet {
            stage,
            is_frozen,
            features: unlocked,
            events,
        })
    }

    // =========================================================================
    // READ-MODIFY-WRITE LOOP
    // =========================================================================

    /// Optimistic read-modify-conditional-write with bounded retry.
    ///
    /// The closure returns `(value, events, dirty)`; when `dirty` is false
    /// the write is skipped entirely (pure read). Events are only returned
    /// from the attempt whose write succeeded, which is what makes emission
    /// exactly-once.
    fn run<T>(
        store: &mut StoreBackend,
        metrics: &M,
        id: RelationshipId,
        op: impl Fn(
            &mut Relationship,
            &M,
        ) -> Result<(T, Vec<EngineEvent>, bool), KinshipError>,
    ) -> Result<(T, Vec<EngineEvent>), KinshipError> {
        let mut attempts = 0;
        loop {
            let mut record = store.get(id)?.ok_or(KinshipError::NotFound)?;
            let (value, events, dirty) = op(&mut record, metrics)?;
            if !dirty {
                return Ok((value, events));
            }
            match store.update(&record) {
                Ok(_) => return Ok((value, events)),
                Err(KinshipError::Conflict) if attempts < MAX_CONFLICT_RETRIES => {
                    attempts += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// =============================================================================
// SETTLEMENT (the lazy cooling-off timer)
// =============================================================================

/// Settle an elapsed cooling-off window against `now_ms`.
///
/// Runs at the top of every entry point so no code path ever trusts a
/// possibly-stale frozen flag. Returns `(events, dirty)`.
fn settle(
    record: &mut Relationship,
    now_ms: u64,
) -> Result<(Vec<EngineEvent>, bool), KinshipError> {
    if !record.is_frozen {
        if record
            .cooling_off
            .as_ref()
            .is_some_and(CoolingOffPeriod::is_active)
        {
            return Err(KinshipError::InvariantViolation(
                "active cooling-off period on an unfrozen relationship".to_string(),
            ));
        }
        return Ok((Vec::new(), false));
    }

    match record.cooling_off.take() {
        Some(mut period) if period.is_active() => {
            if !period.has_elapsed(now_ms) {
                record.cooling_off = Some(period);
                return Ok((Vec::new(), false));
            }
            // The window lapsed with no end signal: both parties are taken
            // to have agreed to continue.
            period.resolution = Some(CoolingOffResolution::Resumed);
            record.cooling_off_history.push(period);
            record.is_frozen = false;
            record.frozen_at_progress_percent = None;
            Ok((
                vec![EngineEvent::CoolingOffResumed {
                    relationship: record.id,
                    at_ms: now_ms,
                }],
                true,
            ))
        }
        Some(period) => {
            record.cooling_off = Some(period);
            Err(KinshipError::InvariantViolation(
                "frozen relationship holds a resolved cooling-off period".to_string(),
            ))
        }
        None => Err(KinshipError::InvariantViolation(
            "frozen relationship has no cooling-off period".to_string(),
        )),
    }
}

/// Reject mutations on ended or frozen relationships.
fn ensure_open(record: &Relationship) -> Result<(), KinshipError> {
    if record.ended {
        return Err(KinshipError::validation("relationship has ended"));
    }
    if record.is_frozen {
        return Err(KinshipError::validation(
            "relationship is frozen during cooling-off",
        ));
    }
    Ok(())
}

// =============================================================================
// ADVANCEMENT
// =============================================================================

/// Re-evaluate the current stage and advance if fully satisfied.
fn check_advancement<M: MetricsSource>(
    record: &mut Relationship,
    metrics: &M,
    now_ms: u64,
) -> Result<Vec<EngineEvent>, KinshipError> {
    let evaluation = RequirementEvaluator::evaluate(record, metrics);
    if !evaluation.stale {
        evaluation.apply_to(record, now_ms);
    }
    if !record.all_requirements_complete() || record.current_stage.is_terminal() {
        return Ok(Vec::new());
    }
    advance(record, metrics, now_ms)
}

/// Perform exactly one forward transition.
///
/// Callers have established that every requirement of the current stage is
/// complete and the relationship is neither frozen nor ended.
fn advance<M: MetricsSource>(
    record: &mut Relationship,
    metrics: &M,
    now_ms: u64,
) -> Result<Vec<EngineEvent>, KinshipError> {
    let current = record.current_stage;
    let Some(next) = current.next() else {
        return Ok(Vec::new());
    };
    if next.index() != current.index() + 1 {
        return Err(KinshipError::InvariantViolation(format!(
            "transition {current} -> {next} is not a single forward step",
        )));
    }

    // Gather journey stats before the checklist is replaced.
    let stats = journey_stats(record, metrics);

    record.enter_stage(next);

    if next.is_terminal() {
        Ok(vec![EngineEvent::JourneyCompleted {
            relationship: record.id,
            stats,
            at_ms: now_ms,
        }])
    } else {
        Ok(vec![EngineEvent::StageTransitioned {
            relationship: record.id,
            from: current,
            to: next,
            at_ms: now_ms,
        }])
    }
}

/// Cumulative statistics for the journey-completed milestone.
///
/// Prefers a live snapshot, falling back to the record's persisted values so
/// an unreachable metrics source cannot zero the milestone.
fn journey_stats<M: MetricsSource>(record: &Relationship, metrics: &M) -> JourneyStats {
    let snapshot = metrics.snapshot(record.id).ok().unwrap_or_default();
    let mut stats = JourneyStats {
        days_together: snapshot.active_days,
        activities_completed: snapshot.activities_completed,
        calls_completed: snapshot.calls_completed,
    };
    for state in &record.requirements {
        if let Some(spec) = catalog::spec(state.id) {
            if let CompletionMode::Automatic { metric, .. } = spec.mode {
                match metric {
                    MetricKind::ActiveDays => {
                        stats.days_together = stats.days_together.max(state.current_value);
                    }
                    MetricKind::ActivitiesCompleted => {
                        stats.activities_completed =
                            stats.activities_completed.max(state.current_value);
                    }
                    MetricKind::CallsCompleted => {
                        stats.calls_completed = stats.calls_completed.max(state.current_value);
                    }
                }
            }
        }
    }
    stats
}

// =============================================================================
// TESTS
// =============================================================================
