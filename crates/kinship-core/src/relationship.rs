//! # Relationship Record
//!
//! The persistent record the engine reads and conditionally writes: parties,
//! current stage, per-requirement progress, the attestation ledger, freeze
//! state and cooling-off history, plus the optimistic version counter.
//!
//! A relationship is never deleted, only superseded: it either reaches the
//! terminal milestone stage or is marked `ended` after a followed-through
//! withdrawal.

use crate::attestation::Attestation;
use crate::catalog;
use crate::cooling_off::CoolingOffPeriod;
use crate::stage::{Stage, StageProgress, percent_of};
use crate::types::{PartyId, PartyRole, RequirementId};
use serde::{Deserialize, Serialize};

// =============================================================================
// REQUIREMENT STATE
// =============================================================================

/// Per-relationship progress against one catalog requirement.
///
/// `current_value` is meaningful for automatic requirements only; the
/// signature timestamps for manual ones. `completed` latches: once true it
/// never reverts, regardless of later metric reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementState {
    pub id: RequirementId,
    pub current_value: u64,
    pub initiator_signed_at_ms: Option<u64>,
    pub recipient_signed_at_ms: Option<u64>,
    pub completed: bool,
    pub completed_at_ms: Option<u64>,
}

impl RequirementState {
    /// Fresh state for a catalog requirement.
    #[must_use]
    pub fn new(id: RequirementId) -> Self {
        Self {
            id,
            current_value: 0,
            initiator_signed_at_ms: None,
            recipient_signed_at_ms: None,
            completed: false,
            completed_at_ms: None,
        }
    }

    /// Fresh manual-requirement state (identical shape; named for tests).
    #[must_use]
    pub fn manual(id: RequirementId) -> Self {
        Self::new(id)
    }

    /// When the given role signed, if it has.
    #[must_use]
    pub fn signed_at(&self, role: PartyRole) -> Option<u64> {
        match role {
            PartyRole::Initiator => self.initiator_signed_at_ms,
            PartyRole::Recipient => self.recipient_signed_at_ms,
        }
    }

    /// Record the given role's signature timestamp.
    pub fn mark_signed(&mut self, role: PartyRole, now_ms: u64) {
        match role {
            PartyRole::Initiator => self.initiator_signed_at_ms = Some(now_ms),
            PartyRole::Recipient => self.recipient_signed_at_ms = Some(now_ms),
        }
    }
}

// =============================================================================
// RELATIONSHIP
// =============================================================================

/// The persistent relationship record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: crate::types::RelationshipId,
    /// The younger party (applied for the match).
    pub initiator: PartyId,
    /// The older party (accepted the match).
    pub recipient: PartyId,
    pub current_stage: Stage,
    pub created_at_ms: u64,
    pub is_frozen: bool,
    /// Progress percentage snapshot taken at the moment of withdrawal.
    pub frozen_at_progress_percent: Option<u8>,
    /// The active cooling-off window, if any.
    pub cooling_off: Option<CoolingOffPeriod>,
    /// Resolved windows, oldest first, retained for audit.
    pub cooling_off_history: Vec<CoolingOffPeriod>,
    /// Terminal flag: an ended relationship accepts no further mutations.
    pub ended: bool,
    /// Requirement states for the current stage, in catalog order.
    pub requirements: Vec<RequirementState>,
    /// Append-only sign-off ledger across all stages.
    pub attestations: Vec<Attestation>,
    /// Optimistic concurrency version, bumped by the store on every write.
    pub version: u64,
}

impl Relationship {
    /// Create a new relationship in the entry stage.
    ///
    /// Called when a match's application is approved by the external review
    /// process. The entry stage's requirement checklist is initialized
    /// immediately so there is something to render from the first read.
    #[must_use]
    pub fn new(
        id: crate::types::RelationshipId,
        initiator: PartyId,
        recipient: PartyId,
        created_at_ms: u64,
    ) -> Self {
        Self {
            id,
            initiator,
            recipient,
            current_stage: Stage::GettingToKnow,
            created_at_ms,
            is_frozen: false,
            frozen_at_progress_percent: None,
            cooling_off: None,
            cooling_off_history: Vec::new(),
            ended: false,
            requirements: stage_requirement_states(Stage::GettingToKnow),
            attestations: Vec::new(),
            version: 0,
        }
    }

    /// Which role a party holds, if it is a party at all.
    #[must_use]
    pub fn role_of(&self, party: PartyId) -> Option<PartyRole> {
        if party == self.initiator {
            Some(PartyRole::Initiator)
        } else if party == self.recipient {
            Some(PartyRole::Recipient)
        } else {
            None
        }
    }

    /// Requirement state by id within the current stage.
    #[must_use]
    pub fn requirement(&self, id: RequirementId) -> Option<&RequirementState> {
        self.requirements.iter().find(|state| state.id == id)
    }

    /// Mutable requirement state by id within the current stage.
    pub fn requirement_mut(&mut self, id: RequirementId) -> Option<&mut RequirementState> {
        self.requirements.iter_mut().find(|state| state.id == id)
    }

    /// Count of completed requirements in the current stage.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.requirements.iter().filter(|state| state.completed).count()
    }

    /// Whether every requirement of the current stage is complete.
    #[must_use]
    pub fn all_requirements_complete(&self) -> bool {
        self.requirements.iter().all(|state| state.completed)
    }

    /// Live progress percentage, ignoring the freeze snapshot.
    #[must_use]
    pub fn computed_progress_percent(&self) -> u8 {
        if self.current_stage.is_terminal() {
            return 100;
        }
        percent_of(self.completed_count(), self.requirements.len())
    }

    /// Displayed progress percentage. Frozen relationships report the
    /// snapshot captured at withdrawal time, not a recomputation.
    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        if self.is_frozen {
            if let Some(snapshot) = self.frozen_at_progress_percent {
                return snapshot;
            }
        }
        self.computed_progress_percent()
    }

    /// Stage progress summary for display.
    #[must_use]
    pub fn progress(&self) -> StageProgress {
        if self.current_stage.is_terminal() {
            return StageProgress::terminal();
        }
        let mut progress = StageProgress::from_counts(
            self.current_stage,
            self.completed_count(),
            self.requirements.len(),
        );
        progress.percent = self.progress_percent();
        progress
    }

    /// Replace the checklist with fresh states for `stage`.
    ///
    /// The caller (the engine) is responsible for the monotonicity guard;
    /// this method only swaps the requirement set.
    pub fn enter_stage(&mut self, stage: Stage) {
        self.current_stage = stage;
        self.requirements = stage_requirement_states(stage);
    }
}

/// Fresh requirement states for every catalog entry of a stage.
#[must_use]
pub fn stage_requirement_states(stage: Stage) -> Vec<RequirementState> {
    catalog::requirements_for(stage)
        .iter()
        .map(|spec| RequirementState::new(spec.id))
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RelationshipId;

    fn record() -> Relationship {
        Relationship::new(RelationshipId(1), PartyId(10), PartyId(20), 0)
    }

    #[test]
    fn new_relationship_starts_at_entry_stage() {
        let record = record();
        assert_eq!(record.current_stage, Stage::GettingToKnow);
        assert_eq!(record.requirements.len(), 2);
        assert!(!record.is_frozen);
        assert!(!record.ended);
        assert_eq!(record.version, 0);
    }

    #[test]
    fn role_lookup() {
        let record = record();
        assert_eq!(record.role_of(PartyId(10)), Some(PartyRole::Initiator));
        assert_eq!(record.role_of(PartyId(20)), Some(PartyRole::Recipient));
        assert_eq!(record.role_of(PartyId(30)), None);
    }

    #[test]
    fn progress_percent_uses_freeze_snapshot() {
        let mut record = record();
        record.requirements[0].completed = true;
        assert_eq!(record.computed_progress_percent(), 50);

        record.is_frozen = true;
        record.frozen_at_progress_percent = Some(50);
        record.requirements[1].completed = true;
        // Live value would be 100; the snapshot wins while frozen.
        assert_eq!(record.progress_percent(), 50);

        record.is_frozen = false;
        assert_eq!(record.progress_percent(), 100);
    }

    #[test]
    fn enter_stage_resets_checklist() {
        let mut record = record();
        record.requirements[0].completed = true;
        record.enter_stage(Stage::TrialPeriod);
        assert_eq!(record.current_stage, Stage::TrialPeriod);
        assert_eq!(record.requirements.len(), 4);
        assert!(record.requirements.iter().all(|state| !state.completed));
    }

    #[test]
    fn terminal_stage_reads_complete() {
        let mut record = record();
        record.enter_stage(Stage::JourneyCompleted);
        assert_eq!(record.computed_progress_percent(), 100);
        assert_eq!(record.progress().percent, 100);
    }

    #[test]
    fn record_round_trips_through_postcard() {
        let record = record();
        let bytes = postcard::to_stdvec(&record).expect("serialize");
        let back: Relationship = postcard::from_bytes(&bytes).expect("deserialize");
        assert_eq!(back, record);
    }
}
