//! # Attestation Ledger
//!
//! Manual requirements are satisfied only by both parties independently
//! attesting that the offline condition was met. A sign-off is declarative —
//! the system cannot verify it — so the control is structural: one party
//! alone can never complete a requirement ("honesty policy").
//!
//! The ledger is append-only. A party signs a given requirement at most
//! once; re-signing is a no-op that reports current status, never an error,
//! so client retries are harmless.

use crate::relationship::RequirementState;
use crate::types::{PartyId, PartyRole, RequirementId};
use serde::{Deserialize, Serialize};

// =============================================================================
// ATTESTATION RECORD
// =============================================================================

/// One party's recorded sign-off for one manual requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub requirement: RequirementId,
    pub party: PartyId,
    pub signed_at_ms: u64,
}

// =============================================================================
// SIGNING STATUS
// =============================================================================

/// Outcome of a sign-off call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningStatus {
    /// The caller's attestation is recorded; the partner has not signed.
    WaitingForPartner,
    /// Both parties have now signed — this is the completion moment.
    Completed,
    /// The requirement was already complete before this call.
    AlreadyCompleted,
}

impl SigningStatus {
    /// Stable wire name.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            SigningStatus::WaitingForPartner => "waiting_for_partner",
            SigningStatus::Completed => "completed",
            SigningStatus::AlreadyCompleted => "already_completed",
        }
    }
}

// =============================================================================
// SIGN-OFF APPLICATION
// =============================================================================

/// Apply one party's sign-off to a requirement state.
///
/// Returns the resulting status plus the ledger entry to append (only on a
/// first-time signature). Completion latches: once both flags are set the
/// state never reverts, and `completed_at_ms` records the moment the second
/// signature landed.
pub fn apply_sign_off(
    state: &mut RequirementState,
    role: PartyRole,
    party: PartyId,
    now_ms: u64,
) -> (SigningStatus, Option<Attestation>) {
    if state.completed {
        return (SigningStatus::AlreadyCompleted, None);
    }

    if state.signed_at(role).is_some() {
        // Idempotent retry: nothing to append, report where things stand.
        return (SigningStatus::WaitingForPartner, None);
    }

    state.mark_signed(role, now_ms);
    let entry = Attestation {
        requirement: state.id,
        party,
        signed_at_ms: now_ms,
    };

    if state.signed_at(role.partner()).is_some() {
        state.completed = true;
        state.completed_at_ms = Some(now_ms);
        (SigningStatus::Completed, Some(entry))
    } else {
        (SigningStatus::WaitingForPartner, Some(entry))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequirementId;

    fn fresh_state() -> RequirementState {
        RequirementState::manual(RequirementId(2))
    }

    #[test]
    fn first_signature_waits_for_partner() {
        let mut state = fresh_state();
        let (status, entry) =
            apply_sign_off(&mut state, PartyRole::Initiator, PartyId(1), 100);
        assert_eq!(status, SigningStatus::WaitingForPartner);
        assert!(entry.is_some());
        assert!(!state.completed);
    }

    #[test]
    fn second_signature_completes() {
        let mut state = fresh_state();
        apply_sign_off(&mut state, PartyRole::Initiator, PartyId(1), 100);
        let (status, entry) =
            apply_sign_off(&mut state, PartyRole::Recipient, PartyId(2), 200);
        assert_eq!(status, SigningStatus::Completed);
        assert!(entry.is_some());
        assert!(state.completed);
        assert_eq!(state.completed_at_ms, Some(200));
    }

    #[test]
    fn re_sign_is_noop_without_ledger_entry() {
        let mut state = fresh_state();
        apply_sign_off(&mut state, PartyRole::Initiator, PartyId(1), 100);
        let (status, entry) =
            apply_sign_off(&mut state, PartyRole::Initiator, PartyId(1), 150);
        assert_eq!(status, SigningStatus::WaitingForPartner);
        assert!(entry.is_none());
        assert_eq!(state.initiator_signed_at_ms, Some(100));
    }

    #[test]
    fn sign_after_completion_reports_already_completed() {
        let mut state = fresh_state();
        apply_sign_off(&mut state, PartyRole::Initiator, PartyId(1), 100);
        apply_sign_off(&mut state, PartyRole::Recipient, PartyId(2), 200);
        let (status, entry) =
            apply_sign_off(&mut state, PartyRole::Initiator, PartyId(1), 300);
        assert_eq!(status, SigningStatus::AlreadyCompleted);
        assert!(entry.is_none());
        // Completion latched at the original moment.
        assert_eq!(state.completed_at_ms, Some(200));
    }
}
