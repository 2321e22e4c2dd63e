//! # Core Type Definitions
//!
//! This module contains the shared types for the Kinship progression engine:
//! - Identifiers (`RelationshipId`, `PartyId`, `RequirementId`)
//! - Party roles (`PartyRole`)
//! - Logical events emitted by the engine (`EngineEvent`, `JourneyStats`)
//! - Error types (`KinshipError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Carry explicit `u64` Unix-epoch-millisecond timestamps supplied by the
//!   caller; the engine never reads a clock

use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier for a relationship between two matched parties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationshipId(pub u64);

/// Unique identifier for one party (a person) in a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartyId(pub u64);

/// Catalog-assigned identifier for a stage requirement.
///
/// Requirement identities are static: they are assigned by the catalog
/// (`catalog` module) and never generated at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequirementId(pub u32);

// =============================================================================
// PARTY ROLE
// =============================================================================

/// Role of a party within a relationship.
///
/// The initiator is the younger party who applied for the match; the
/// recipient is the older party. Roles are fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PartyRole {
    /// The younger party (applied for the match).
    Initiator,
    /// The older party (accepted the match).
    Recipient,
}

impl PartyRole {
    /// Get the other role.
    #[must_use]
    pub const fn partner(self) -> Self {
        match self {
            PartyRole::Initiator => PartyRole::Recipient,
            PartyRole::Recipient => PartyRole::Initiator,
        }
    }
}

// =============================================================================
// ENGINE EVENTS
// =============================================================================

/// Cumulative statistics carried by the journey-completed milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct JourneyStats {
    /// Days the relationship had qualifying activity.
    pub days_together: u64,
    /// Completed shared activities over the whole journey.
    pub activities_completed: u64,
    /// Completed calls over the whole journey.
    pub calls_completed: u64,
}

/// A logical event emitted by the engine, exactly once per transition.
///
/// The engine returns events to the caller; delivering them (notifications,
/// webhooks) is the caller's concern. There is no ambient observer wiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The relationship advanced one stage forward.
    StageTransitioned {
        relationship: RelationshipId,
        from: Stage,
        to: Stage,
        at_ms: u64,
    },
    /// The terminal requirement set was satisfied; the journey is complete.
    ///
    /// Distinct from an ordinary stage transition: carries cumulative stats.
    JourneyCompleted {
        relationship: RelationshipId,
        stats: JourneyStats,
        at_ms: u64,
    },
    /// A party requested withdrawal; the relationship is now frozen.
    WithdrawalStarted {
        relationship: RelationshipId,
        requested_by: PartyId,
        at_ms: u64,
    },
    /// The cooling-off window lapsed with no end signal; progress resumed.
    CoolingOffResumed {
        relationship: RelationshipId,
        at_ms: u64,
    },
    /// The withdrawing party followed through; the relationship ended.
    RelationshipEnded {
        relationship: RelationshipId,
        at_ms: u64,
    },
}

impl EngineEvent {
    /// Stable wire name of the event, for logging and dispatch.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::StageTransitioned { .. } => "stage_transitioned",
            EngineEvent::JourneyCompleted { .. } => "journey_completed",
            EngineEvent::WithdrawalStarted { .. } => "withdrawal_started",
            EngineEvent::CoolingOffResumed { .. } => "cooling_off_resumed",
            EngineEvent::RelationshipEnded { .. } => "relationship_ended",
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Kinship engine.
///
/// - No silent failures
/// - Use `Result<T, KinshipError>` for fallible operations
/// - The engine should never panic; all errors must be recoverable
#[derive(Debug, Error)]
pub enum KinshipError {
    /// The request is invalid against the relationship's current state.
    /// Rejected synchronously; not retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Optimistic version mismatch on a conditional store update.
    /// The caller re-reads and retries; not a user-facing failure.
    #[error("Conflicting concurrent update")]
    Conflict,

    /// The external activity/metrics source is unreachable. Automatic
    /// requirements fall back to last-known values, marked stale.
    #[error("Upstream metrics source unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A correctness invariant would be violated (stage regression, nested
    /// cooling-off, frozen without a period). Indicates a bug upstream;
    /// logged and aborted, never swallowed.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The requested relationship does not exist.
    #[error("Relationship not found")]
    NotFound,

    /// An I/O error occurred in the storage layer.
    #[error("I/O error: {0}")]
    Io(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl KinshipError {
    /// Build a validation error from any displayable message.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

// =============================================================================
// TESTS
// =============================================================================
