//! # kinship-core
//!
//! The deterministic Relationship Stage Progression Engine - THE LOGIC.
//!
//! This crate decides which stage a supervised companionship relationship is
//! in, what must happen before it can advance, how dual-party attestations
//! are recorded, how a withdrawal freezes progress behind a 24-hour
//! cooling-off window, and which capabilities are unlocked at each stage.
//!
//! ## Architectural Constraints
//!
//! The engine:
//! - Is the ONLY place where relationship state is mutated
//! - Is closed: no external logic may be injected
//! - Has NO async, NO network dependencies, NO wall clock (pure Rust;
//!   callers supply `now_ms`)
//! - Uses optimistic versioned writes so mutations execute as if serialized
//!   per relationship
//! - Returns explicit event lists instead of notifying observers
//!
//! Everything around it (chat transport, media storage, calendars, admin
//! review) is an external collaborator that reads from or writes to this
//! engine through the store, the metrics source, or the HTTP binary.

// =============================================================================
// MODULES
// =============================================================================

pub mod attestation;
pub mod catalog;
pub mod cooling_off;
pub mod engine;
pub mod evaluator;
pub mod features;
pub mod metrics;
pub mod relationship;
pub mod stage;
pub mod storage;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    EngineEvent, JourneyStats, KinshipError, PartyId, PartyRole, RelationshipId, RequirementId,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use attestation::{Attestation, SigningStatus};
pub use engine::{
    CoolingOffStatus, EndOutcome, FeatureSet, MAX_CONFLICT_RETRIES, ProgressionEngine,
    RefreshOutcome, SignOffOutcome, StatusReport, WithdrawalOutcome,
};
pub use evaluator::{Evaluation, RequirementEvaluator, RequirementProgress};
pub use relationship::{Relationship, RequirementState};

// =============================================================================
// RE-EXPORTS: Stages, Catalog, Features
// =============================================================================

pub use catalog::{CompletionMode, MAX_REASON_LENGTH, RequirementSpec};
pub use cooling_off::{COOLING_OFF_DURATION_MS, CoolingOffPeriod, CoolingOffResolution};
pub use features::{FEATURE_UNLOCKS, FeatureKey};
pub use stage::{STAGE_ORDER, Stage, StageProgress};

// =============================================================================
// RE-EXPORTS: Storage
// =============================================================================

pub use metrics::{ActivitySnapshot, MetricKind, MetricsSource, RecordedMetrics};
pub use storage::RedbStore;
pub use store::{MemoryStore, RelationshipStore, StoreBackend};
