//! # Requirement Catalog
//!
//! The static catalog of stage requirements: which requirements belong to
//! which stage, their completion mode, and automatic thresholds.
//!
//! Catalog data is immutable at runtime. Requirement identities
//! ([`RequirementId`]) are assigned here and never generated elsewhere, so
//! persisted records stay meaningful across releases.

use crate::metrics::MetricKind;
use crate::stage::Stage;
use crate::types::RequirementId;
use serde::{Deserialize, Serialize};

// =============================================================================
// VALIDATION BOUNDS
// =============================================================================

/// Maximum byte length of a withdrawal reason accepted at the boundary.
pub const MAX_REASON_LENGTH: usize = 1024;

// =============================================================================
// COMPLETION MODE
// =============================================================================

/// How a requirement is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionMode {
    /// Satisfied by an objectively measured external fact reaching a
    /// threshold (counts, elapsed active days).
    Automatic {
        metric: MetricKind,
        required_value: u64,
    },
    /// Satisfied only by both parties independently attesting it occurred.
    Manual,
}

impl CompletionMode {
    /// Stable wire name of the mode.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            CompletionMode::Automatic { .. } => "automatic",
            CompletionMode::Manual => "manual",
        }
    }
}

// =============================================================================
// REQUIREMENT SPEC
// =============================================================================

/// One catalog entry: a requirement registered for exactly one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequirementSpec {
    pub id: RequirementId,
    pub stage: Stage,
    pub mode: CompletionMode,
    pub label: &'static str,
}

const fn automatic(
    id: u32,
    stage: Stage,
    metric: MetricKind,
    required_value: u64,
    label: &'static str,
) -> RequirementSpec {
    RequirementSpec {
        id: RequirementId(id),
        stage,
        mode: CompletionMode::Automatic {
            metric,
            required_value,
        },
        label,
    }
}

const fn manual(id: u32, stage: Stage, label: &'static str) -> RequirementSpec {
    RequirementSpec {
        id: RequirementId(id),
        stage,
        mode: CompletionMode::Manual,
        label,
    }
}

// =============================================================================
// THE CATALOG
// =============================================================================

static GETTING_TO_KNOW: [RequirementSpec; 2] = [
    automatic(
        1,
        Stage::GettingToKnow,
        MetricKind::ActiveDays,
        7,
        "7 days of shared activity",
    ),
    manual(2, Stage::GettingToKnow, "Met in person"),
];

static TRIAL_PERIOD: [RequirementSpec; 4] = [
    automatic(
        10,
        Stage::TrialPeriod,
        MetricKind::ActiveDays,
        30,
        "30 days of shared activity",
    ),
    automatic(
        11,
        Stage::TrialPeriod,
        MetricKind::ActivitiesCompleted,
        5,
        "5 shared activities completed",
    ),
    automatic(
        12,
        Stage::TrialPeriod,
        MetricKind::CallsCompleted,
        3,
        "3 calls completed",
    ),
    manual(13, Stage::TrialPeriod, "Home visit"),
];

static OFFICIAL_CEREMONY: [RequirementSpec; 3] = [
    automatic(
        20,
        Stage::OfficialCeremony,
        MetricKind::ActivitiesCompleted,
        6,
        "Ceremony planning activity completed",
    ),
    manual(21, Stage::OfficialCeremony, "Ceremony held"),
    manual(22, Stage::OfficialCeremony, "Both families informed"),
];

static FAMILY_LIFE: [RequirementSpec; 2] = [
    automatic(
        30,
        Stage::FamilyLife,
        MetricKind::ActiveDays,
        365,
        "A full year of shared activity",
    ),
    manual(31, Stage::FamilyLife, "First anniversary celebrated"),
];

/// Get the requirement set registered for a stage.
///
/// The terminal marker stage has no requirements: reaching it IS the
/// terminal milestone.
#[must_use]
pub fn requirements_for(stage: Stage) -> &'static [RequirementSpec] {
    match stage {
        Stage::GettingToKnow => &GETTING_TO_KNOW,
        Stage::TrialPeriod => &TRIAL_PERIOD,
        Stage::OfficialCeremony => &OFFICIAL_CEREMONY,
        Stage::FamilyLife => &FAMILY_LIFE,
        Stage::JourneyCompleted => &[],
    }
}

/// Look up a requirement spec by id, across all stages.
#[must_use]
pub fn spec(id: RequirementId) -> Option<&'static RequirementSpec> {
    crate::stage::STAGE_ORDER
        .iter()
        .flat_map(|stage| requirements_for(*stage).iter())
        .find(|spec| spec.id == id)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::STAGE_ORDER;
    use std::collections::BTreeSet;

    #[test]
    fn catalog_ids_are_unique() {
        let mut seen = BTreeSet::new();
        for stage in STAGE_ORDER {
            for spec in requirements_for(stage) {
                assert!(seen.insert(spec.id), "duplicate id {:?}", spec.id);
            }
        }
    }

    #[test]
    fn every_spec_belongs_to_its_stage() {
        for stage in STAGE_ORDER {
            for spec in requirements_for(stage) {
                assert_eq!(spec.stage, stage);
            }
        }
    }

    #[test]
    fn every_non_terminal_stage_has_a_manual_requirement() {
        // The single-transition-per-operation rule in the engine relies on a
        // freshly-entered stage never being instantly complete.
        for stage in STAGE_ORDER.iter().filter(|s| !s.is_terminal()) {
            assert!(
                requirements_for(*stage)
                    .iter()
                    .any(|spec| spec.mode == CompletionMode::Manual),
                "{stage} has no manual requirement"
            );
        }
    }

    #[test]
    fn terminal_stage_has_no_requirements() {
        assert!(requirements_for(Stage::JourneyCompleted).is_empty());
    }

    #[test]
    fn spec_lookup_by_id() {
        let found = spec(RequirementId(13)).expect("home visit");
        assert_eq!(found.stage, Stage::TrialPeriod);
        assert_eq!(found.mode, CompletionMode::Manual);
        assert!(spec(RequirementId(999)).is_none());
    }

    #[test]
    fn trial_period_has_four_requirements() {
        assert_eq!(requirements_for(Stage::TrialPeriod).len(), 4);
    }
}
