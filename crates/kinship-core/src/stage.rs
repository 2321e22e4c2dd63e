//! # Relationship Stages
//!
//! The ordered, closed set of stages a relationship advances through:
//!
//! | Stage | Name | Behavior |
//! |-------|------|----------|
//! | `GettingToKnow` | Getting to Know | Entry stage for an approved match |
//! | `TrialPeriod` | Trial Period | Supervised day-to-day companionship |
//! | `OfficialCeremony` | Official Ceremony | Formal bond preparation |
//! | `FamilyLife` | Family Life | Long-term bond |
//! | `JourneyCompleted` | Journey Completed | Terminal milestone marker |
//!
//! The chain is a single forward-only line: no branching, no cycles, and a
//! relationship's stage index never decreases. Stage-gated capabilities are
//! resolved in the `features` module; advancement rules live in `engine`.

use serde::{Deserialize, Serialize};

// =============================================================================
// STAGE ENUM
// =============================================================================

/// One ordered phase of the relationship lifecycle.
///
/// Derives `Ord` so stage comparisons (`>=` for unlock checks, monotonicity
/// guards) follow declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// First contact under supervision.
    GettingToKnow,
    /// Regular shared activity before any formal step.
    TrialPeriod,
    /// The formal bond is prepared and held.
    OfficialCeremony,
    /// The long-term bond.
    FamilyLife,
    /// Terminal marker: the full journey has been completed.
    JourneyCompleted,
}

/// All stages in advancement order, terminal marker last.
pub const STAGE_ORDER: [Stage; 5] = [
    Stage::GettingToKnow,
    Stage::TrialPeriod,
    Stage::OfficialCeremony,
    Stage::FamilyLife,
    Stage::JourneyCompleted,
];

impl Stage {
    /// Get the human-readable stage name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Stage::GettingToKnow => "Getting to Know",
            Stage::TrialPeriod => "Trial Period",
            Stage::OfficialCeremony => "Official Ceremony",
            Stage::FamilyLife => "Family Life",
            Stage::JourneyCompleted => "Journey Completed",
        }
    }

    /// Stable wire name (snake_case), matching the serde representation.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Stage::GettingToKnow => "getting_to_know",
            Stage::TrialPeriod => "trial_period",
            Stage::OfficialCeremony => "official_ceremony",
            Stage::FamilyLife => "family_life",
            Stage::JourneyCompleted => "journey_completed",
        }
    }

    /// Parse a wire name back into a stage.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Stage> {
        STAGE_ORDER.into_iter().find(|s| s.key() == key)
    }

    /// Position of this stage in the forward-only chain.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Stage::GettingToKnow => 0,
            Stage::TrialPeriod => 1,
            Stage::OfficialCeremony => 2,
            Stage::FamilyLife => 3,
            Stage::JourneyCompleted => 4,
        }
    }

    /// Get the next stage, if any.
    #[must_use]
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::GettingToKnow => Some(Stage::TrialPeriod),
            Stage::TrialPeriod => Some(Stage::OfficialCeremony),
            Stage::OfficialCeremony => Some(Stage::FamilyLife),
            Stage::FamilyLife => Some(Stage::JourneyCompleted),
            Stage::JourneyCompleted => None,
        }
    }

    /// Check if this stage is the terminal milestone marker.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::JourneyCompleted)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// STAGE PROGRESS
// =============================================================================

/// Progress within the current stage, as shown on a checklist header.
///
/// `percent` is `completed / total * 100` rounded down to an integer. While
/// the relationship is frozen the percentage is the snapshot captured at
/// freeze time, not a recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    pub current: Stage,
    pub next: Option<Stage>,
    pub percent: u8,
    pub completed_requirements: usize,
    pub total_requirements: usize,
}

impl StageProgress {
    /// Compute progress from a completed/total requirement count.
    #[must_use]
    pub fn from_counts(current: Stage, completed: usize, total: usize) -> Self {
        Self {
            current,
            next: current.next(),
            percent: percent_of(completed, total),
            completed_requirements: completed,
            total_requirements: total,
        }
    }

    /// Progress for the terminal stage: always 100%.
    #[must_use]
    pub fn terminal() -> Self {
        Self {
            current: Stage::JourneyCompleted,
            next: None,
            percent: 100,
            completed_requirements: 0,
            total_requirements: 0,
        }
    }
}

/// Integer percentage, saturating at 100. A stage with no registered
/// requirements reads as fully complete.
#[must_use]
pub fn percent_of(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let scaled = (completed as u64).saturating_mul(100) / (total as u64);
    scaled.min(100) as u8
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_ordering() {
        assert!(Stage::GettingToKnow < Stage::TrialPeriod);
        assert!(Stage::TrialPeriod < Stage::OfficialCeremony);
        assert!(Stage::OfficialCeremony < Stage::FamilyLife);
        assert!(Stage::FamilyLife < Stage::JourneyCompleted);
    }

    #[test]
    fn chain_is_linear_and_terminal() {
        let mut stage = Stage::GettingToKnow;
        let mut hops = 0;
        while let Some(next) = stage.next() {
            assert_eq!(next.index(), stage.index() + 1);
            stage = next;
            hops += 1;
        }
        assert_eq!(hops, 4);
        assert!(stage.is_terminal());
    }

    #[test]
    fn keys_round_trip() {
        for stage in STAGE_ORDER {
            assert_eq!(Stage::from_key(stage.key()), Some(stage));
        }
        assert_eq!(Stage::from_key("honeymoon"), None);
    }

    #[test]
    fn percent_is_integer_and_saturating() {
        assert_eq!(percent_of(0, 4), 0);
        assert_eq!(percent_of(1, 4), 25);
        assert_eq!(percent_of(2, 3), 66);
        assert_eq!(percent_of(3, 3), 100);
        assert_eq!(percent_of(5, 3), 100);
        assert_eq!(percent_of(0, 0), 100);
    }

    #[test]
    fn stage_display() {
        assert_eq!(format!("{}", Stage::GettingToKnow), "Getting to Know");
        assert_eq!(format!("{}", Stage::JourneyCompleted), "Journey Completed");
    }
}
