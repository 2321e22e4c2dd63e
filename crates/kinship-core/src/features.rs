//! # Feature Unlock Resolver
//!
//! Pure mapping from (current stage, freeze status) to the set of product
//! capabilities enabled for a relationship. Every consuming surface (chat,
//! calls, album, scheduling) queries [`resolve`] before allowing an action.
//!
//! While a relationship is frozen, everything outside the family-advisor
//! channel is disabled for both parties, regardless of stage.

use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// FEATURE KEYS
// =============================================================================

/// A product capability gated by relationship stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKey {
    /// Communication with the supervising family advisor. Always unlocked,
    /// and the only capability available while frozen.
    AdvisorChannel,
    TextMessaging,
    VoiceCall,
    PhotoSharing,
    Scheduling,
    VideoCall,
    SharedDiary,
}

/// The immutable unlock table: capability → minimum stage.
pub const FEATURE_UNLOCKS: [(FeatureKey, Stage); 7] = [
    (FeatureKey::AdvisorChannel, Stage::GettingToKnow),
    (FeatureKey::TextMessaging, Stage::GettingToKnow),
    (FeatureKey::VoiceCall, Stage::TrialPeriod),
    (FeatureKey::PhotoSharing, Stage::TrialPeriod),
    (FeatureKey::Scheduling, Stage::TrialPeriod),
    (FeatureKey::VideoCall, Stage::OfficialCeremony),
    (FeatureKey::SharedDiary, Stage::FamilyLife),
];

impl FeatureKey {
    /// Stable wire name (snake_case), matching the serde representation.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            FeatureKey::AdvisorChannel => "advisor_channel",
            FeatureKey::TextMessaging => "text_messaging",
            FeatureKey::VoiceCall => "voice_call",
            FeatureKey::PhotoSharing => "photo_sharing",
            FeatureKey::Scheduling => "scheduling",
            FeatureKey::VideoCall => "video_call",
            FeatureKey::SharedDiary => "shared_diary",
        }
    }

    /// Minimum stage at which this capability unlocks.
    #[must_use]
    pub fn unlock_stage(&self) -> Stage {
        match FEATURE_UNLOCKS.iter().find(|(key, _)| key == self) {
            Some((_, stage)) => *stage,
            // The table is total over the enum; keep lookup infallible.
            None => Stage::JourneyCompleted,
        }
    }
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// Resolve the unlocked capability set.
///
/// Pure: no side effects, no I/O. Callers must read `stage` and `is_frozen`
/// from the same relationship record read — caching the result across a
/// transition boundary would gate actions against a stale stage.
#[must_use]
pub fn resolve(stage: Stage, is_frozen: bool) -> BTreeSet<FeatureKey> {
    if is_frozen {
        return BTreeSet::from([FeatureKey::AdvisorChannel]);
    }
    FEATURE_UNLOCKS
        .iter()
        .filter(|(_, unlock)| *unlock <= stage)
        .map(|(key, _)| *key)
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frozen_resolves_to_advisor_only() {
        for stage in crate::stage::STAGE_ORDER {
            let set = resolve(stage, true);
            assert_eq!(set, BTreeSet::from([FeatureKey::AdvisorChannel]));
        }
    }

    #[test]
    fn entry_stage_unlocks_messaging_and_advisor() {
        let set = resolve(Stage::GettingToKnow, false);
        assert_eq!(
            set,
            BTreeSet::from([FeatureKey::AdvisorChannel, FeatureKey::TextMessaging])
        );
    }

    #[test]
    fn unlocks_are_cumulative() {
        let trial = resolve(Stage::TrialPeriod, false);
        let ceremony = resolve(Stage::OfficialCeremony, false);
        assert!(trial.is_subset(&ceremony));
        assert!(ceremony.contains(&FeatureKey::VideoCall));
        assert!(!trial.contains(&FeatureKey::VideoCall));
    }

    #[test]
    fn terminal_stage_unlocks_everything() {
        let set = resolve(Stage::JourneyCompleted, false);
        assert_eq!(set.len(), FEATURE_UNLOCKS.len());
    }

    #[test]
    fn unlock_stage_matches_table() {
        assert_eq!(FeatureKey::SharedDiary.unlock_stage(), Stage::FamilyLife);
        assert_eq!(FeatureKey::AdvisorChannel.unlock_stage(), Stage::GettingToKnow);
    }
}
