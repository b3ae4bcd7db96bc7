/******************************************************************************
 *                                                                            *
 * Quest Templates                                                            *
 *                                                                            *
 * Immutable quest definitions as they come out of the catalog, plus the     *
 * objective counter each accepted quest carries.                             *
 *                                                                            *
 ******************************************************************************/

use serde::{Deserialize, Serialize};

use crate::models::{ObjectiveKind, RewardKind, TrackId, ANY_TRACK};

// ============================================================================
// OBJECTIVE
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestObjective {
    pub kind: ObjectiveKind,
    /// Item or entity id the objective counts, e.g. `"minecraft:zombie"`.
    pub target: String,
    pub required: u32,
    #[serde(default)]
    pub progress: u32,
}

impl QuestObjective {
    pub fn new(kind: ObjectiveKind, target: impl Into<String>, required: u32) -> Self {
        Self { kind, target: target.into(), required, progress: 0 }
    }

    /// Adds `delta`, clamped at `required`. Non-positive deltas are ignored.
    /// Returns true if the recorded progress changed.
    pub fn update_progress(&mut self, delta: i64) -> bool {
        if delta <= 0 || self.progress >= self.required {
            return false;
        }
        let room = u64::from(self.required - self.progress);
        self.progress += (delta as u64).min(room) as u32;
        true
    }

    pub fn is_completed(&self) -> bool {
        self.progress >= self.required
    }

    /// `progress / required` clamped to [0, 1].
    pub fn progress_percentage(&self) -> f32 {
        if self.required == 0 {
            return 0.0;
        }
        (self.progress as f32 / self.required as f32).min(1.0)
    }

    /// True when a reported action counts toward this objective.
    pub fn matches(&self, kind: ObjectiveKind, target: &str) -> bool {
        self.kind == kind && self.target == target
    }
}

// ============================================================================
// REWARD
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardItem {
    pub item: String,
    pub amount: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestReward {
    pub kind: RewardKind,
    #[serde(default = "default_tier")]
    pub tier: u8,
    #[serde(default)]
    pub quantity: u32,
    /// Extra items handed to the host on completion, whatever the kind.
    #[serde(default)]
    pub items: Vec<RewardItem>,
}

fn default_tier() -> u8 {
    1
}

impl QuestReward {
    pub fn experience(quantity: u32) -> Self {
        Self { kind: RewardKind::Experience, tier: 1, quantity, items: Vec::new() }
    }

    pub fn skill_point_tokens(tier: u8, quantity: u32) -> Self {
        Self { kind: RewardKind::SkillPointToken, tier, quantity, items: Vec::new() }
    }

    /// Token item id for this reward's tier. Unknown tiers fall back to tier 1.
    pub fn token_item(&self) -> &'static str {
        match self.tier {
            2 => "origins:skill_point_token_tier2",
            3 => "origins:skill_point_token_tier3",
            _ => "origins:skill_point_token_tier1",
        }
    }
}

/// Default experience for a tier when a catalog entry leaves `quantity` out.
pub fn default_experience_for_tier(tier: u8) -> u32 {
    match tier {
        2 => 1000,
        3 => 1500,
        _ => 500,
    }
}

// ============================================================================
// QUEST
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub id: String,
    pub track: TrackId,
    #[serde(default = "default_min_level")]
    pub min_level: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub objective: QuestObjective,
    /// Seconds; 0 means no limit.
    #[serde(default)]
    pub time_limit_secs: u64,
    pub reward: QuestReward,
}

fn default_min_level() -> u32 {
    1
}

impl Quest {
    /// Load-time sanity check for catalog entries.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && self.objective.required > 0 && self.reward.quantity > 0
    }

    pub fn has_time_limit(&self) -> bool {
        self.time_limit_secs > 0
    }

    pub fn can_accept(&self, track: &str, level: u32) -> bool {
        (self.track == track || self.track == ANY_TRACK) && level >= self.min_level
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    pub(crate) fn kill_quest(id: &str, required: u32, time_limit_secs: u64) -> Quest {
        Quest {
            id: id.to_string(),
            track: "origins:warrior".to_string(),
            min_level: 1,
            title: "Cull the horde".to_string(),
            description: String::new(),
            objective: QuestObjective::new(ObjectiveKind::Kill, "minecraft:zombie", required),
            time_limit_secs,
            reward: QuestReward::experience(250),
        }
    }

    #[test]
    fn progress_clamps_at_required() {
        let mut objective = QuestObjective::new(ObjectiveKind::Collect, "minecraft:iron_ore", 5);
        assert!(objective.update_progress(3));
        assert!(objective.update_progress(10));
        assert_eq!(objective.progress, 5);
        assert!(objective.is_completed());
        assert!(!objective.update_progress(1));
        assert_eq!(objective.progress_percentage(), 1.0);
    }

    #[test]
    fn ignores_non_positive_deltas() {
        let mut objective = QuestObjective::new(ObjectiveKind::Craft, "minecraft:bread", 2);
        assert!(!objective.update_progress(0));
        assert!(!objective.update_progress(-3));
        assert_eq!(objective.progress, 0);
    }

    #[test]
    fn validity() {
        assert!(kill_quest("q", 10, 60).is_valid());
        assert!(!kill_quest("", 10, 60).is_valid());
        assert!(!kill_quest("q", 0, 60).is_valid());
        let mut no_reward = kill_quest("q", 10, 60);
        no_reward.reward.quantity = 0;
        assert!(!no_reward.is_valid());
    }

    #[test]
    fn acceptance_rules() {
        let mut quest = kill_quest("q", 10, 0);
        quest.min_level = 3;
        assert!(!quest.can_accept("origins:warrior", 2));
        assert!(quest.can_accept("origins:warrior", 3));
        assert!(!quest.can_accept("origins:cook", 9));
        quest.track = ANY_TRACK.to_string();
        assert!(quest.can_accept("origins:cook", 9));
    }

    #[test]
    fn token_tiers() {
        assert_eq!(QuestReward::skill_point_tokens(3, 1).token_item(), "origins:skill_point_token_tier3");
        assert_eq!(QuestReward::skill_point_tokens(7, 1).token_item(), "origins:skill_point_token_tier1");
        assert_eq!(default_experience_for_tier(2), 1000);
    }

    proptest! {
        #[test]
        fn completion_is_monotonic(required in 1u32..50, deltas in prop::collection::vec(-5i64..20, 0..30)) {
            let mut objective = QuestObjective::new(ObjectiveKind::Kill, "x", required);
            let mut was_completed = false;
            for delta in deltas {
                objective.update_progress(delta);
                prop_assert!(objective.progress <= objective.required);
                if was_completed {
                    prop_assert!(objective.is_completed());
                }
                was_completed = objective.is_completed();
            }
        }
    }
}
