//! Per-player skill investments for one track.
//!
//! Every increase is checked against the tree and paid for with one skill
//! point from the track's `ProgressTracker`, so investments can never exceed
//! the points the track has granted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::energy::EnergyPool;
use crate::models::SkillKind;
use crate::progress_tracker::ProgressTracker;
use crate::skill_tree::{behavior, SkillTree};

/// Why an increase was refused. Checks run in declaration order and the
/// first failing one is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkillRejection {
    UnknownSkill,
    LevelTooLow,
    AtMaxLevel,
    ParentNotLearned,
    NoSkillPoints,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivationError {
    UnknownSkill,
    NotActive,
    NotLearned,
    OnCooldown { ready_at: i64 },
    NotEnoughEnergy { needed: u32, available: u32 },
}

/// A successful activation: which level fired and when it can fire again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Activation {
    pub level: u32,
    pub ready_at: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillProgressRegistry {
    #[serde(default)]
    pub invested: BTreeMap<String, u32>,
    #[serde(default)]
    pub active_skill: Option<String>,
    #[serde(default)]
    pub cooldowns: BTreeMap<String, i64>,
}

impl SkillProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level_of(&self, skill_id: &str) -> u32 {
        self.invested.get(skill_id).copied().unwrap_or(0)
    }

    pub fn has_skill(&self, skill_id: &str) -> bool {
        self.level_of(skill_id) > 0
    }

    /// Points currently tied up in skills.
    pub fn total_invested(&self) -> u32 {
        self.invested.values().sum()
    }

    pub fn increase_skill(&mut self, tree: &SkillTree, tracker: &mut ProgressTracker, skill_id: &str) -> bool {
        self.try_increase_skill(tree, tracker, skill_id).is_ok()
    }

    /// Invests one point in `skill_id`, returning the new level.
    pub fn try_increase_skill(
        &mut self,
        tree: &SkillTree,
        tracker: &mut ProgressTracker,
        skill_id: &str,
    ) -> Result<u32, SkillRejection> {
        let node = tree.node(skill_id).ok_or(SkillRejection::UnknownSkill)?;
        if tracker.level < node.required_level {
            return Err(SkillRejection::LevelTooLow);
        }
        let current = self.level_of(skill_id);
        if current >= node.max_level {
            return Err(SkillRejection::AtMaxLevel);
        }
        if let Some(parent) = tree.parent_of(skill_id) {
            if self.level_of(&parent.id) < 1 {
                return Err(SkillRejection::ParentNotLearned);
            }
        }
        if !tracker.spend_skill_point() {
            return Err(SkillRejection::NoSkillPoints);
        }

        let new_level = current + 1;
        self.invested.insert(skill_id.to_string(), new_level);
        Ok(new_level)
    }

    /// Clears every investment and hands the points back to the tracker.
    /// Returns the number of points actually refunded, which is less than the
    /// investment when a demotion took the granting levels away.
    pub fn reset_skills(&mut self, tracker: &mut ProgressTracker) -> u32 {
        let before = tracker.skill_points;
        tracker.refund_skill_points(self.total_invested());
        self.invested.clear();
        self.active_skill = None;
        self.cooldowns.clear();
        tracker.skill_points.saturating_sub(before)
    }

    /// Selects the active skill bound to the player's skill key. Only a
    /// learned `Active` skill qualifies.
    pub fn set_active_skill(&mut self, tree: &SkillTree, skill_id: &str) -> bool {
        match tree.node(skill_id) {
            Some(node) if behavior(node.kind).activatable && self.has_skill(skill_id) => {
                self.active_skill = Some(skill_id.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn is_on_cooldown(&self, skill_id: &str, now: i64) -> bool {
        self.cooldowns.get(skill_id).is_some_and(|ready_at| now < *ready_at)
    }

    pub fn cooldown_remaining_micros(&self, skill_id: &str, now: i64) -> i64 {
        self.cooldowns
            .get(skill_id)
            .map(|ready_at| (*ready_at - now).max(0))
            .unwrap_or(0)
    }

    /// Fires an active skill: checks kind, investment, cooldown and energy,
    /// then spends the energy and starts the cooldown.
    pub fn activate_skill(
        &mut self,
        tree: &SkillTree,
        energy: &mut EnergyPool,
        skill_id: &str,
        now: i64,
    ) -> Result<Activation, ActivationError> {
        let node = tree.node(skill_id).ok_or(ActivationError::UnknownSkill)?;
        if !behavior(node.kind).activatable {
            return Err(ActivationError::NotActive);
        }
        let level = self.level_of(skill_id);
        if level == 0 {
            return Err(ActivationError::NotLearned);
        }
        if let Some(&ready_at) = self.cooldowns.get(skill_id) {
            if now < ready_at {
                return Err(ActivationError::OnCooldown { ready_at });
            }
        }
        if !energy.consume(node.energy_cost, now) {
            return Err(ActivationError::NotEnoughEnergy {
                needed: node.energy_cost,
                available: energy.current,
            });
        }

        let ready_at = now.saturating_add(i64::from(node.cooldown_secs) * 1_000_000);
        self.cooldowns.insert(skill_id.to_string(), ready_at);
        Ok(Activation { level, ready_at })
    }

    /// Invested passive and global skills with their levels, the standing
    /// bonuses the host applies each tick.
    pub fn standing_bonuses<'a>(&'a self, tree: &'a SkillTree) -> impl Iterator<Item = (&'a str, SkillKind, u32)> + 'a {
        tree.nodes().filter_map(move |node| {
            let level = self.level_of(&node.id);
            (level > 0 && behavior(node.kind).grants_bonus).then_some((node.id.as_str(), node.kind, level))
        })
    }

    /// Drops cooldowns that already elapsed. Returns true if any were dropped.
    pub fn prune_cooldowns(&mut self, now: i64) -> bool {
        let before = self.cooldowns.len();
        self.cooldowns.retain(|_, ready_at| now < *ready_at);
        self.cooldowns.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experience_curve::ExperienceCurve;
    use crate::skill_tree::tests::{branch, node};

    fn tree() -> SkillTree {
        let mut strike = node("hot_strike", SkillKind::Active, 2, Some("a"));
        strike.energy_cost = 5;
        strike.cooldown_secs = 10;
        let mut gated = node("master", SkillKind::Global, 1, Some("a"));
        gated.required_level = 10;
        SkillTree::new(
            "origins:blacksmith",
            vec![branch("forge", vec![
                node("a", SkillKind::Passive, 3, None),
                node("b", SkillKind::Passive, 2, Some("a")),
                strike,
                gated,
            ])],
        )
        .unwrap()
    }

    fn tracker_with_points(points: u32) -> ProgressTracker {
        let curve = ExperienceCurve::default();
        let mut tracker = ProgressTracker::new();
        tracker.set_level(&curve, 1 + points);
        tracker
    }

    #[test]
    fn child_requires_parent() {
        let tree = tree();
        let mut tracker = tracker_with_points(3);
        let mut registry = SkillProgressRegistry::new();

        assert_eq!(registry.try_increase_skill(&tree, &mut tracker, "b"), Err(SkillRejection::ParentNotLearned));
        assert_eq!(registry.level_of("b"), 0);
        assert_eq!(tracker.skill_points, 3);

        assert!(registry.increase_skill(&tree, &mut tracker, "a"));
        assert!(registry.increase_skill(&tree, &mut tracker, "b"));
        assert_eq!(registry.level_of("b"), 1);
        assert_eq!(tracker.skill_points, 1);
    }

    #[test]
    fn checks_run_in_order() {
        let tree = tree();
        let mut tracker = tracker_with_points(0);
        let mut registry = SkillProgressRegistry::new();

        assert_eq!(registry.try_increase_skill(&tree, &mut tracker, "nope"), Err(SkillRejection::UnknownSkill));
        // level gate is reported before the missing parent
        assert_eq!(registry.try_increase_skill(&tree, &mut tracker, "master"), Err(SkillRejection::LevelTooLow));
        assert_eq!(registry.try_increase_skill(&tree, &mut tracker, "a"), Err(SkillRejection::NoSkillPoints));
    }

    #[test]
    fn stops_at_max_level() {
        let tree = tree();
        let mut tracker = tracker_with_points(5);
        let mut registry = SkillProgressRegistry::new();
        for expected in 1..=3 {
            assert_eq!(registry.try_increase_skill(&tree, &mut tracker, "a"), Ok(expected));
        }
        assert_eq!(registry.try_increase_skill(&tree, &mut tracker, "a"), Err(SkillRejection::AtMaxLevel));
        assert_eq!(tracker.skill_points, 2);
    }

    #[test]
    fn investments_never_exceed_granted_points() {
        let tree = tree();
        let mut tracker = tracker_with_points(4);
        let mut registry = SkillProgressRegistry::new();
        for id in ["a", "a", "a", "b", "b", "hot_strike", "a", "b"] {
            registry.increase_skill(&tree, &mut tracker, id);
        }
        assert_eq!(registry.total_invested(), 4);
        assert_eq!(tracker.skill_points, 0);
    }

    #[test]
    fn reset_refunds_everything() {
        let tree = tree();
        let mut tracker = tracker_with_points(3);
        let mut registry = SkillProgressRegistry::new();
        registry.increase_skill(&tree, &mut tracker, "a");
        registry.increase_skill(&tree, &mut tracker, "hot_strike");
        assert!(registry.set_active_skill(&tree, "hot_strike"));

        assert_eq!(registry.reset_skills(&mut tracker), 2);
        assert_eq!(tracker.skill_points, 3);
        assert!(registry.invested.is_empty());
        assert!(registry.active_skill.is_none());
    }

    #[test]
    fn active_skill_selection_needs_learned_active_node() {
        let tree = tree();
        let mut tracker = tracker_with_points(2);
        let mut registry = SkillProgressRegistry::new();
        assert!(!registry.set_active_skill(&tree, "hot_strike"));
        registry.increase_skill(&tree, &mut tracker, "a");
        assert!(!registry.set_active_skill(&tree, "a"));
        registry.increase_skill(&tree, &mut tracker, "hot_strike");
        assert!(registry.set_active_skill(&tree, "hot_strike"));
        assert_eq!(registry.active_skill.as_deref(), Some("hot_strike"));
    }

    #[test]
    fn activation_spends_energy_and_starts_cooldown() {
        let tree = tree();
        let mut tracker = tracker_with_points(2);
        let mut registry = SkillProgressRegistry::new();
        let mut energy = EnergyPool::default();

        assert_eq!(registry.activate_skill(&tree, &mut energy, "hot_strike", 0), Err(ActivationError::NotLearned));
        assert_eq!(registry.activate_skill(&tree, &mut energy, "a", 0), Err(ActivationError::NotActive));

        registry.increase_skill(&tree, &mut tracker, "a");
        registry.increase_skill(&tree, &mut tracker, "hot_strike");

        let fired = registry.activate_skill(&tree, &mut energy, "hot_strike", 1_000_000).unwrap();
        assert_eq!(fired, Activation { level: 1, ready_at: 11_000_000 });
        assert_eq!(energy.current, 15);
        assert!(registry.is_on_cooldown("hot_strike", 5_000_000));
        assert_eq!(registry.cooldown_remaining_micros("hot_strike", 5_000_000), 6_000_000);
        assert_eq!(
            registry.activate_skill(&tree, &mut energy, "hot_strike", 5_000_000),
            Err(ActivationError::OnCooldown { ready_at: 11_000_000 })
        );

        energy.current = 2;
        assert_eq!(
            registry.activate_skill(&tree, &mut energy, "hot_strike", 12_000_000),
            Err(ActivationError::NotEnoughEnergy { needed: 5, available: 2 })
        );

        assert!(registry.prune_cooldowns(12_000_000));
        assert!(registry.cooldowns.is_empty());
    }

    #[test]
    fn standing_bonuses_skip_active_and_uninvested() {
        let tree = tree();
        let mut tracker = tracker_with_points(3);
        let mut registry = SkillProgressRegistry::new();
        registry.increase_skill(&tree, &mut tracker, "a");
        registry.increase_skill(&tree, &mut tracker, "a");
        registry.increase_skill(&tree, &mut tracker, "hot_strike");
        let bonuses: Vec<_> = registry.standing_bonuses(&tree).collect();
        assert_eq!(bonuses, vec![("a", SkillKind::Passive, 2)]);
    }
}
