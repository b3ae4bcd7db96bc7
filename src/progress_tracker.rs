/******************************************************************************
 *                                                                            *
 * Progress Tracker                                                           *
 *                                                                            *
 * One per player per track. Owns level-up detection and the skill point     *
 * budget. Never notifies anyone itself - callers turn the returned signals   *
 * into level-up messages.                                                    *
 *                                                                            *
 ******************************************************************************/

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::experience_curve::ExperienceCurve;

/// Skill points granted for every level gained.
pub const SKILL_POINTS_PER_LEVEL: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressTracker {
    pub level: u32,
    /// Experience toward the next level.
    pub experience: u64,
    /// Never reset, not even by `set_level`.
    pub total_experience: u64,
    /// Unspent skill points.
    pub skill_points: u32,
    /// Every point ever granted, spent or not.
    pub points_granted: u32,
    #[serde(default)]
    pub statistics: BTreeMap<String, u64>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            level: 1,
            experience: 0,
            total_experience: 0,
            skill_points: 0,
            points_granted: 0,
            statistics: BTreeMap::new(),
        }
    }

    /// Adds experience and levels up as many times as it pays for.
    /// Returns true if at least one level was gained. Non-positive amounts
    /// change nothing.
    pub fn add_experience(&mut self, curve: &ExperienceCurve, amount: i64) -> bool {
        self.add_experience_counted(curve, amount) > 0
    }

    /// Same as `add_experience` but reports how many levels were gained.
    pub fn add_experience_counted(&mut self, curve: &ExperienceCurve, amount: i64) -> u32 {
        if amount <= 0 {
            return 0;
        }
        let amount = amount as u64;
        self.total_experience = self.total_experience.saturating_add(amount);

        if self.level >= curve.max_level() {
            self.experience = 0;
            return 0;
        }
        self.experience = self.experience.saturating_add(amount);

        let mut gained = 0;
        while self.level < curve.max_level() {
            let needed = curve.experience_for_level(self.level + 1);
            if self.experience < needed {
                break;
            }
            self.experience -= needed;
            self.level += 1;
            self.grant_skill_points(SKILL_POINTS_PER_LEVEL);
            gained += 1;
        }

        if self.level >= curve.max_level() {
            // Nothing left to accumulate toward.
            self.experience = 0;
        }
        gained
    }

    /// Administrative override. Resets experience toward the next level and
    /// moves the skill point budget by the level delta, never below zero.
    /// Points taken away by a demotion also leave `points_granted`, so a later
    /// refund cannot hand them back.
    pub fn set_level(&mut self, curve: &ExperienceCurve, new_level: u32) {
        let new_level = new_level.clamp(1, curve.max_level());
        let delta = i64::from(new_level) - i64::from(self.level);
        let point_delta = delta * i64::from(SKILL_POINTS_PER_LEVEL);

        if point_delta > 0 {
            self.grant_skill_points(point_delta as u32);
        } else {
            let removed = u32::try_from(point_delta.unsigned_abs()).unwrap_or(u32::MAX);
            self.skill_points = self.skill_points.saturating_sub(removed);
            self.points_granted = self.points_granted.saturating_sub(removed);
        }

        self.level = new_level;
        self.experience = 0;
    }

    pub fn grant_skill_points(&mut self, points: u32) {
        self.skill_points = self.skill_points.saturating_add(points);
        self.points_granted = self.points_granted.saturating_add(points);
    }

    /// Spends one point. False when there is nothing to spend.
    pub fn spend_skill_point(&mut self) -> bool {
        if self.skill_points == 0 {
            return false;
        }
        self.skill_points -= 1;
        true
    }

    /// Gives back points previously spent on skills.
    pub fn refund_skill_points(&mut self, points: u32) {
        self.skill_points = self.skill_points.saturating_add(points).min(self.points_granted);
    }

    pub fn progress_to_next_level(&self, curve: &ExperienceCurve) -> f64 {
        curve.progress_to_next_level(self.level, self.experience)
    }

    pub fn statistic(&self, key: &str) -> u64 {
        self.statistics.get(key).copied().unwrap_or(0)
    }

    pub fn increment_statistic(&mut self, key: &str, amount: u64) {
        if amount == 0 {
            return;
        }
        let entry = self.statistics.entry(key.to_string()).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Back to a fresh level 1 tracker.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
