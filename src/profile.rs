/******************************************************************************
 *                                                                            *
 * Player Profile                                                             *
 *                                                                            *
 * Everything one player has earned: a progress tracker and skill registry   *
 * per track, the quests in flight, completion counts and the energy pool.  *
 * This is the surface the reducers call; it reports what happened through   *
 * `ProgressionEvents` and never touches the database itself.                *
 *                                                                            *
 ******************************************************************************/

use std::collections::BTreeMap;

use log;
use serde::{Deserialize, Serialize};

use crate::active_quest::{ActiveQuest, QuestUpdate};
use crate::catalog::Catalog;
use crate::energy::EnergyPool;
use crate::events::ProgressionEvents;
use crate::models::{ObjectiveKind, RewardKind, SkillKind, TrackId};
use crate::progress_tracker::ProgressTracker;
use crate::quest::QuestReward;
use crate::skill_registry::{Activation, ActivationError, SkillProgressRegistry, SkillRejection};
use crate::skill_tree::behavior;

/// Quests a player may have running at once.
pub const MAX_ACTIVE_QUESTS: usize = 5;

/// What one `poll` did to a profile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub expired: usize,
    /// False when the profile is untouched and need not be saved.
    pub changed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcceptError {
    UnknownQuest,
    /// Track mismatch or level below the quest's minimum.
    NotEligible,
    AlreadyActive,
    TooManyActive,
}

/// Progress and skills on one track.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackProgress {
    pub progress: ProgressTracker,
    #[serde(default)]
    pub skills: SkillProgressRegistry,
}

/// An accepted quest plus the track its rewards go to. For `"any"` quests
/// this is the track the player accepted it from.
#[derive(Clone, Debug, PartialEq)]
pub struct QuestSlot {
    pub track: TrackId,
    pub quest: ActiveQuest,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlayerProfile {
    pub(crate) tracks: BTreeMap<TrackId, TrackProgress>,
    pub(crate) quests: Vec<QuestSlot>,
    pub(crate) completed_quests: BTreeMap<String, u32>,
    pub(crate) energy: EnergyPool,
}

impl PlayerProfile {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // TRACKS
    // ========================================================================

    pub fn track(&self, track: &str) -> Option<&TrackProgress> {
        self.tracks.get(track)
    }

    /// Level on `track`; tracks the player never touched are level 1.
    pub fn level(&self, track: &str) -> u32 {
        self.tracks.get(track).map(|t| t.progress.level).unwrap_or(1)
    }

    /// Creates the track entry on first use. Unknown tracks yield `None`.
    fn track_mut(&mut self, catalog: &Catalog, track: &str) -> Option<&mut TrackProgress> {
        if catalog.track(track).is_none() {
            log::warn!("[Progression] Ignoring unknown track '{}'", track);
            return None;
        }
        Some(self.tracks.entry(track.to_string()).or_default())
    }

    /// Adds experience on `track` and returns the number of levels gained.
    pub fn add_experience(
        &mut self,
        catalog: &Catalog,
        track: &str,
        amount: i64,
        events: &mut dyn ProgressionEvents,
    ) -> u32 {
        if amount <= 0 {
            return 0;
        }
        let curve = catalog.curve(track);
        let Some(entry) = self.track_mut(catalog, track) else {
            return 0;
        };

        let level_before = entry.progress.level;
        let gained = entry.progress.add_experience_counted(curve, amount);
        events.on_experience_gained(track, amount as u64);
        for level in level_before + 1..=level_before + gained {
            events.on_level_up(track, level);
        }
        if gained > 0 {
            log::info!(
                "[Progression] Track '{}' reached level {} ({} unspent skill points)",
                track,
                entry.progress.level,
                entry.progress.skill_points
            );
        }
        gained
    }

    /// Administrative level override. Reports a level up only when the
    /// level actually went up.
    pub fn set_level(
        &mut self,
        catalog: &Catalog,
        track: &str,
        level: u32,
        events: &mut dyn ProgressionEvents,
    ) -> bool {
        let curve = catalog.curve(track);
        let Some(entry) = self.track_mut(catalog, track) else {
            return false;
        };
        let before = entry.progress.level;
        entry.progress.set_level(curve, level);
        let after = entry.progress.level;
        if after > before {
            events.on_level_up(track, after);
        }
        log::info!("[Progression] Track '{}' level set {} -> {}", track, before, after);
        true
    }

    pub fn record_statistic(&mut self, catalog: &Catalog, track: &str, key: &str, amount: u64) -> bool {
        match self.track_mut(catalog, track) {
            Some(entry) => {
                entry.progress.increment_statistic(key, amount);
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // SKILLS
    // ========================================================================

    pub fn increase_skill(&mut self, catalog: &Catalog, track: &str, skill_id: &str) -> Result<u32, SkillRejection> {
        let tree = catalog.skill_tree(track).ok_or(SkillRejection::UnknownSkill)?;
        let entry = self.track_mut(catalog, track).ok_or(SkillRejection::UnknownSkill)?;
        let level = entry.skills.try_increase_skill(tree, &mut entry.progress, skill_id)?;
        log::info!("[Skills] '{}' on '{}' raised to level {}", skill_id, track, level);
        Ok(level)
    }

    /// Refunds every point invested on `track`. Returns the refund.
    pub fn reset_skills(&mut self, track: &str) -> u32 {
        let Some(entry) = self.tracks.get_mut(track) else {
            return 0;
        };
        let refunded = entry.skills.reset_skills(&mut entry.progress);
        log::info!("[Skills] Reset '{}', refunded {} points", track, refunded);
        refunded
    }

    pub fn set_active_skill(&mut self, catalog: &Catalog, track: &str, skill_id: &str) -> bool {
        let (Some(tree), Some(entry)) = (catalog.skill_tree(track), self.tracks.get_mut(track)) else {
            return false;
        };
        entry.skills.set_active_skill(tree, skill_id)
    }

    pub fn active_skill(&self, track: &str) -> Option<&str> {
        self.tracks.get(track).and_then(|t| t.skills.active_skill.as_deref())
    }

    pub fn activate_skill(
        &mut self,
        catalog: &Catalog,
        track: &str,
        skill_id: &str,
        now: i64,
    ) -> Result<Activation, ActivationError> {
        let tree = catalog.skill_tree(track).ok_or(ActivationError::UnknownSkill)?;
        let entry = self.tracks.get_mut(track).ok_or(ActivationError::NotLearned)?;
        entry.skills.activate_skill(tree, &mut self.energy, skill_id, now)
    }

    pub fn energy(&self) -> &EnergyPool {
        &self.energy
    }

    /// Standing bonuses in effect while working on `track`: invested passives
    /// of that track's tree plus global skills from every tree.
    pub fn standing_bonuses(&self, catalog: &Catalog, track: &str) -> Vec<(String, SkillKind, u32)> {
        let mut bonuses = Vec::new();
        for (track_id, entry) in &self.tracks {
            let Some(tree) = catalog.skill_tree(track_id) else {
                continue;
            };
            for (id, kind, level) in entry.skills.standing_bonuses(tree) {
                if track_id == track || behavior(kind).cross_track {
                    bonuses.push((id.to_string(), kind, level));
                }
            }
        }
        bonuses
    }

    // ========================================================================
    // QUESTS
    // ========================================================================

    pub fn active_quests(&self) -> impl Iterator<Item = &QuestSlot> {
        self.quests.iter()
    }

    pub fn times_completed(&self, quest_id: &str) -> u32 {
        self.completed_quests.get(quest_id).copied().unwrap_or(0)
    }

    pub fn accept_quest(&mut self, catalog: &Catalog, quest_id: &str, track: &str, now: i64) -> Result<(), AcceptError> {
        let quest = catalog.quest(quest_id).ok_or(AcceptError::UnknownQuest)?;
        if catalog.track(track).is_none() || !quest.can_accept(track, self.level(track)) {
            return Err(AcceptError::NotEligible);
        }
        if self.quests.iter().any(|slot| slot.quest.quest_id() == quest_id) {
            return Err(AcceptError::AlreadyActive);
        }
        if self.quests.len() >= MAX_ACTIVE_QUESTS {
            return Err(AcceptError::TooManyActive);
        }

        self.quests.push(QuestSlot {
            track: track.to_string(),
            quest: ActiveQuest::accept(quest.clone(), now),
        });
        log::info!("[Quests] Accepted '{}' on track '{}'", quest_id, track);
        Ok(())
    }

    pub fn abandon_quest(&mut self, quest_id: &str) -> bool {
        let Some(index) = self.quests.iter().position(|slot| slot.quest.quest_id() == quest_id) else {
            return false;
        };
        let mut slot = self.quests.remove(index);
        slot.quest.abandon();
        log::info!("[Quests] Abandoned '{}'", quest_id);
        true
    }

    /// Feeds a player action to every running quest. Quests that complete
    /// pay out and leave the active list. Returns the number completed.
    pub fn record_quest_event(
        &mut self,
        catalog: &Catalog,
        kind: ObjectiveKind,
        target: &str,
        amount: i64,
        events: &mut dyn ProgressionEvents,
    ) -> usize {
        let mut finished = Vec::new();
        for (index, slot) in self.quests.iter_mut().enumerate() {
            if let QuestUpdate::Completed(reward) = slot.quest.record(kind, target, amount) {
                finished.push((index, reward));
            }
        }

        let count = finished.len();
        for (index, reward) in finished.into_iter().rev() {
            let slot = self.quests.remove(index);
            self.complete_quest(catalog, slot, reward, events);
        }
        count
    }

    fn complete_quest(&mut self, catalog: &Catalog, slot: QuestSlot, reward: QuestReward, events: &mut dyn ProgressionEvents) {
        let quest_id = slot.quest.quest_id().to_string();
        *self.completed_quests.entry(quest_id.clone()).or_insert(0) += 1;
        log::info!("[Quests] Completed '{}' for track '{}'", quest_id, slot.track);

        match reward.kind {
            RewardKind::Experience => {
                self.add_experience(catalog, &slot.track, i64::from(reward.quantity), events);
            }
            RewardKind::SkillPointToken => {
                if let Some(entry) = self.track_mut(catalog, &slot.track) {
                    entry.progress.grant_skill_points(reward.quantity);
                }
            }
            // Items are handed out by the host from the reward itself.
            RewardKind::Item => {}
        }
        events.on_quest_completed(&quest_id, &reward);
    }

    /// Periodic upkeep: expires overdue quests, regenerates energy and
    /// drops elapsed cooldowns.
    pub fn poll(&mut self, now: i64, events: &mut dyn ProgressionEvents) -> PollSummary {
        let mut expired = 0;
        let quests_before = self.quests.len();
        self.quests.retain_mut(|slot| {
            if slot.quest.poll(now) {
                log::info!("[Quests] '{}' expired", slot.quest.quest_id());
                events.on_quest_expired(slot.quest.quest_id());
                expired += 1;
                return false;
            }
            slot.quest.is_active()
        });

        let mut changed = self.quests.len() != quests_before;
        changed |= self.energy.tick(now);
        for entry in self.tracks.values_mut() {
            changed |= entry.skills.prune_cooldowns(now);
        }
        PollSummary { expired, changed }
    }
}
