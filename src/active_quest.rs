//! Runtime record of an accepted quest.
//!
//! State machine: `Active` on acceptance, then exactly one of `Completed`
//! (objective reached, checked on every progress update), `Expired` (time
//! limit passed, checked by `poll`) or `Abandoned` (player action). End states
//! are terminal. The reward is handed out only on the `Active -> Completed`
//! transition.

use std::sync::Arc;

use crate::models::{ObjectiveKind, QuestState};
use crate::quest::{Quest, QuestObjective, QuestReward};

const MICROS_PER_SEC: i64 = 1_000_000;

/// Outcome of reporting progress to an active quest.
#[derive(Clone, Debug, PartialEq)]
pub enum QuestUpdate {
    /// Not matching, non-positive, or the quest already ended.
    Ignored,
    Progressed { progress: u32, required: u32 },
    /// The one and only completion; carries the reward to issue.
    Completed(QuestReward),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActiveQuest {
    quest: Arc<Quest>,
    objective: QuestObjective,
    started_at: i64,
    state: QuestState,
}

impl ActiveQuest {
    pub fn accept(quest: Arc<Quest>, now: i64) -> Self {
        let objective = QuestObjective { progress: 0, ..quest.objective.clone() };
        Self { quest, objective, started_at: now, state: QuestState::Active }
    }

    /// Rebuilds a persisted record. Progress is clamped to the template.
    pub(crate) fn restore(quest: Arc<Quest>, progress: u32, started_at: i64, state: QuestState) -> Self {
        let mut objective = QuestObjective { progress: 0, ..quest.objective.clone() };
        objective.progress = progress.min(objective.required);
        Self { quest, objective, started_at, state }
    }

    pub fn quest(&self) -> &Quest {
        &self.quest
    }

    pub fn quest_id(&self) -> &str {
        &self.quest.id
    }

    pub fn objective(&self) -> &QuestObjective {
        &self.objective
    }

    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    pub fn state(&self) -> QuestState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == QuestState::Active
    }

    pub fn is_completed(&self) -> bool {
        self.objective.is_completed()
    }

    pub fn progress_percentage(&self) -> f32 {
        self.objective.progress_percentage()
    }

    /// True once more than the time limit has elapsed. Quests without a
    /// limit never expire.
    pub fn is_expired(&self, now: i64) -> bool {
        if !self.quest.has_time_limit() {
            return false;
        }
        now.saturating_sub(self.started_at) > self.limit_micros()
    }

    /// Whole seconds left, `None` for quests without a limit.
    pub fn remaining_secs(&self, now: i64) -> Option<u64> {
        if !self.quest.has_time_limit() {
            return None;
        }
        let left = self.limit_micros() - now.saturating_sub(self.started_at);
        Some((left.max(0) / MICROS_PER_SEC) as u64)
    }

    fn limit_micros(&self) -> i64 {
        i64::try_from(self.quest.time_limit_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(MICROS_PER_SEC)
    }

    /// Applies `delta` directly to the objective. An active quest whose
    /// objective is already full (a restored record) completes on the next
    /// positive update.
    pub fn update_progress(&mut self, delta: i64) -> QuestUpdate {
        if self.state.is_terminal() || delta <= 0 {
            return QuestUpdate::Ignored;
        }
        let changed = self.objective.update_progress(delta);
        if self.objective.is_completed() {
            self.state = QuestState::Completed;
            return QuestUpdate::Completed(self.quest.reward.clone());
        }
        if !changed {
            return QuestUpdate::Ignored;
        }
        QuestUpdate::Progressed {
            progress: self.objective.progress,
            required: self.objective.required,
        }
    }

    /// Applies an action reported by the host if it matches the objective.
    pub fn record(&mut self, kind: ObjectiveKind, target: &str, amount: i64) -> QuestUpdate {
        if !self.objective.matches(kind, target) {
            return QuestUpdate::Ignored;
        }
        self.update_progress(amount)
    }

    /// Periodic expiry check. Returns true on the `Active -> Expired` transition.
    pub fn poll(&mut self, now: i64) -> bool {
        if self.state != QuestState::Active || !self.is_expired(now) {
            return false;
        }
        self.state = QuestState::Expired;
        true
    }

    /// Player gives up. Returns false if the quest already ended.
    pub fn abandon(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = QuestState::Abandoned;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::tests::kill_quest;

    const SEC: i64 = 1_000_000;

    #[test]
    fn ten_kills_complete_once() {
        let mut active = ActiveQuest::accept(Arc::new(kill_quest("cull", 10, 60)), 0);
        for i in 1..10 {
            assert_eq!(active.update_progress(1), QuestUpdate::Progressed { progress: i, required: 10 });
        }
        assert_eq!(active.update_progress(1), QuestUpdate::Completed(QuestReward::experience(250)));
        assert!(active.is_completed());
        assert_eq!(active.state(), QuestState::Completed);

        assert_eq!(active.update_progress(1), QuestUpdate::Ignored);
        assert!(!active.poll(120 * SEC));
        assert!(!active.abandon());
        assert_eq!(active.state(), QuestState::Completed);
    }

    #[test]
    fn expiry_blocks_further_progress() {
        let mut active = ActiveQuest::accept(Arc::new(kill_quest("cull", 10, 60)), 5 * SEC);
        active.update_progress(4);
        assert!(!active.poll(65 * SEC));
        assert!(active.poll(65 * SEC + 1));
        assert_eq!(active.state(), QuestState::Expired);
        assert_eq!(active.update_progress(6), QuestUpdate::Ignored);
        assert_eq!(active.objective().progress, 4);
    }

    #[test]
    fn unlimited_quests_never_expire() {
        let mut active = ActiveQuest::accept(Arc::new(kill_quest("cull", 10, 0)), 0);
        assert!(!active.poll(i64::MAX));
        assert_eq!(active.remaining_secs(i64::MAX), None);
    }

    #[test]
    fn remaining_time_counts_down() {
        let active = ActiveQuest::accept(Arc::new(kill_quest("cull", 10, 60)), 0);
        assert_eq!(active.remaining_secs(0), Some(60));
        assert_eq!(active.remaining_secs(59 * SEC + SEC / 2), Some(0));
        assert_eq!(active.remaining_secs(90 * SEC), Some(0));
    }

    #[test]
    fn record_only_counts_matching_actions() {
        let mut active = ActiveQuest::accept(Arc::new(kill_quest("cull", 3, 0)), 0);
        assert_eq!(active.record(ObjectiveKind::Kill, "minecraft:skeleton", 1), QuestUpdate::Ignored);
        assert_eq!(active.record(ObjectiveKind::Craft, "minecraft:zombie", 1), QuestUpdate::Ignored);
        assert!(matches!(active.record(ObjectiveKind::Kill, "minecraft:zombie", 5), QuestUpdate::Completed(_)));
        assert_eq!(active.objective().progress, 3);
        assert_eq!(active.progress_percentage(), 1.0);
    }

    #[test]
    fn abandon_is_terminal() {
        let mut active = ActiveQuest::accept(Arc::new(kill_quest("cull", 3, 0)), 0);
        assert!(active.abandon());
        assert_eq!(active.update_progress(3), QuestUpdate::Ignored);
        assert!(!active.abandon());
    }

    #[test]
    fn restored_full_objective_completes_on_next_update() {
        let quest = Arc::new(kill_quest("cull", 10, 60));
        let mut active = ActiveQuest::restore(quest, 99, 0, QuestState::Active);
        assert_eq!(active.objective().progress, 10);
        assert!(active.is_active());

        assert_eq!(active.update_progress(0), QuestUpdate::Ignored);
        assert_eq!(active.update_progress(1), QuestUpdate::Completed(QuestReward::experience(250)));
        assert_eq!(active.state(), QuestState::Completed);
        assert_eq!(active.update_progress(1), QuestUpdate::Ignored);
    }

    #[test]
    fn acceptance_starts_from_zero_even_if_template_carries_progress() {
        let mut template = kill_quest("cull", 3, 0);
        template.objective.progress = 2;
        let active = ActiveQuest::accept(Arc::new(template), 0);
        assert_eq!(active.objective().progress, 0);
    }
}
