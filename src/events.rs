//! Notification contract between the progression core and the host.
//!
//! The core reports what happened; the host decides how players hear
//! about it (notification rows, chat, UI sync).

use crate::quest::QuestReward;

pub trait ProgressionEvents {
    fn on_level_up(&mut self, track: &str, new_level: u32);

    fn on_experience_gained(&mut self, track: &str, amount: u64);

    fn on_quest_completed(&mut self, quest_id: &str, reward: &QuestReward);

    fn on_quest_expired(&mut self, _quest_id: &str) {}
}

/// Collects events in order, used by tests and by the host to batch
/// notification rows after a reducer has finished mutating state.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EventLog {
    pub events: Vec<ProgressionEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressionEvent {
    LevelUp { track: String, new_level: u32 },
    ExperienceGained { track: String, amount: u64 },
    QuestCompleted { quest_id: String, reward: QuestReward },
    QuestExpired { quest_id: String },
}

impl ProgressionEvents for EventLog {
    fn on_level_up(&mut self, track: &str, new_level: u32) {
        self.events.push(ProgressionEvent::LevelUp { track: track.to_string(), new_level });
    }

    fn on_experience_gained(&mut self, track: &str, amount: u64) {
        self.events.push(ProgressionEvent::ExperienceGained { track: track.to_string(), amount });
    }

    fn on_quest_completed(&mut self, quest_id: &str, reward: &QuestReward) {
        self.events.push(ProgressionEvent::QuestCompleted {
            quest_id: quest_id.to_string(),
            reward: reward.clone(),
        });
    }

    fn on_quest_expired(&mut self, quest_id: &str) {
        self.events.push(ProgressionEvent::QuestExpired { quest_id: quest_id.to_string() });
    }
}
