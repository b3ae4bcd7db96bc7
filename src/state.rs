//! Persisted form of a `PlayerProfile`.
//!
//! The document is a versioned JSON value. Quests are stored by id and
//! re-linked to their catalog templates on load; a quest whose template is
//! gone is dropped rather than failing the whole profile.

use std::collections::BTreeMap;

use log;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::active_quest::ActiveQuest;
use crate::catalog::Catalog;
use crate::energy::EnergyPool;
use crate::models::{QuestState, TrackId};
use crate::profile::{PlayerProfile, QuestSlot, TrackProgress};

pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("progression state has no version field")]
    MissingVersion,
    #[error("unsupported progression state version {0}")]
    UnsupportedVersion(u64),
    #[error("malformed progression state: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct StateRecord {
    version: u32,
    #[serde(default)]
    tracks: BTreeMap<TrackId, TrackProgress>,
    #[serde(default)]
    active_quests: Vec<QuestRecord>,
    #[serde(default)]
    completed_quests: BTreeMap<String, u32>,
    #[serde(default)]
    energy: EnergyPool,
}

#[derive(Serialize, Deserialize)]
struct QuestRecord {
    quest_id: String,
    track: TrackId,
    progress: u32,
    started_at: i64,
    state: QuestState,
}

impl PlayerProfile {
    pub fn write_state(&self) -> serde_json::Value {
        let record = StateRecord {
            version: STATE_VERSION,
            tracks: self.tracks.clone(),
            active_quests: self
                .quests
                .iter()
                .map(|slot| QuestRecord {
                    quest_id: slot.quest.quest_id().to_string(),
                    track: slot.track.clone(),
                    progress: slot.quest.objective().progress,
                    started_at: slot.quest.started_at(),
                    state: slot.quest.state(),
                })
                .collect(),
            completed_quests: self.completed_quests.clone(),
            energy: self.energy.clone(),
        };
        // Plain structs with string keys, serialization cannot fail.
        serde_json::to_value(record).unwrap_or(serde_json::Value::Null)
    }

    pub fn read_state(value: &serde_json::Value, catalog: &Catalog) -> Result<PlayerProfile, StateError> {
        let version = value
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .ok_or(StateError::MissingVersion)?;
        if version != u64::from(STATE_VERSION) {
            return Err(StateError::UnsupportedVersion(version));
        }
        let record = StateRecord::deserialize(value)?;

        let mut tracks = record.tracks;
        for (track, entry) in tracks.iter_mut() {
            let max_level = catalog.curve(track).max_level();
            if entry.progress.level > max_level || entry.progress.level == 0 {
                log::warn!(
                    "[Progression] Stored level {} on '{}' outside 1..={}, clamping",
                    entry.progress.level,
                    track,
                    max_level
                );
                entry.progress.level = entry.progress.level.clamp(1, max_level);
            }
        }

        let quests = record
            .active_quests
            .into_iter()
            .filter_map(|stored| {
                let Some(template) = catalog.quest(&stored.quest_id) else {
                    log::warn!("[Quests] Dropping stored quest '{}': no longer in the catalog", stored.quest_id);
                    return None;
                };
                if stored.state.is_terminal() {
                    return None;
                }
                Some(QuestSlot {
                    track: stored.track,
                    quest: ActiveQuest::restore(template.clone(), stored.progress, stored.started_at, stored.state),
                })
            })
            .collect();

        Ok(PlayerProfile {
            tracks,
            quests,
            completed_quests: record.completed_quests,
            energy: record.energy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventLog;
    use crate::models::ObjectiveKind;
    use serde_json::json;

    fn catalog() -> Catalog {
        Catalog::load_default().unwrap()
    }

    fn played_profile(catalog: &Catalog) -> PlayerProfile {
        let mut profile = PlayerProfile::new();
        let mut events = EventLog::default();
        profile.add_experience(catalog, "origins:blacksmith", 400, &mut events);
        profile.increase_skill(catalog, "origins:blacksmith", "hot_strike").unwrap();
        profile.set_active_skill(catalog, "origins:blacksmith", "hot_strike");
        profile.activate_skill(catalog, "origins:blacksmith", "hot_strike", 1_000).unwrap();
        profile.record_statistic(catalog, "origins:blacksmith", "items_forged", 7);
        profile.accept_quest(catalog, "warrior_zombies", "origins:warrior", 500).unwrap();
        profile.record_quest_event(catalog, ObjectiveKind::Kill, "minecraft:zombie", 4, &mut events);
        profile
    }

    #[test]
    fn written_state_reads_back_identically() {
        let catalog = catalog();
        let profile = played_profile(&catalog);
        let document = profile.write_state();
        assert_eq!(document["version"], json!(STATE_VERSION));

        let restored = PlayerProfile::read_state(&document, &catalog).unwrap();
        assert_eq!(restored, profile);
        let slot = restored.active_quests().next().unwrap();
        assert_eq!(slot.quest.objective().progress, 4);
        assert_eq!(slot.quest.started_at(), 500);
    }

    #[test]
    fn survives_a_json_string_round() {
        let catalog = catalog();
        let profile = played_profile(&catalog);
        let text = profile.write_state().to_string();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(PlayerProfile::read_state(&parsed, &catalog).unwrap(), profile);
    }

    #[test]
    fn rejects_unknown_or_missing_version() {
        let catalog = catalog();
        assert!(matches!(
            PlayerProfile::read_state(&json!({ "version": 99 }), &catalog),
            Err(StateError::UnsupportedVersion(99))
        ));
        assert!(matches!(
            PlayerProfile::read_state(&json!({ "tracks": {} }), &catalog),
            Err(StateError::MissingVersion)
        ));
        assert!(matches!(
            PlayerProfile::read_state(&json!({ "version": 1, "tracks": 5 }), &catalog),
            Err(StateError::Malformed(_))
        ));
    }

    #[test]
    fn minimal_document_is_a_fresh_profile() {
        let profile = PlayerProfile::read_state(&json!({ "version": 1 }), &catalog()).unwrap();
        assert_eq!(profile, PlayerProfile::new());
    }

    #[test]
    fn drops_quests_missing_from_catalog() {
        let catalog = catalog();
        let document = json!({
            "version": 1,
            "active_quests": [
                { "quest_id": "retired_quest", "track": "origins:warrior", "progress": 3, "started_at": 0, "state": "active" },
                { "quest_id": "warrior_zombies", "track": "origins:warrior", "progress": 7, "started_at": 0, "state": "active" }
            ]
        });
        let profile = PlayerProfile::read_state(&document, &catalog).unwrap();
        let slots: Vec<_> = profile.active_quests().collect();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].quest.quest_id(), "warrior_zombies");
        assert_eq!(slots[0].quest.objective().progress, 7);
    }

    #[test]
    fn overfilled_stored_quest_still_completes() {
        let catalog = catalog();
        let document = json!({
            "version": 1,
            "active_quests": [
                { "quest_id": "warrior_zombies", "track": "origins:warrior", "progress": 99, "started_at": 0, "state": "active" }
            ]
        });
        let mut profile = PlayerProfile::read_state(&document, &catalog).unwrap();
        let mut events = EventLog::default();
        let completed = profile.record_quest_event(&catalog, ObjectiveKind::Kill, "minecraft:zombie", 1, &mut events);

        assert_eq!(completed, 1);
        assert_eq!(profile.times_completed("warrior_zombies"), 1);
        assert_eq!(profile.active_quests().count(), 0);
        assert_eq!(profile.track("origins:warrior").unwrap().progress.total_experience, 250);
    }

    #[test]
    fn clamps_levels_beyond_the_curve() {
        let document = json!({
            "version": 1,
            "tracks": {
                "origins:courier": {
                    "progress": { "level": 45, "experience": 0, "total_experience": 0, "skill_points": 0, "points_granted": 0 }
                }
            }
        });
        let profile = PlayerProfile::read_state(&document, &catalog()).unwrap();
        assert_eq!(profile.level("origins:courier"), 30);
    }
}
