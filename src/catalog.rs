/******************************************************************************
 *                                                                            *
 * Catalog                                                                    *
 *                                                                            *
 * Every static definition the progression core needs: the experience curve, *
 * the tracks (professions/origins) with their skill trees, and the quest    *
 * pool. Built once from a JSON document and handed around by reference.     *
 *                                                                            *
 * A broken entry never takes the whole catalog down: it is logged and        *
 * skipped, the rest still loads.                                             *
 *                                                                            *
 ******************************************************************************/

use std::collections::HashMap;
use std::sync::Arc;

use log;
use serde::Deserialize;
use thiserror::Error;

use crate::experience_curve::{CurveConfig, ExperienceCurve};
use crate::models::{RewardKind, TrackId, ANY_TRACK};
use crate::quality::QualityChances;
use crate::quest::{default_experience_for_tier, Quest};
use crate::skill_tree::{SkillBranch, SkillTree};

/// Catalog shipped with the module, seeded on first publish.
pub const DEFAULT_CATALOG_JSON: &str = include_str!("../data/catalog.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid experience curve: base {base}, growth {growth}, max level {max_level}")]
    InvalidCurve { base: u64, growth: f64, max_level: u32 },
}

// ============================================================================
// DOCUMENT SHAPE
// ============================================================================

#[derive(Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    curve: CurveConfig,
    #[serde(default)]
    tracks: Vec<serde_json::Value>,
    #[serde(default)]
    quests: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct TrackEntry {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    max_level: Option<u32>,
    #[serde(default)]
    experience_sources: Vec<String>,
    #[serde(default)]
    quality_chances: Option<QualityChances>,
    #[serde(default)]
    skill_tree: Vec<SkillBranch>,
}

// ============================================================================
// CATALOG
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct TrackDefinition {
    pub id: TrackId,
    pub name: String,
    pub description: String,
    pub experience_sources: Vec<String>,
    pub quality_chances: Option<QualityChances>,
}

impl TrackDefinition {
    /// True if `action` (e.g. `"mining"`) earns experience on this track.
    pub fn gives_experience(&self, action: &str) -> bool {
        self.experience_sources.iter().any(|source| source == action)
    }
}

#[derive(Clone, Debug)]
pub struct Catalog {
    base_curve: ExperienceCurve,
    tracks: Vec<TrackDefinition>,
    curves: HashMap<TrackId, ExperienceCurve>,
    skill_trees: HashMap<TrackId, SkillTree>,
    quests: HashMap<String, Arc<Quest>>,
}

impl Catalog {
    pub fn from_json(document: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_json::from_str(document)?;
        let curve_config = doc.curve.clone();
        let base_curve = ExperienceCurve::new(doc.curve).ok_or(CatalogError::InvalidCurve {
            base: curve_config.base,
            growth: curve_config.growth,
            max_level: curve_config.max_level,
        })?;

        let mut catalog = Catalog {
            base_curve,
            tracks: Vec::new(),
            curves: HashMap::new(),
            skill_trees: HashMap::new(),
            quests: HashMap::new(),
        };

        for raw in doc.tracks {
            catalog.register_track(raw);
        }
        for raw in doc.quests {
            catalog.register_quest(raw);
        }

        log::info!(
            "[Catalog] Loaded {} tracks, {} skill trees, {} quests",
            catalog.tracks.len(),
            catalog.skill_trees.len(),
            catalog.quests.len()
        );
        Ok(catalog)
    }

    pub fn load_default() -> Result<Self, CatalogError> {
        Self::from_json(DEFAULT_CATALOG_JSON)
    }

    fn register_track(&mut self, raw: serde_json::Value) {
        let entry: TrackEntry = match serde_json::from_value(raw) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("[Catalog] Skipping malformed track entry: {}", e);
                return;
            }
        };
        if entry.id.is_empty() || entry.id == ANY_TRACK {
            log::warn!("[Catalog] Skipping track with reserved or empty id '{}'", entry.id);
            return;
        }
        if self.track(&entry.id).is_some() {
            log::warn!("[Catalog] Skipping duplicate track '{}'", entry.id);
            return;
        }

        let quality_chances = match entry.quality_chances {
            Some(chances) if !chances.is_valid() => {
                log::warn!("[Catalog] Track '{}' has invalid quality chances, using defaults", entry.id);
                None
            }
            other => other,
        };

        if let Some(max_level) = entry.max_level {
            let config = CurveConfig { max_level, ..self.base_curve.config().clone() };
            match ExperienceCurve::new(config) {
                Some(curve) => {
                    self.curves.insert(entry.id.clone(), curve);
                }
                None => log::warn!(
                    "[Catalog] Track '{}' has invalid max level {}, using the shared curve",
                    entry.id,
                    max_level
                ),
            }
        }

        if !entry.skill_tree.is_empty() {
            match SkillTree::new(entry.id.clone(), entry.skill_tree) {
                Ok(tree) => {
                    self.skill_trees.insert(entry.id.clone(), tree);
                }
                Err(e) => log::warn!("[Catalog] Skill tree for '{}' rejected: {}", entry.id, e),
            }
        }

        self.tracks.push(TrackDefinition {
            id: entry.id,
            name: entry.name,
            description: entry.description,
            experience_sources: entry.experience_sources,
            quality_chances,
        });
    }

    fn register_quest(&mut self, raw: serde_json::Value) {
        let mut quest: Quest = match serde_json::from_value(raw) {
            Ok(quest) => quest,
            Err(e) => {
                log::warn!("[Catalog] Skipping malformed quest entry: {}", e);
                return;
            }
        };
        if quest.reward.kind == RewardKind::Experience && quest.reward.quantity == 0 {
            quest.reward.quantity = default_experience_for_tier(quest.reward.tier);
        }
        // Templates never carry progress.
        quest.objective.progress = 0;

        if !quest.is_valid() {
            log::warn!("[Catalog] Quest '{}' failed validation, not registered", quest.id);
            return;
        }
        if quest.track != ANY_TRACK && self.track(&quest.track).is_none() {
            log::warn!("[Catalog] Quest '{}' targets unknown track '{}'", quest.id, quest.track);
            return;
        }
        if self.quests.contains_key(&quest.id) {
            log::warn!("[Catalog] Skipping duplicate quest '{}'", quest.id);
            return;
        }
        self.quests.insert(quest.id.clone(), Arc::new(quest));
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    pub fn tracks(&self) -> &[TrackDefinition] {
        &self.tracks
    }

    pub fn track(&self, id: &str) -> Option<&TrackDefinition> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Curve for `track`; tracks without their own max level share the base curve.
    pub fn curve(&self, track: &str) -> &ExperienceCurve {
        self.curves.get(track).unwrap_or(&self.base_curve)
    }

    pub fn skill_tree(&self, track: &str) -> Option<&SkillTree> {
        self.skill_trees.get(track)
    }

    pub fn quest(&self, id: &str) -> Option<&Arc<Quest>> {
        self.quests.get(id)
    }

    pub fn quest_count(&self) -> usize {
        self.quests.len()
    }

    /// Quests a player on `track` at `level` may accept, sorted by id.
    pub fn quests_for(&self, track: &str, level: u32) -> Vec<Arc<Quest>> {
        let mut quests: Vec<_> = self
            .quests
            .values()
            .filter(|q| q.can_accept(track, level))
            .cloned()
            .collect();
        quests.sort_by(|a, b| a.id.cmp(&b.id));
        quests
    }

    /// Tracks that earn experience from `action`.
    pub fn tracks_for_source<'a>(&'a self, action: &'a str) -> impl Iterator<Item = &'a TrackDefinition> + 'a {
        self.tracks.iter().filter(move |t| t.gives_experience(action))
    }

    pub fn quality_chances(&self, track: &str) -> QualityChances {
        self.track(track)
            .and_then(|t| t.quality_chances)
            .unwrap_or_default()
    }
}
