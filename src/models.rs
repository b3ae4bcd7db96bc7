use spacetimedb::SpacetimeType;
use serde::{Serialize, Deserialize};

/// Identifier of a profession or origin track, e.g. `"origins:miner"`.
pub type TrackId = String;

/// Track id that quests use to accept any profession.
pub const ANY_TRACK: &str = "any";

/// Closed set of skill kinds. Behavior differences live in `skill_tree::SkillBehavior`.
#[derive(SpacetimeType, Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SkillKind {
    Passive, // Permanent effect while invested
    Active,  // Needs activation, costs energy, has a cooldown
    Global,  // Affects every track of the player
}

/// What the player has to do for a quest objective.
#[derive(SpacetimeType, Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    Collect,
    Kill,
    Craft,
}

/// How a completed quest pays out.
#[derive(SpacetimeType, Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    Experience,      // quantity = experience on the quest's track
    SkillPointToken, // quantity = skill points, tier decides the token item
    Item,            // only the listed reward items
}

/// Lifecycle of an accepted quest. Everything but `Active` is terminal.
#[derive(SpacetimeType, Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestState {
    Active,
    Completed,
    Expired,
    Abandoned,
}

impl QuestState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QuestState::Active)
    }
}

/// Quality grade a blacksmith can roll on a crafted item.
#[derive(SpacetimeType, Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemQuality {
    Poor,
    Normal,
    Good,
    Legendary,
}
