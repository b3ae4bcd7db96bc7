//! Immutable skill trees.
//!
//! A tree is built once from catalog data and validated on construction:
//! every parent must appear earlier in traversal order (branches in order,
//! nodes in order within a branch), which rules out cycles and forward
//! references by construction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{SkillKind, TrackId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkillNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: SkillKind,
    #[serde(default = "default_required_level")]
    pub required_level: u32,
    #[serde(default = "default_max_level")]
    pub max_level: u32,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub energy_cost: u32,
    #[serde(default)]
    pub cooldown_secs: u32,
}

fn default_required_level() -> u32 {
    1
}

fn default_max_level() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkillBranch {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<SkillNode>,
}

/// What a skill kind does, looked up instead of dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SkillBehavior {
    /// Can be activated by the player (spends energy, starts a cooldown).
    pub activatable: bool,
    /// Contributes a standing bonus while invested.
    pub grants_bonus: bool,
    /// The bonus applies to every track, not only the tree's own.
    pub cross_track: bool,
}

pub fn behavior(kind: SkillKind) -> SkillBehavior {
    match kind {
        SkillKind::Passive => SkillBehavior { activatable: false, grants_bonus: true, cross_track: false },
        SkillKind::Active => SkillBehavior { activatable: true, grants_bonus: false, cross_track: false },
        SkillKind::Global => SkillBehavior { activatable: false, grants_bonus: true, cross_track: true },
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SkillTreeError {
    #[error("skill tree for track '{0}' has no nodes")]
    Empty(TrackId),
    #[error("skill node with empty id in branch '{0}'")]
    EmptyId(String),
    #[error("duplicate skill id '{0}'")]
    DuplicateId(String),
    #[error("skill '{0}' has max level 0")]
    ZeroMaxLevel(String),
    #[error("skill '{node}' references parent '{parent}' that is not defined before it")]
    UnknownParent { node: String, parent: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SkillTree {
    track: TrackId,
    branches: Vec<SkillBranch>,
    // id -> (branch index, node index)
    index: HashMap<String, (usize, usize)>,
}

impl SkillTree {
    pub fn new(track: impl Into<TrackId>, branches: Vec<SkillBranch>) -> Result<Self, SkillTreeError> {
        let track = track.into();
        let mut index = HashMap::new();

        for (branch_idx, branch) in branches.iter().enumerate() {
            for (node_idx, node) in branch.nodes.iter().enumerate() {
                if node.id.is_empty() {
                    return Err(SkillTreeError::EmptyId(branch.id.clone()));
                }
                if node.max_level == 0 {
                    return Err(SkillTreeError::ZeroMaxLevel(node.id.clone()));
                }
                if let Some(parent) = node.parent.as_deref().filter(|p| !p.is_empty()) {
                    // Only nodes already indexed count, so a self or forward reference fails here.
                    if !index.contains_key(parent) {
                        return Err(SkillTreeError::UnknownParent {
                            node: node.id.clone(),
                            parent: parent.to_string(),
                        });
                    }
                }
                if index.insert(node.id.clone(), (branch_idx, node_idx)).is_some() {
                    return Err(SkillTreeError::DuplicateId(node.id.clone()));
                }
            }
        }

        if index.is_empty() {
            return Err(SkillTreeError::Empty(track));
        }

        Ok(Self { track, branches, index })
    }

    pub fn track(&self) -> &str {
        &self.track
    }

    pub fn branches(&self) -> &[SkillBranch] {
        &self.branches
    }

    pub fn node(&self, id: &str) -> Option<&SkillNode> {
        self.index
            .get(id)
            .map(|&(branch, node)| &self.branches[branch].nodes[node])
    }

    /// Parent of `id`, if it has one. Empty parent strings count as none.
    pub fn parent_of(&self, id: &str) -> Option<&SkillNode> {
        self.node(id)?
            .parent
            .as_deref()
            .filter(|p| !p.is_empty())
            .and_then(|p| self.node(p))
    }

    /// Every node in traversal order.
    pub fn nodes(&self) -> impl Iterator<Item = &SkillNode> {
        self.branches.iter().flat_map(|b| b.nodes.iter())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn node(id: &str, kind: SkillKind, max_level: u32, parent: Option<&str>) -> SkillNode {
        SkillNode {
            id: id.to_string(),
            name: id.to_uppercase(),
            description: String::new(),
            kind,
            required_level: 1,
            max_level,
            parent: parent.map(str::to_string),
            energy_cost: 0,
            cooldown_secs: 0,
        }
    }

    pub(crate) fn branch(id: &str, nodes: Vec<SkillNode>) -> SkillBranch {
        SkillBranch { id: id.to_string(), name: id.to_string(), nodes }
    }

    #[test]
    fn builds_and_indexes_nodes() {
        let tree = SkillTree::new(
            "origins:cook",
            vec![
                branch("kitchen", vec![
                    node("a", SkillKind::Passive, 3, None),
                    node("b", SkillKind::Passive, 2, Some("a")),
                ]),
                branch("fire", vec![node("c", SkillKind::Active, 1, Some("a"))]),
            ],
        )
        .unwrap();

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.node("b").unwrap().max_level, 2);
        assert_eq!(tree.parent_of("c").unwrap().id, "a");
        assert!(tree.parent_of("a").is_none());
        let order: Vec<_> = tree.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(order, ["a", "b", "c"]);
    }

    #[test]
    fn rejects_forward_reference() {
        let err = SkillTree::new(
            "t",
            vec![branch("x", vec![
                node("b", SkillKind::Passive, 1, Some("a")),
                node("a", SkillKind::Passive, 1, None),
            ])],
        )
        .unwrap_err();
        assert_eq!(err, SkillTreeError::UnknownParent { node: "b".into(), parent: "a".into() });
    }

    #[test]
    fn rejects_self_parent_and_cycles() {
        let err = SkillTree::new("t", vec![branch("x", vec![node("a", SkillKind::Passive, 1, Some("a"))])]).unwrap_err();
        assert!(matches!(err, SkillTreeError::UnknownParent { .. }));
    }

    #[test]
    fn rejects_duplicates_zero_levels_and_empty_trees() {
        let dup = SkillTree::new(
            "t",
            vec![
                branch("x", vec![node("a", SkillKind::Passive, 1, None)]),
                branch("y", vec![node("a", SkillKind::Global, 1, None)]),
            ],
        );
        assert_eq!(dup.unwrap_err(), SkillTreeError::DuplicateId("a".into()));

        let zero = SkillTree::new("t", vec![branch("x", vec![node("a", SkillKind::Passive, 0, None)])]);
        assert_eq!(zero.unwrap_err(), SkillTreeError::ZeroMaxLevel("a".into()));

        assert_eq!(SkillTree::new("t", vec![]).unwrap_err(), SkillTreeError::Empty("t".into()));
    }

    #[test]
    fn behavior_table() {
        assert!(behavior(SkillKind::Active).activatable);
        assert!(!behavior(SkillKind::Passive).activatable);
        assert!(behavior(SkillKind::Global).cross_track);
        assert!(behavior(SkillKind::Passive).grants_bonus);
    }
}
