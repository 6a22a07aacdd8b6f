//! Curriculum data model and store.
//!
//! A curriculum is an ordered sequence of learning nodes produced by the
//! planning capability. The store owns the nodes exclusively: the
//! orchestrator reads and mutates through it and never holds a private copy.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Active,
    Completed,
}

/// A single module in the generated learning path.
///
/// Status moves from `pending`/`active` to `completed` exclusively on
/// successful quiz completion; titles and descriptions are never mutated
/// after creation, and nodes are never deleted within a session.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LearningNode {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Human-readable estimate, e.g. "5 mins".
    pub estimated_time: String,
    pub status: NodeStatus,
}

impl LearningNode {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        estimated_time: impl Into<String>,
        status: NodeStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            estimated_time: estimated_time.into(),
            status,
        }
    }
}

/// Ordered store of learning nodes for the current session.
#[derive(Debug, Clone, Default)]
pub struct CurriculumStore {
    nodes: Vec<LearningNode>,
}

impl CurriculumStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wholesale replacement: a second plan overwrites the first. There is
    /// no curriculum merge.
    pub fn replace_all(&mut self, nodes: Vec<LearningNode>) {
        self.nodes = nodes;
    }

    /// Marks a node completed. Unknown ids are a no-op; re-marking an
    /// already-completed node is harmless.
    pub fn mark_completed(&mut self, node_id: Uuid) {
        match self.nodes.iter_mut().find(|n| n.id == node_id) {
            Some(node) => node.status = NodeStatus::Completed,
            None => debug!(%node_id, "mark_completed on unknown node id"),
        }
    }

    pub fn get(&self, node_id: Uuid) -> Option<&LearningNode> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// Ordered snapshot of all nodes.
    pub fn all(&self) -> &[LearningNode] {
        &self.nodes
    }

    /// Title of the first node, conventionally standing in for the overall
    /// topic of the session.
    pub fn main_topic(&self) -> Option<&str> {
        self.nodes.first().map(|n| n.title.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}
