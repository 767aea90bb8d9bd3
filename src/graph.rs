//! Node graph and area tree adapters.
//!
//! Both artifacts are produced by the mapping pipeline and consumed here
//! only through `read_graph` / `to_json`. Parsing into the structured form
//! is a schema check: a file that loads here is safe to upload. Fields this
//! crate does not know about are kept and written back by `to_json`.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GraphError;

/// A navigation node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: u64,
    pub target: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGraph {
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeGraph {
    pub fn read_graph(path: &Path) -> Result<Self, GraphError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(s: &str) -> Result<Self, GraphError> {
        let graph: NodeGraph = serde_json::from_str(s)?;
        graph.validate()?;
        Ok(graph)
    }

    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn validate(&self) -> Result<(), GraphError> {
        let mut ids = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !ids.insert(node.id) {
                return Err(GraphError::Invalid(format!("duplicate node id {}", node.id)));
            }
            if !(node.x.is_finite() && node.y.is_finite()) {
                return Err(GraphError::Invalid(format!(
                    "node {} has a non-finite position",
                    node.id
                )));
            }
        }
        for edge in &self.edges {
            for end in [edge.source, edge.target] {
                if !ids.contains(&end) {
                    return Err(GraphError::Invalid(format!(
                        "edge {} -> {} references unknown node {}",
                        edge.source, edge.target, end
                    )));
                }
            }
        }
        Ok(())
    }
}

/// One area in the hierarchy. The root sits at level 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub name: String,
    #[serde(default)]
    pub children: Vec<Area>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaTree {
    pub root: Area,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AreaTree {
    pub fn read_graph(path: &Path) -> Result<Self, GraphError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(s: &str) -> Result<Self, GraphError> {
        let tree: AreaTree = serde_json::from_str(s)?;
        tree.validate()?;
        Ok(tree)
    }

    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string(self)?)
    }

    /// All areas at `level` below the root.
    pub fn areas_at_level(&self, level: usize) -> Vec<&Area> {
        let mut current = vec![&self.root];
        for _ in 0..level {
            current = current.into_iter().flat_map(|a| a.children.iter()).collect();
        }
        current
    }

    fn validate(&self) -> Result<(), GraphError> {
        let mut names = HashSet::new();
        let mut stack = vec![&self.root];
        while let Some(area) = stack.pop() {
            if area.name.is_empty() {
                return Err(GraphError::Invalid("area with empty name".to_string()));
            }
            if !names.insert(area.name.as_str()) {
                return Err(GraphError::Invalid(format!(
                    "duplicate area name '{}'",
                    area.name
                )));
            }
            stack.extend(area.children.iter());
        }
        Ok(())
    }
}
