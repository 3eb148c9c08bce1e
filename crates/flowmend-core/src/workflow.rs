use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open key/value bag: node parameters, settings, pin data, static data, meta.
pub type Bag = Map<String, Value>;

/// Source node id → lanes (output port index) → edges on that lane.
pub type Connections = IndexMap<String, Vec<Vec<Edge>>>;

/// Port type used for ordinary data flow.
pub const MAIN_PORT: &str = "main";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
    pub id: String,
    pub name: String,
    pub nodes: Vec<Node>,
    pub connections: Connections,
    pub active: bool,
    pub settings: Bag,
    pub tags: Vec<Tag>,
    pub created_at: String,
    pub updated_at: String,
    pub version_id: String,
    pub trigger_count: u32,
    pub pin_data: Bag,
    pub static_data: Bag,
    #[serde(default)]
    pub meta: Bag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub type_version: u32,
    pub parameters: Bag,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
    /// Keys the normalizer does not interpret (credentials, notes, disabled, ...).
    #[serde(flatten)]
    pub extra: Bag,
}

/// Layout coordinate. Serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl From<[f64; 2]> for Position {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Position> for [f64; 2] {
    fn from(p: Position) -> Self {
        [p.x, p.y]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub target_node_id: String,
    pub port_type: String,
    pub port_index: u32,
}

impl Edge {
    /// An edge into the target's first `main` input.
    pub fn main(target: impl Into<String>) -> Self {
        Self {
            target_node_id: target.into(),
            port_type: MAIN_PORT.to_string(),
            port_index: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

impl WorkflowDocument {
    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    /// Every edge as `(source_id, lane_index, edge)`, in map order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, usize, &Edge)> {
        self.connections.iter().flat_map(|(source, lanes)| {
            lanes.iter().enumerate().flat_map(move |(lane, edges)| {
                edges.iter().map(move |edge| (source.as_str(), lane, edge))
            })
        })
    }

    pub fn edge_count(&self) -> usize {
        self.edges().count()
    }

    /// Whether any edge leads from `from` to `to`.
    pub fn is_connected(&self, from: &str, to: &str) -> bool {
        self.edges()
            .any(|(source, _, edge)| source == from && edge.target_node_id == to)
    }
}
