use std::collections::BTreeMap;
use std::future::Future;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::graph::{BoardEdge, BoardNode, Handle, Position};

pub mod client;
pub mod debounce;
pub mod store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePosition {
    pub node_id: String,
    pub x: f64,
    pub y: f64,
}

impl NodePosition {
    pub fn new(node_id: impl Into<String>, position: Position) -> Self {
        Self {
            node_id: node_id.into(),
            x: position.x,
            y: position.y,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeHandleOverride {
    pub edge_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<Handle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<Handle>,
}

/// Persisted board layout for one environment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardPositions {
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub positions: Vec<NodePosition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edge_handles: Vec<EdgeHandleOverride>,
}

impl BoardPositions {
    pub fn empty(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            ..Self::default()
        }
    }

    /// Valid saved positions by node id. Later duplicates win.
    pub fn position_map(&self) -> BTreeMap<String, Position> {
        self.positions
            .iter()
            .filter(|entry| entry.position().is_valid())
            .map(|entry| (entry.node_id.clone(), entry.position()))
            .collect()
    }

    pub fn handle_map(&self) -> BTreeMap<String, EdgeHandleOverride> {
        self.edge_handles
            .iter()
            .map(|entry| (entry.edge_id.clone(), entry.clone()))
            .collect()
    }
}

/// Backing storage for [`BoardPositions`], keyed by environment name.
pub trait PositionStore: Send + Sync + 'static {
    fn load(&self, environment: &str) -> impl Future<Output = Result<BoardPositions>> + Send;

    fn save(&self, positions: &BoardPositions) -> impl Future<Output = Result<()>> + Send;
}

/// Saved positions replace computed ones outright. Containers keep their positions since
/// they are derived from their members.
pub fn reconcile_nodes(nodes: &[BoardNode], saved: &BTreeMap<String, Position>) -> Vec<BoardNode> {
    nodes
        .iter()
        .cloned()
        .map(|mut node| {
            if !node.is_container()
                && let Some(position) = saved.get(&node.id)
            {
                node.position = *position;
            }
            node
        })
        .collect()
}

/// Applies saved handle sides; a side without an override keeps its structural default.
pub fn reconcile_edges(
    edges: &[BoardEdge],
    saved: &BTreeMap<String, EdgeHandleOverride>,
) -> Vec<BoardEdge> {
    edges
        .iter()
        .cloned()
        .map(|mut edge| {
            if let Some(handles) = saved.get(&edge.id) {
                if let Some(source) = handles.source_handle {
                    edge.source_handle = Some(source);
                }
                if let Some(target) = handles.target_handle {
                    edge.target_handle = Some(target);
                }
            }
            edge
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::graph::{BoardEdge, BoardNode, Handle, NodeKind, Position};

    use super::{
        BoardPositions, EdgeHandleOverride, NodePosition, reconcile_edges, reconcile_nodes,
    };

    #[test]
    fn saved_positions_win_over_computed_positions() {
        let nodes = vec![
            BoardNode::service("service-worker", "worker", "service", Position::new(10.0, 20.0)),
            BoardNode::service("ses", "SES", "ses", Position::new(1.0, 1.0)),
            BoardNode::container("group-data", NodeKind::Group, "Data"),
        ];
        let saved = BoardPositions {
            environment: "dev".to_owned(),
            positions: vec![
                NodePosition::new("service-worker", Position::new(500.0, 500.0)),
                NodePosition::new("group-data", Position::new(9.0, 9.0)),
                NodePosition::new("deleted-node", Position::new(3.0, 3.0)),
            ],
            edge_handles: Vec::new(),
        };

        let reconciled = reconcile_nodes(&nodes, &saved.position_map());
        assert_eq!(reconciled[0].position, Position::new(500.0, 500.0));
        assert_eq!(reconciled[1].position, Position::new(1.0, 1.0));
        assert_eq!(reconciled[2].position, Position::default());
        assert_eq!(reconciled.len(), 3, "unknown saved ids add nothing");
    }

    #[test]
    fn invalid_saved_positions_are_ignored() {
        let saved = BoardPositions {
            positions: vec![
                NodePosition::new("a", Position::new(f64::NAN, 1.0)),
                NodePosition::new("b", Position::new(2.0, 3.0)),
            ],
            ..BoardPositions::default()
        };
        let map = saved.position_map();
        assert!(!map.contains_key("a"));
        assert_eq!(map.get("b"), Some(&Position::new(2.0, 3.0)));
    }

    #[test]
    fn handle_overrides_apply_per_side() {
        let edges = vec![
            BoardEdge::new("a", "b").with_handles(Handle::Right, Handle::Left),
            BoardEdge::new("b", "c").with_handles(Handle::Bottom, Handle::Top),
        ];
        let saved = BTreeMap::from([(
            "edge-a-b".to_owned(),
            EdgeHandleOverride {
                edge_id: "edge-a-b".to_owned(),
                source_handle: Some(Handle::Bottom),
                target_handle: None,
            },
        )]);

        let reconciled = reconcile_edges(&edges, &saved);
        assert_eq!(reconciled[0].source_handle, Some(Handle::Bottom));
        assert_eq!(reconciled[0].target_handle, Some(Handle::Left));
        assert_eq!(reconciled[1], edges[1]);
    }

    #[test]
    fn board_positions_wire_format_matches_positions_api() {
        let raw = r#"{"environment":"dev","positions":[{"nodeId":"ses","x":1.5,"y":2}],"edgeHandles":[{"edgeId":"edge-a-b","sourceHandle":"right"}]}"#;
        let parsed: BoardPositions = serde_json::from_str(raw).expect("payload should parse");
        assert_eq!(parsed.positions[0].node_id, "ses");
        assert_eq!(parsed.edge_handles[0].source_handle, Some(Handle::Right));
        assert_eq!(parsed.edge_handles[0].target_handle, None);

        let empty: BoardPositions =
            serde_json::from_str(r#"{"environment":"dev"}"#).expect("empty payload should parse");
        assert!(empty.positions.is_empty());
        let encoded = serde_json::to_value(&empty).expect("encode should work");
        assert!(encoded.get("edgeHandles").is_none());
    }
}
