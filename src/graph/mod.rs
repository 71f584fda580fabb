use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::document::ConfigDocument;

pub mod dynamic;
pub mod state;
pub mod template;

pub const DEFAULT_EDGE_TYPE: &str = "smoothstep";
pub const DEFAULT_MARKER_END: &str = "arrowclosed";
pub const ACTIVE_EDGE_STROKE: &str = "#6b7c93";

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_valid(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Service,
    Group,
    DynamicGroup,
}

impl NodeKind {
    pub fn is_container(self) -> bool {
        matches!(self, Self::Group | Self::DynamicGroup)
    }
}

/// Side of a node an edge attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handle {
    Top,
    Right,
    Bottom,
    Left,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgroup: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub anchor: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub position: Position,
    pub data: NodeData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draggable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl BoardNode {
    pub fn service(
        id: impl Into<String>,
        label: impl Into<String>,
        node_type: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Service,
            position,
            data: NodeData {
                label: label.into(),
                node_type: node_type.into(),
                ..NodeData::default()
            },
            deletable: None,
            draggable: None,
            selectable: None,
            width: None,
            height: None,
        }
    }

    /// Group containers are positioned from their members and never dragged directly.
    pub fn container(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            position: Position::default(),
            data: NodeData {
                label: label.into(),
                node_type: "group".to_owned(),
                ..NodeData::default()
            },
            deletable: Some(false),
            draggable: Some(false),
            selectable: Some(false),
            width: None,
            height: None,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.data.group = Some(group.into());
        self
    }

    pub fn in_subgroup(mut self, subgroup: impl Into<String>) -> Self {
        self.data.subgroup = Some(subgroup.into());
        self
    }

    pub fn anchored(mut self) -> Self {
        self.data.anchor = true;
        self
    }

    pub fn non_deletable(mut self) -> Self {
        self.deletable = Some(false);
        self
    }

    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    pub stroke: String,
    pub stroke_width: f64,
    pub opacity: f64,
}

impl Default for EdgeStyle {
    fn default() -> Self {
        Self {
            stroke: ACTIVE_EDGE_STROKE.to_owned(),
            stroke_width: 2.0,
            opacity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<Handle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<Handle>,
    #[serde(rename = "type")]
    pub edge_type: String,
    pub animated: bool,
    pub style: EdgeStyle,
    pub marker_end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl BoardEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: edge_id(&source, &target),
            source,
            target,
            source_handle: None,
            target_handle: None,
            edge_type: DEFAULT_EDGE_TYPE.to_owned(),
            animated: true,
            style: EdgeStyle::default(),
            marker_end: DEFAULT_MARKER_END.to_owned(),
            label: None,
        }
    }

    pub fn with_handles(mut self, source_handle: Handle, target_handle: Handle) -> Self {
        self.source_handle = Some(source_handle);
        self.target_handle = Some(target_handle);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

pub fn edge_id(source: &str, target: &str) -> String {
    format!("edge-{source}-{target}")
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoardGraph {
    pub nodes: Vec<BoardNode>,
    pub edges: Vec<BoardEdge>,
}

/// Builds the full node/edge set for one config document: static template, generated
/// workload nodes, hidden component nodes, and group membership for generated ids.
pub fn assemble_board_graph(document: &ConfigDocument, environment: &str) -> BoardGraph {
    let mut nodes = template::static_nodes();
    let anchor = template::default_position(template::BACKEND_SERVICE_ID).unwrap_or_default();

    let mut generated = dynamic::generate_service_nodes(document, anchor);
    generated.extend(dynamic::generate_hidden_component_nodes(document, environment));

    let mut members_by_label = BTreeMap::<String, Vec<String>>::new();
    for node in &generated {
        if let Some(group) = node.data.group.as_ref() {
            members_by_label
                .entry(group.clone())
                .or_default()
                .push(node.id.clone());
        }
    }

    nodes = nodes
        .into_iter()
        .map(|node| {
            if node.kind != NodeKind::DynamicGroup {
                return node;
            }
            match members_by_label.get(&node.data.label) {
                Some(child_ids) => dynamic::update_group_membership(&node, child_ids),
                None => node,
            }
        })
        .collect();
    nodes.extend(generated);

    let mut edges = template::static_edges();
    edges.extend(dynamic::generate_dynamic_edges(document));

    BoardGraph {
        edges: retain_connected_edges(edges, &nodes),
        nodes,
    }
}

/// Drops edges whose endpoints are not in `nodes`, and duplicate edge ids.
pub fn retain_connected_edges(edges: Vec<BoardEdge>, nodes: &[BoardNode]) -> Vec<BoardEdge> {
    let known = nodes
        .iter()
        .map(|node| node.id.as_str())
        .collect::<BTreeSet<_>>();
    let mut seen = BTreeSet::new();
    edges
        .into_iter()
        .filter(|edge| {
            known.contains(edge.source.as_str())
                && known.contains(edge.target.as_str())
                && seen.insert(edge.id.clone())
        })
        .collect()
}
