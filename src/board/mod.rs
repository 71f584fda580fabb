use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::document::ConfigDocument;
use crate::graph::state::{apply_edge_states, apply_node_states, visible_subgraph};
use crate::graph::template::apply_default_positions;
use crate::graph::{BoardEdge, BoardNode, Handle, Position, assemble_board_graph};
use crate::layout::{Dimensions, LayoutOptions, apply_group_bounds, layout_with_groups};
use crate::persistence::debounce::SaveRequest;
use crate::persistence::{EdgeHandleOverride, NodePosition, reconcile_edges, reconcile_nodes};

pub mod events;
pub mod session;

pub use self::events::{BoardOp, LayoutPass};
pub use self::session::BoardSession;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardOptions {
    pub layout: LayoutOptions,
    pub show_inactive: bool,
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self {
            layout: LayoutOptions::default(),
            show_inactive: true,
        }
    }
}

/// What the renderer should draw.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BoardView {
    pub nodes: Vec<BoardNode>,
    pub edges: Vec<BoardEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PositionsStatus {
    Pending,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
struct RenderKey {
    config_revision: u64,
    positions: BTreeMap<String, Position>,
    dimensions: BTreeMap<String, Dimensions>,
    edge_handles: BTreeMap<String, EdgeHandleOverride>,
    show_inactive: bool,
}

#[derive(Debug, Clone)]
struct Rendered {
    key: RenderKey,
    pass: LayoutPass,
    /// Placed nodes before visibility filtering.
    nodes: Vec<BoardNode>,
    view: BoardView,
}

/// Board state for one environment.
///
/// Rendering waits until saved positions have either loaded or failed to load, so the
/// first visible layout is already final. Afterwards the view is rebuilt only when one of
/// its inputs changes.
#[derive(Debug, Clone)]
pub struct BoardState {
    environment: String,
    options: BoardOptions,
    document: Option<ConfigDocument>,
    config_revision: u64,
    status: PositionsStatus,
    positions: BTreeMap<String, Position>,
    /// Computed positions pinned after a failed load. Rendered, never saved.
    pinned: BTreeMap<String, Position>,
    dimensions: BTreeMap<String, Dimensions>,
    edge_handles: BTreeMap<String, EdgeHandleOverride>,
    rendered: Option<Rendered>,
    render_count: u64,
}

impl BoardState {
    pub fn new(environment: impl Into<String>, options: BoardOptions) -> Self {
        Self {
            environment: environment.into(),
            options,
            document: None,
            config_revision: 0,
            status: PositionsStatus::Pending,
            positions: BTreeMap::new(),
            pinned: BTreeMap::new(),
            dimensions: BTreeMap::new(),
            edge_handles: BTreeMap::new(),
            rendered: None,
            render_count: 0,
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn document(&self) -> Option<&ConfigDocument> {
        self.document.as_ref()
    }

    pub fn positions_ready(&self) -> bool {
        self.status != PositionsStatus::Pending
    }

    /// `None` until both a config document and the saved-positions load result are in.
    pub fn view(&self) -> Option<&BoardView> {
        self.rendered.as_ref().map(|rendered| &rendered.view)
    }

    pub fn last_layout_pass(&self) -> Option<LayoutPass> {
        self.rendered.as_ref().map(|rendered| rendered.pass)
    }

    /// Number of times the view has been rebuilt.
    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    /// Applies one input and returns the save it calls for, if any.
    pub fn apply(&mut self, op: BoardOp) -> Option<SaveRequest> {
        let label = op.label();
        let save = match op {
            BoardOp::SetConfig { document } => {
                if self.document.as_ref() != Some(&document) {
                    self.document = Some(document);
                    self.config_revision = self.config_revision.saturating_add(1);
                }
                None
            }
            BoardOp::PositionsLoaded { positions } => {
                self.pinned.clear();
                self.positions = positions.position_map();
                self.edge_handles = positions.handle_map();
                self.status = PositionsStatus::Loaded;
                None
            }
            BoardOp::PositionsLoadFailed { error } => {
                warn!(
                    environment = %self.environment,
                    error = %error,
                    "saved positions unavailable; using default layout"
                );
                // Only local edits are tracked from here on; the save worker lays them over
                // whatever the store still holds.
                self.positions.clear();
                self.pinned.clear();
                self.edge_handles.clear();
                self.status = PositionsStatus::Failed;
                None
            }
            BoardOp::NodeMoved {
                node_id,
                position,
                dragging,
            } => self.move_node(node_id, position, dragging),
            BoardOp::NodeMeasured {
                node_id,
                dimensions,
            } => {
                if dimensions.is_valid() {
                    self.dimensions.insert(node_id, dimensions);
                }
                None
            }
            BoardOp::EdgeHandleChanged {
                edge_id,
                source_handle,
                target_handle,
            } => self.change_edge_handles(edge_id, source_handle, target_handle),
            BoardOp::SetShowInactive { show_inactive } => {
                self.options.show_inactive = show_inactive;
                None
            }
        };

        debug!(
            environment = %self.environment,
            op = label,
            save = save.is_some(),
            "board op applied"
        );
        self.refresh();
        save
    }

    fn move_node(
        &mut self,
        node_id: String,
        position: Position,
        dragging: bool,
    ) -> Option<SaveRequest> {
        if !position.is_valid() {
            return None;
        }
        let rendered = self.rendered.as_ref()?;
        let node = rendered.nodes.iter().find(|node| node.id == node_id)?;
        if node.is_container() || node.draggable == Some(false) {
            return None;
        }

        // The first move after a computed pass pins every node where the layout put it.
        if rendered.pass == LayoutPass::Computed {
            let pins = if self.status == PositionsStatus::Failed {
                &mut self.pinned
            } else {
                &mut self.positions
            };
            for placed in rendered.nodes.iter().filter(|node| !node.is_container()) {
                pins.entry(placed.id.clone()).or_insert(placed.position);
            }
        }
        self.positions.insert(node_id, position);

        Some(SaveRequest::Positions {
            positions: self.position_snapshot(),
            dragging,
        })
    }

    fn change_edge_handles(
        &mut self,
        edge_id: String,
        source_handle: Option<Handle>,
        target_handle: Option<Handle>,
    ) -> Option<SaveRequest> {
        let rendered = self.rendered.as_ref()?;
        if !rendered.view.edges.iter().any(|edge| edge.id == edge_id)
            || (source_handle.is_none() && target_handle.is_none())
        {
            return None;
        }

        let entry = self
            .edge_handles
            .entry(edge_id.clone())
            .or_insert_with(|| EdgeHandleOverride {
                edge_id,
                source_handle: None,
                target_handle: None,
            });
        if source_handle.is_some() {
            entry.source_handle = source_handle;
        }
        if target_handle.is_some() {
            entry.target_handle = target_handle;
        }

        Some(SaveRequest::Handles {
            edge_handles: self.edge_handles.values().cloned().collect(),
        })
    }

    /// Every known position, including ids that are not on the board right now.
    fn position_snapshot(&self) -> Vec<NodePosition> {
        self.positions
            .iter()
            .map(|(node_id, position)| NodePosition::new(node_id.clone(), *position))
            .collect()
    }

    fn render_key(&self) -> RenderKey {
        let mut positions = self.pinned.clone();
        positions.extend(self.positions.iter().map(|(id, position)| (id.clone(), *position)));
        RenderKey {
            config_revision: self.config_revision,
            positions,
            dimensions: self.dimensions.clone(),
            edge_handles: self.edge_handles.clone(),
            show_inactive: self.options.show_inactive,
        }
    }

    fn refresh(&mut self) {
        let Some(document) = self.document.as_ref() else {
            return;
        };
        if self.status == PositionsStatus::Pending {
            return;
        }

        let key = self.render_key();
        if self
            .rendered
            .as_ref()
            .is_some_and(|rendered| rendered.key == key)
        {
            return;
        }

        let graph = assemble_board_graph(document, &self.environment);
        let defaults = apply_default_positions(&graph.nodes);
        let (placed, pass) = if key.positions.is_empty() {
            (
                layout_with_groups(&defaults, &self.dimensions, self.options.layout),
                LayoutPass::Computed,
            )
        } else {
            (reconcile_nodes(&defaults, &key.positions), LayoutPass::Saved)
        };

        let nodes = apply_group_bounds(&apply_node_states(&placed, document), &self.dimensions);
        let edges = apply_edge_states(&reconcile_edges(&graph.edges, &self.edge_handles), &nodes);
        let (visible_nodes, visible_edges) =
            visible_subgraph(&nodes, &edges, self.options.show_inactive);

        self.render_count = self.render_count.saturating_add(1);
        debug!(
            environment = %self.environment,
            pass = pass.label(),
            nodes = visible_nodes.len(),
            edges = visible_edges.len(),
            revision = self.config_revision,
            "board view rebuilt"
        );

        self.rendered = Some(Rendered {
            key,
            pass,
            nodes,
            view: BoardView {
                nodes: visible_nodes,
                edges: visible_edges,
            },
        });
    }
}
