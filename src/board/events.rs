use crate::document::ConfigDocument;
use crate::graph::{Handle, Position};
use crate::layout::Dimensions;
use crate::persistence::BoardPositions;

/// Inputs that drive a [`super::BoardState`].
#[derive(Debug, Clone, PartialEq)]
pub enum BoardOp {
    SetConfig {
        document: ConfigDocument,
    },
    PositionsLoaded {
        positions: BoardPositions,
    },
    PositionsLoadFailed {
        error: String,
    },
    NodeMoved {
        node_id: String,
        position: Position,
        dragging: bool,
    },
    NodeMeasured {
        node_id: String,
        dimensions: Dimensions,
    },
    EdgeHandleChanged {
        edge_id: String,
        source_handle: Option<Handle>,
        target_handle: Option<Handle>,
    },
    SetShowInactive {
        show_inactive: bool,
    },
}

impl BoardOp {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SetConfig { .. } => "set_config",
            Self::PositionsLoaded { .. } => "positions_loaded",
            Self::PositionsLoadFailed { .. } => "positions_load_failed",
            Self::NodeMoved { .. } => "node_moved",
            Self::NodeMeasured { .. } => "node_measured",
            Self::EdgeHandleChanged { .. } => "edge_handle_changed",
            Self::SetShowInactive { .. } => "set_show_inactive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutPass {
    /// Saved positions were applied and the layout engine did not run.
    Saved,
    /// Default table plus the overlap-avoiding layout.
    Computed,
}

impl LayoutPass {
    pub fn label(self) -> &'static str {
        match self {
            Self::Saved => "saved",
            Self::Computed => "computed",
        }
    }
}
