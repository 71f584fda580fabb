use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::graph::{BoardNode, Position};

pub const DEFAULT_NODE_WIDTH: f64 = 140.0;
pub const DEFAULT_NODE_HEIGHT: f64 = 80.0;
pub const GROUP_SIDE_PADDING: f64 = 20.0;
pub const GROUP_TOP_PADDING: f64 = 35.0;
pub const GROUP_BOTTOM_PADDING: f64 = 15.0;

/// Returned for groups with no member that has a usable position.
pub const EMPTY_GROUP_BOUNDS: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 400.0,
    height: 300.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_valid(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(DEFAULT_NODE_WIDTH, DEFAULT_NODE_HEIGHT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn at(position: Position, dimensions: Dimensions) -> Self {
        Self {
            x: position.x,
            y: position.y,
            width: dimensions.width,
            height: dimensions.height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }
}

/// Read-only view of the renderer's live layout: current node positions plus measured sizes.
///
/// Measured dimensions win over a node's own `width`/`height`; nodes with neither fall back
/// to [`Dimensions::default`].
#[derive(Debug, Clone, Copy)]
pub struct LiveLayout<'a> {
    nodes: &'a [BoardNode],
    dimensions: &'a BTreeMap<String, Dimensions>,
}

impl<'a> LiveLayout<'a> {
    pub fn new(nodes: &'a [BoardNode], dimensions: &'a BTreeMap<String, Dimensions>) -> Self {
        Self { nodes, dimensions }
    }

    pub fn nodes(&self) -> &'a [BoardNode] {
        self.nodes
    }

    pub fn dimensions_of(&self, node: &BoardNode) -> Dimensions {
        if let Some(measured) = self.dimensions.get(&node.id).copied()
            && measured.is_valid()
        {
            return measured;
        }
        let own = Dimensions::new(
            node.width.unwrap_or(DEFAULT_NODE_WIDTH),
            node.height.unwrap_or(DEFAULT_NODE_HEIGHT),
        );
        if own.is_valid() { own } else { Dimensions::default() }
    }

    pub fn node_rect(&self, node: &BoardNode) -> Option<Rect> {
        node.position
            .is_valid()
            .then(|| Rect::at(node.position, self.dimensions_of(node)))
    }
}

/// Members of the group labelled `label`.
///
/// A node belongs when its id is listed in `node_ids`, when its `subgroup` is `label` and
/// it declares no `group`, or when its `group` is `label` and it declares no `subgroup`.
/// Containers are never members.
pub fn group_members<'a>(
    label: &str,
    node_ids: &[String],
    nodes: &'a [BoardNode],
) -> Vec<&'a BoardNode> {
    let explicit = node_ids.iter().map(String::as_str).collect::<BTreeSet<_>>();
    nodes
        .iter()
        .filter(|node| !node.is_container())
        .filter(|node| {
            let data = &node.data;
            explicit.contains(node.id.as_str())
                || (data.subgroup.as_deref() == Some(label) && data.group.is_none())
                || (data.group.as_deref() == Some(label) && data.subgroup.is_none())
        })
        .collect()
}

pub fn compute_group_bounds(label: &str, node_ids: &[String], live: &LiveLayout<'_>) -> Rect {
    let rects = group_members(label, node_ids, live.nodes())
        .into_iter()
        .filter_map(|node| live.node_rect(node))
        .collect::<Vec<_>>();
    padded_bounds(&rects).unwrap_or(EMPTY_GROUP_BOUNDS)
}

pub(crate) fn padded_bounds(rects: &[Rect]) -> Option<Rect> {
    let first = rects.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) =
        (first.x, first.y, first.right(), first.bottom());
    for rect in &rects[1..] {
        min_x = min_x.min(rect.x);
        min_y = min_y.min(rect.y);
        max_x = max_x.max(rect.right());
        max_y = max_y.max(rect.bottom());
    }

    Some(Rect {
        x: min_x - GROUP_SIDE_PADDING,
        y: min_y - GROUP_TOP_PADDING,
        width: (max_x - min_x) + GROUP_SIDE_PADDING * 2.0,
        height: (max_y - min_y) + GROUP_TOP_PADDING + GROUP_BOTTOM_PADDING,
    })
}

/// Positions and sizes every group container from its members' live rectangles.
///
/// A node that several containers claim is boxed only by the first of them in node order,
/// the same container the layout engine moves it with.
pub fn apply_group_bounds(
    nodes: &[BoardNode],
    dimensions: &BTreeMap<String, Dimensions>,
) -> Vec<BoardNode> {
    let live = LiveLayout::new(nodes, dimensions);
    let mut claimed = BTreeSet::<&str>::new();
    nodes
        .iter()
        .map(|node| {
            if !node.is_container() {
                return node.clone();
            }
            let rects = group_members(&node.data.label, &node.data.node_ids, nodes)
                .into_iter()
                .filter_map(|member| {
                    let rect = live.node_rect(member)?;
                    claimed.insert(member.id.as_str()).then_some(rect)
                })
                .collect::<Vec<_>>();
            let bounds = padded_bounds(&rects).unwrap_or(EMPTY_GROUP_BOUNDS);
            let mut container = node.clone();
            container.position = Position::new(bounds.x, bounds.y);
            container.width = Some(bounds.width);
            container.height = Some(bounds.height);
            container
        })
        .collect()
}
