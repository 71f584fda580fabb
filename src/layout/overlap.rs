use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::graph::BoardNode;

use super::bounds::{
    Dimensions, LiveLayout, Rect, apply_group_bounds, group_members, padded_bounds,
};

pub const DEFAULT_MAX_ITERATIONS: usize = 50;
pub const DEFAULT_NODE_GAP: f64 = 20.0;

const OVERLAP_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    pub max_iterations: usize,
    pub gap: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            gap: DEFAULT_NODE_GAP,
        }
    }
}

/// A set of nodes moved as one rigid rectangle.
#[derive(Debug, Clone)]
struct Block {
    members: Vec<usize>,
    rect: Rect,
    anchor: bool,
}

/// Spreads nodes apart so that siblings and groups no longer overlap.
///
/// Siblings (same `group`/`subgroup`) are separated first; whole groups and ungrouped
/// nodes are then separated as rigid blocks. Anchored nodes never move. Containers end up
/// at their computed bounds. The input is left untouched and only positions change.
///
/// Each pass stops after `options.max_iterations` sweeps even if overlaps remain.
pub fn layout_with_groups(
    nodes: &[BoardNode],
    dimensions: &BTreeMap<String, Dimensions>,
    options: LayoutOptions,
) -> Vec<BoardNode> {
    let mut laid = nodes.to_vec();

    let mut sibling_converged = true;
    for tier in sibling_tiers(&laid, dimensions) {
        let mut blocks = tier;
        sibling_converged &= separate_blocks(&mut blocks, &mut laid, options);
    }

    let mut blocks = group_blocks(&laid, dimensions);
    let groups_converged = separate_blocks(&mut blocks, &mut laid, options);

    if !(sibling_converged && groups_converged) {
        debug!(
            nodes = laid.len(),
            max_iterations = options.max_iterations,
            "layout stopped with residual overlap"
        );
    }

    apply_group_bounds(&laid, dimensions)
}

/// One block per positioned node, grouped by `(group, subgroup)` and ordered top-to-bottom,
/// then left-to-right.
fn sibling_tiers(
    nodes: &[BoardNode],
    dimensions: &BTreeMap<String, Dimensions>,
) -> Vec<Vec<Block>> {
    let live = LiveLayout::new(nodes, dimensions);
    let mut tiers = BTreeMap::<(Option<&str>, Option<&str>), Vec<Block>>::new();
    for (index, node) in nodes.iter().enumerate() {
        if node.is_container() {
            continue;
        }
        let Some(rect) = live.node_rect(node) else {
            continue;
        };
        tiers
            .entry((node.data.group.as_deref(), node.data.subgroup.as_deref()))
            .or_default()
            .push(Block {
                members: vec![index],
                rect,
                anchor: node.data.anchor,
            });
    }

    tiers
        .into_values()
        .map(|mut blocks| {
            sort_blocks(&mut blocks);
            blocks
        })
        .collect()
}

/// One block per non-empty group container plus one per node no container claims.
fn group_blocks(nodes: &[BoardNode], dimensions: &BTreeMap<String, Dimensions>) -> Vec<Block> {
    let live = LiveLayout::new(nodes, dimensions);
    let index_of = nodes
        .iter()
        .enumerate()
        .map(|(index, node)| (node.id.as_str(), index))
        .collect::<BTreeMap<_, _>>();
    let mut claimed = BTreeSet::<usize>::new();
    let mut blocks = Vec::new();

    for container in nodes.iter().filter(|node| node.is_container()) {
        let mut members = Vec::new();
        let mut rects = Vec::new();
        for member in group_members(&container.data.label, &container.data.node_ids, nodes) {
            let Some(&index) = index_of.get(member.id.as_str()) else {
                continue;
            };
            let Some(rect) = live.node_rect(member) else {
                continue;
            };
            if claimed.insert(index) {
                members.push(index);
                rects.push(rect);
            }
        }
        let Some(rect) = padded_bounds(&rects) else {
            continue;
        };
        let anchor = members.iter().any(|&index| nodes[index].data.anchor);
        blocks.push(Block {
            members,
            rect,
            anchor,
        });
    }

    for (index, node) in nodes.iter().enumerate() {
        if node.is_container() || claimed.contains(&index) {
            continue;
        }
        if let Some(rect) = live.node_rect(node) {
            blocks.push(Block {
                members: vec![index],
                rect,
                anchor: node.data.anchor,
            });
        }
    }

    sort_blocks(&mut blocks);
    blocks
}

fn sort_blocks(blocks: &mut [Block]) {
    blocks.sort_by(|a, b| {
        a.rect
            .y
            .total_cmp(&b.rect.y)
            .then(a.rect.x.total_cmp(&b.rect.x))
            .then(a.members.first().cmp(&b.members.first()))
    });
}

/// Pairwise separation sweeps. Returns whether a sweep finished without moving anything.
fn separate_blocks(blocks: &mut [Block], nodes: &mut [BoardNode], options: LayoutOptions) -> bool {
    if blocks.len() < 2 {
        return true;
    }

    for _ in 0..options.max_iterations {
        let mut moved = false;
        for i in 0..blocks.len() {
            for j in (i + 1)..blocks.len() {
                let Some((dx, dy)) = separation(&blocks[i].rect, &blocks[j].rect, options.gap)
                else {
                    continue;
                };
                let target = match (blocks[i].anchor, blocks[j].anchor) {
                    (_, false) => Some((j, dx, dy)),
                    (false, true) => Some((i, -dx, -dy)),
                    (true, true) => None,
                };
                if let Some((index, dx, dy)) = target {
                    shift_block(&mut blocks[index], nodes, dx, dy);
                    moved = true;
                }
            }
        }
        if !moved {
            return true;
        }
    }
    false
}

fn shift_block(block: &mut Block, nodes: &mut [BoardNode], dx: f64, dy: f64) {
    block.rect.translate(dx, dy);
    for &index in &block.members {
        nodes[index].position = nodes[index].position.offset(dx, dy);
    }
}

/// Smallest displacement of `later` that leaves at least `gap` between the two rectangles,
/// or `None` when they are already far enough apart. Ties push right/down so the original
/// ordering is kept.
fn separation(earlier: &Rect, later: &Rect, gap: f64) -> Option<(f64, f64)> {
    let overlap_x = earlier.right().min(later.right()) - earlier.x.max(later.x);
    let overlap_y = earlier.bottom().min(later.bottom()) - earlier.y.max(later.y);
    if overlap_x + gap <= OVERLAP_EPSILON || overlap_y + gap <= OVERLAP_EPSILON {
        return None;
    }

    let (earlier_cx, earlier_cy) = earlier.center();
    let (later_cx, later_cy) = later.center();
    let direction = |delta: f64| if delta < -OVERLAP_EPSILON { -1.0 } else { 1.0 };

    let dir_x = direction(later_cx - earlier_cx);
    let push_x = if dir_x > 0.0 {
        earlier.right() + gap - later.x
    } else {
        later.right() + gap - earlier.x
    };
    let dir_y = direction(later_cy - earlier_cy);
    let push_y = if dir_y > 0.0 {
        earlier.bottom() + gap - later.y
    } else {
        later.bottom() + gap - earlier.y
    };

    if push_x <= push_y {
        Some((dir_x * push_x, 0.0))
    } else {
        Some((0.0, dir_y * push_y))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::document::ConfigDocument;
    use crate::graph::template::{BACKEND_SERVICE_ID, ECS_CLUSTER_GROUP_ID};
    use crate::graph::{BoardNode, NodeKind, Position, assemble_board_graph};
    use crate::layout::bounds::{Dimensions, LiveLayout, Rect, compute_group_bounds};
    use crate::test_support::SAMPLE_CONFIG_YAML;

    use super::{LayoutOptions, layout_with_groups, separation};

    fn node(id: &str, x: f64, y: f64) -> BoardNode {
        BoardNode::service(id, id, "service", Position::new(x, y))
    }

    fn rects_overlap(a: &Rect, b: &Rect) -> bool {
        a.x < b.right() && b.x < a.right() && a.y < b.bottom() && b.y < a.bottom()
    }

    fn assert_no_sibling_overlap(nodes: &[BoardNode]) {
        let dimensions = BTreeMap::new();
        let live = LiveLayout::new(nodes, &dimensions);
        let plain = nodes
            .iter()
            .filter(|node| !node.is_container())
            .collect::<Vec<_>>();
        for (i, a) in plain.iter().enumerate() {
            for b in plain.iter().skip(i + 1) {
                let ra = live.node_rect(a).expect("valid rect");
                let rb = live.node_rect(b).expect("valid rect");
                assert!(!rects_overlap(&ra, &rb), "{} overlaps {}", a.id, b.id);
            }
        }
    }

    #[test]
    fn separation_prefers_the_shorter_axis_and_keeps_order() {
        let earlier = Rect {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
        };
        let later = Rect {
            x: 90.0,
            y: 10.0,
            width: 100.0,
            height: 100.0,
        };
        assert_eq!(separation(&earlier, &later, 20.0), Some((30.0, 0.0)));

        let far = Rect {
            x: 130.0,
            ..later
        };
        assert_eq!(separation(&earlier, &far, 20.0), None);

        let stacked = Rect {
            x: 0.0,
            y: 0.0,
            ..later
        };
        assert_eq!(separation(&earlier, &stacked, 20.0), Some((120.0, 0.0)));

        let big = Rect {
            x: 0.0,
            y: 0.0,
            width: 200.0,
            height: 200.0,
        };
        let inner = Rect {
            x: 50.0,
            y: 50.0,
            width: 50.0,
            height: 50.0,
        };
        assert_eq!(separation(&big, &inner, 20.0), Some((-120.0, 0.0)));
    }

    #[test]
    fn overlapping_siblings_are_pushed_apart_without_touching_input() {
        let nodes = vec![
            node("a", 0.0, 0.0).in_group("Data"),
            node("b", 50.0, 10.0).in_group("Data"),
            node("c", 60.0, 20.0).in_group("Data"),
        ];
        let original = nodes.clone();

        let laid = layout_with_groups(&nodes, &BTreeMap::new(), LayoutOptions::default());

        assert_eq!(nodes, original);
        assert_no_sibling_overlap(&laid);
        assert_eq!(laid[0].position, Position::new(0.0, 0.0));
        assert!(laid[1].position.x > laid[0].position.x);
        assert!(laid[2].position.x > laid[1].position.x);
        for (before, after) in nodes.iter().zip(&laid) {
            assert_eq!(before.id, after.id);
            assert_eq!(before.data, after.data);
        }
    }

    #[test]
    fn anchors_never_move() {
        let nodes = vec![
            node("free", 0.0, 0.0),
            node("anchor", 40.0, 0.0).anchored(),
        ];

        let laid = layout_with_groups(&nodes, &BTreeMap::new(), LayoutOptions::default());
        assert_eq!(laid[1].position, Position::new(40.0, 0.0));
        assert_no_sibling_overlap(&laid);
        assert!(laid[0].position.x < 40.0);
    }

    #[test]
    fn overlapping_groups_are_separated_as_blocks() {
        let nodes = vec![
            BoardNode::container("group-a", NodeKind::Group, "A"),
            BoardNode::container("group-b", NodeKind::Group, "B"),
            node("a1", 0.0, 0.0).in_group("A"),
            node("a2", 200.0, 0.0).in_group("A"),
            node("b1", 100.0, 50.0).in_group("B"),
        ];

        let laid = layout_with_groups(&nodes, &BTreeMap::new(), LayoutOptions::default());
        let group_a = Rect {
            x: laid[0].position.x,
            y: laid[0].position.y,
            width: laid[0].width.expect("width set"),
            height: laid[0].height.expect("height set"),
        };
        let group_b = Rect {
            x: laid[1].position.x,
            y: laid[1].position.y,
            width: laid[1].width.expect("width set"),
            height: laid[1].height.expect("height set"),
        };
        assert!(!rects_overlap(&group_a, &group_b));
        assert_eq!(
            laid[3].position.x - laid[2].position.x,
            200.0,
            "members of a group move together"
        );
    }

    #[test]
    fn layout_is_idempotent_after_convergence() {
        let document = ConfigDocument::from_yaml_str(SAMPLE_CONFIG_YAML).expect("sample parses");
        let graph = assemble_board_graph(&document, "dev");
        let dimensions = BTreeMap::new();

        let once = layout_with_groups(&graph.nodes, &dimensions, LayoutOptions::default());
        let twice = layout_with_groups(&once, &dimensions, LayoutOptions::default());

        assert_eq!(once, twice);
        assert_no_sibling_overlap(&once);
    }

    #[test]
    fn worker_lands_inside_ecs_cluster_without_covering_backend() {
        let document = ConfigDocument::from_yaml_str(
            "project: shop\nenv: dev\nservices:\n  - name: worker\n",
        )
        .expect("document should parse");
        let graph = assemble_board_graph(&document, "dev");
        let dimensions = BTreeMap::new();

        let laid = layout_with_groups(&graph.nodes, &dimensions, LayoutOptions::default());
        let live = LiveLayout::new(&laid, &dimensions);
        let find = |id: &str| {
            laid.iter()
                .find(|node| node.id == id)
                .expect("node should exist")
        };
        let backend = live.node_rect(find(BACKEND_SERVICE_ID)).expect("valid");
        let worker = live.node_rect(find("service-worker")).expect("valid");
        assert!(!rects_overlap(&backend, &worker));
        assert_eq!(
            find(BACKEND_SERVICE_ID).position,
            Position::new(480.0, 360.0),
            "anchor keeps its template position"
        );

        let group = find(ECS_CLUSTER_GROUP_ID);
        let bounds = compute_group_bounds(&group.data.label, &group.data.node_ids, &live);
        assert!(bounds.contains(&backend));
        assert!(bounds.contains(&worker));
        assert_eq!(group.position, Position::new(bounds.x, bounds.y));
    }

    #[test]
    fn pathological_input_terminates() {
        let nodes = (0..40)
            .map(|index| node(&format!("n{index}"), 0.0, 0.0))
            .collect::<Vec<_>>();
        let options = LayoutOptions {
            max_iterations: 3,
            ..LayoutOptions::default()
        };

        let dimensions = BTreeMap::from([("n0".to_owned(), Dimensions::new(300.0, 200.0))]);

        let laid = layout_with_groups(&nodes, &dimensions, options);
        assert_eq!(laid.len(), nodes.len());
    }
}
