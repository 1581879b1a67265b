//! Tidy tree layout over a [`PrimaryTree`].
//!
//! Subtrees are laid out bottom-up. Each subtree keeps its left and right
//! contour (the outermost node on every level), and a new sibling subtree is
//! pushed right until, on every level they share, its left contour clears the
//! accumulated right contour by `separation(a, b) * width`. When a deeper
//! level forces the push, the extra room is shared out among the siblings in
//! between, so small subtrees do not bunch up against their left neighbour.
//! Parents are then centred over their first and last child.

use serde::{Deserialize, Serialize};

use crate::reduce::{PrimaryTree, TreeNode, VIRTUAL_ROOT};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Footprint of one node, used only for spacing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeSize {
    pub width: f64,
    pub height: f64,
}

/// Horizontal distance between neighbouring nodes, in node widths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeparationRule {
    /// Neighbours with the same primary parent.
    pub siblings: f64,
    /// Neighbours from different parents.
    pub cousins: f64,
}

impl Default for SeparationRule {
    fn default() -> Self {
        Self {
            siblings: 1.2,
            cousins: 1.4,
        }
    }
}

impl SeparationRule {
    pub fn between(&self, a: &TreeNode, b: &TreeNode) -> f64 {
        if a.parent == b.parent {
            self.siblings
        } else {
            self.cousins
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePosition {
    pub id: String,
    pub x: f64,
    pub y: f64,
    /// 1 for top-level companies.
    pub depth: usize,
}

impl NodePosition {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Contour point of a run of sibling subtrees: x, node slot, and the index
/// of the sibling subtree it belongs to.
type ForestPoint = (f64, usize, usize);

/// Outermost node per level of a subtree, relative to the subtree root.
struct Contour {
    left: Vec<(f64, usize)>,
    right: Vec<(f64, usize)>,
}

impl Contour {
    fn leaf(slot: usize) -> Self {
        Self {
            left: vec![(0.0, slot)],
            right: vec![(0.0, slot)],
        }
    }
}

pub fn layout(
    tree: &PrimaryTree,
    size: NodeSize,
    level_gap: f64,
    rule: SeparationRule,
) -> Vec<NodePosition> {
    layout_with(tree, size, level_gap, |a, b| rule.between(a, b))
}

/// Lays out `tree` with a caller-supplied separation function.
///
/// Rows are `size.height + level_gap` apart and top-level companies sit on
/// `y = 0`. Output is in pre-order and never contains the virtual root.
pub fn layout_with<F>(
    tree: &PrimaryTree,
    size: NodeSize,
    level_gap: f64,
    separation: F,
) -> Vec<NodePosition>
where
    F: Fn(&TreeNode, &TreeNode) -> f64,
{
    let nodes = tree.nodes();
    let order = tree.pre_order();

    let mut contours: Vec<Option<Contour>> = (0..nodes.len()).map(|_| None).collect();
    let mut offsets = vec![0.0_f64; nodes.len()];

    for &slot in order.iter().rev() {
        let children = &nodes[slot].children;
        let Some(&first) = children.first() else {
            contours[slot] = Some(Contour::leaf(slot));
            continue;
        };

        let seed = contours[first].take().unwrap_or_else(|| Contour::leaf(first));
        let mut left: Vec<ForestPoint> = seed.left.iter().map(|&(x, s)| (x, s, 0)).collect();
        let mut right: Vec<ForestPoint> = seed.right.iter().map(|&(x, s)| (x, s, 0)).collect();
        let mut shifts = vec![0.0_f64; children.len()];

        for (index, &child) in children.iter().enumerate().skip(1) {
            let incoming = contours[child].take().unwrap_or_else(|| Contour::leaf(child));
            let shared = right.len().min(incoming.left.len());

            // Level 0 always faces the previous sibling; deeper levels may face
            // an earlier one, and the push is then shared with the siblings between.
            let mut shift = f64::NEG_INFINITY;
            for level in 0..shared {
                let (right_x, right_slot, owner) = right[level];
                let (left_x, left_slot) = incoming.left[level];
                let gap = separation(&nodes[right_slot], &nodes[left_slot]) * size.width;
                let required = right_x + gap - left_x;
                if level == 0 {
                    shift = required;
                } else if required > shift {
                    spread(&mut shifts, &mut left, &mut right, owner, index, required - shift);
                    shift = required;
                }
            }
            shifts[index] = shift;

            let mut next_right: Vec<ForestPoint> = incoming
                .right
                .iter()
                .map(|&(x, s)| (x + shift, s, index))
                .collect();
            if right.len() > next_right.len() {
                next_right.extend_from_slice(&right[next_right.len()..]);
            }
            if incoming.left.len() > left.len() {
                let start = left.len();
                left.extend(
                    incoming.left[start..]
                        .iter()
                        .map(|&(x, s)| (x + shift, s, index)),
                );
            }
            right = next_right;
        }

        let middle = (shifts[0] + shifts[shifts.len() - 1]) / 2.0;
        for (index, &child) in children.iter().enumerate() {
            offsets[child] = shifts[index] - middle;
        }

        let mut contour = Contour::leaf(slot);
        contour
            .left
            .extend(left.into_iter().map(|(x, s, _)| (x - middle, s)));
        contour
            .right
            .extend(right.into_iter().map(|(x, s, _)| (x - middle, s)));
        contours[slot] = Some(contour);
    }

    let row_height = size.height + level_gap;
    let mut absolute = vec![0.0_f64; nodes.len()];
    let mut positions = Vec::with_capacity(tree.len());
    for &slot in &order {
        if slot == VIRTUAL_ROOT {
            continue;
        }
        let node = &nodes[slot];
        let parent_x = node.parent.map(|p| absolute[p]).unwrap_or(0.0);
        absolute[slot] = parent_x + offsets[slot];

        if let Some(id) = &node.id {
            positions.push(NodePosition {
                id: id.clone(),
                x: absolute[slot],
                y: (node.depth.saturating_sub(1)) as f64 * row_height,
                depth: node.depth,
            });
        }
    }

    positions
}

/// Moves the siblings strictly between `from` and `to` right by a share of
/// `push` proportional to their distance from `from`, so the space opened
/// by pushing sibling `to` is spread evenly instead of piling up next to it.
fn spread(
    shifts: &mut [f64],
    left: &mut [ForestPoint],
    right: &mut [ForestPoint],
    from: usize,
    to: usize,
    push: f64,
) {
    if to <= from + 1 {
        return;
    }
    let span = (to - from) as f64;
    let share = |sibling: usize| push * (sibling - from) as f64 / span;

    for sibling in from + 1..to {
        shifts[sibling] += share(sibling);
    }
    for point in left.iter_mut().chain(right.iter_mut()) {
        if point.2 > from && point.2 < to {
            point.0 += share(point.2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Company;
    use crate::reduce::reduce_to_tree;
    use std::collections::HashMap;

    const SIZE: NodeSize = NodeSize {
        width: 100.0,
        height: 50.0,
    };

    fn by_id(positions: &[NodePosition]) -> HashMap<&str, &NodePosition> {
        positions.iter().map(|p| (p.id.as_str(), p)).collect()
    }

    #[test]
    fn single_company_sits_at_origin() {
        let tree = reduce_to_tree(&[Company::new("solo", "Solo")]);
        let positions = layout(&tree, SIZE, 20.0, SeparationRule::default());
        assert_eq!(positions.len(), 1);
        assert_eq!((positions[0].x, positions[0].y), (0.0, 0.0));
    }

    #[test]
    fn parents_are_centred_over_children() {
        let companies = vec![
            Company::new("H", "H"),
            Company::new("A", "A").with_parents(["H"]),
            Company::new("B", "B").with_parents(["H"]),
            Company::new("C", "C").with_parents(["H"]),
        ];
        let positions = layout(&reduce_to_tree(&companies), SIZE, 20.0, SeparationRule::default());
        let pos = by_id(&positions);

        assert_eq!(pos["H"].x, 0.0);
        assert_eq!(pos["H"].y, 0.0);
        assert_eq!(pos["A"].y, 70.0);
        assert!((pos["B"].x - pos["A"].x - 120.0).abs() < 1e-9);
        assert!((pos["C"].x - pos["B"].x - 120.0).abs() < 1e-9);
        assert!((pos["H"].x - (pos["A"].x + pos["C"].x) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn cousins_get_wider_spacing() {
        let companies = vec![
            Company::new("H", "H"),
            Company::new("A", "A").with_parents(["H"]),
            Company::new("B", "B").with_parents(["H"]),
            Company::new("A1", "A1").with_parents(["A"]),
            Company::new("B1", "B1").with_parents(["B"]),
        ];
        let positions = layout(&reduce_to_tree(&companies), SIZE, 20.0, SeparationRule::default());
        let pos = by_id(&positions);

        assert!((pos["B1"].x - pos["A1"].x - 140.0).abs() < 1e-9);
        assert!((pos["B"].x - pos["A"].x - 140.0).abs() < 1e-9);
    }

    #[test]
    fn leaf_between_wide_subtrees_is_centred() {
        let mut companies = vec![
            Company::new("H", "H"),
            Company::new("A", "A").with_parents(["H"]),
            Company::new("B", "B").with_parents(["H"]),
            Company::new("C", "C").with_parents(["H"]),
        ];
        for i in 0..3 {
            companies.push(Company::new(format!("a{i}"), "a").with_parents(["A"]));
            companies.push(Company::new(format!("c{i}"), "c").with_parents(["C"]));
        }
        let size = NodeSize {
            width: 180.0,
            height: 50.0,
        };
        let positions = layout(&reduce_to_tree(&companies), size, 20.0, SeparationRule::default());
        let pos = by_id(&positions);

        assert!((pos["A"].x + 342.0).abs() < 1e-9);
        assert!(pos["B"].x.abs() < 1e-9);
        assert!((pos["C"].x - 342.0).abs() < 1e-9);
        assert!((pos["c0"].x - pos["a2"].x - 252.0).abs() < 1e-9);
    }

    #[test]
    fn middle_siblings_share_the_push() {
        let mut companies = vec![Company::new("H", "H")];
        for name in ["A", "B", "C", "D"] {
            companies.push(Company::new(name, name).with_parents(["H"]));
        }
        for i in 0..4 {
            companies.push(Company::new(format!("a{i}"), "a").with_parents(["A"]));
            companies.push(Company::new(format!("d{i}"), "d").with_parents(["D"]));
        }
        let positions = layout(&reduce_to_tree(&companies), SIZE, 20.0, SeparationRule::default());
        let pos = by_id(&positions);

        let gaps = [
            pos["B"].x - pos["A"].x,
            pos["C"].x - pos["B"].x,
            pos["D"].x - pos["C"].x,
        ];
        assert!((gaps[0] - gaps[1]).abs() < 1e-9);
        assert!((gaps[1] - gaps[2]).abs() < 1e-9);
        assert!(gaps[0] >= SIZE.width * 1.2);
    }

    #[test]
    fn deep_subtrees_do_not_overlap() {
        let mut companies = vec![
            Company::new("root", "root"),
            Company::new("left", "left").with_parents(["root"]),
            Company::new("right", "right").with_parents(["root"]),
        ];
        for i in 0..4 {
            companies.push(Company::new(format!("l{i}"), "l").with_parents(["left"]));
            companies.push(Company::new(format!("r{i}"), "r").with_parents(["right"]));
        }
        companies.push(Company::new("l3x", "l").with_parents(["l3"]));
        companies.push(Company::new("r0x", "r").with_parents(["r0"]));

        let positions = layout(&reduce_to_tree(&companies), SIZE, 20.0, SeparationRule::default());
        for a in &positions {
            for b in &positions {
                if a.id != b.id && a.depth == b.depth {
                    assert!(
                        (a.x - b.x).abs() >= SIZE.width * 1.2 - 1e-9,
                        "{} and {} overlap",
                        a.id,
                        b.id
                    );
                }
            }
        }
    }

    #[test]
    fn long_chains_do_not_recurse() {
        let mut companies = vec![Company::new("n0", "n0")];
        for i in 1..2_000 {
            companies.push(
                Company::new(format!("n{i}"), "n").with_parents([format!("n{}", i - 1)]),
            );
        }
        let positions = layout(&reduce_to_tree(&companies), SIZE, 20.0, SeparationRule::default());
        assert_eq!(positions.len(), 2_000);
        assert!(positions.iter().all(|p| p.x == 0.0));
    }

    #[test]
    fn custom_separation_is_used() {
        let companies = vec![Company::new("A", "A"), Company::new("B", "B")];
        let positions = layout_with(&reduce_to_tree(&companies), SIZE, 0.0, |_, _| 3.0);
        assert!((positions[1].x - positions[0].x - 300.0).abs() < 1e-9);
    }
}
