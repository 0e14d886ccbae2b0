//! Non-owning frustum-culling tree over the `M x M` partition matrix.
//! Grounded on `original_source`'s `TsdGridBranch`/`TsdGridComponent`
//! hierarchy, de-cycled per the Design Notes: nodes hold `PartitionIndex`
//! leaves rather than partition pointers, and the grid alone owns partition
//! storage.

use nalgebra::Vector2;

use crate::sensor::SensorPolar2D;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct PartitionIndex {
    pub row: usize,
    pub col: usize,
}

enum TreeNode {
    Leaf {
        index: PartitionIndex,
        centroid: Vector2<f32>,
        circumradius: f32,
        corners: [Vector2<f32>; 4],
    },
    Branch {
        children: Vec<TreeNode>,
        centroid: Vector2<f32>,
        circumradius: f32,
    },
}

impl TreeNode {
    fn centroid(&self) -> Vector2<f32> {
        match self {
            TreeNode::Leaf { centroid, .. } => *centroid,
            TreeNode::Branch { centroid, .. } => *centroid,
        }
    }

    fn circumradius(&self) -> f32 {
        match self {
            TreeNode::Leaf { circumradius, .. } => *circumradius,
            TreeNode::Branch { circumradius, .. } => *circumradius,
        }
    }
}

/// Built once at grid construction; queried read-only during `push`'s
/// frustum pre-filter.
pub struct PartitionTree {
    root: TreeNode,
}

impl PartitionTree {
    /// `leaves[row][col]` gives each partition's `(centroid, circumradius, corners)`.
    /// Builds a quadtree-ish balanced grouping by recursive quadrant split.
    pub fn build(leaves: &[Vec<(Vector2<f32>, f32, [Vector2<f32>; 4])>]) -> Self {
        let partitions_in_y = leaves.len();
        let partitions_in_x = if partitions_in_y > 0 { leaves[0].len() } else { 0 };

        let all_indices: Vec<PartitionIndex> = (0..partitions_in_y)
            .flat_map(|row| (0..partitions_in_x).map(move |col| PartitionIndex { row, col }))
            .collect();

        let root = Self::build_recursive(leaves, &all_indices);
        Self { root }
    }

    fn build_recursive(leaves: &[Vec<(Vector2<f32>, f32, [Vector2<f32>; 4])>], indices: &[PartitionIndex]) -> TreeNode {
        if indices.len() == 1 {
            let idx = indices[0];
            let (centroid, circumradius, corners) = leaves[idx.row][idx.col];
            return TreeNode::Leaf {
                index: idx,
                centroid,
                circumradius,
                corners,
            };
        }

        // split roughly in half, grouping by row then column (keeps spatial
        // locality without needing full quadtree bookkeeping)
        let mid = indices.len() / 2;
        let (left, right) = indices.split_at(mid);

        let children = vec![
            Self::build_recursive(leaves, left),
            Self::build_recursive(leaves, right),
        ];

        let centroid = children
            .iter()
            .fold(Vector2::zeros(), |acc, c| acc + c.centroid())
            / children.len() as f32;

        let circumradius = children
            .iter()
            .map(|c| (c.centroid() - centroid).norm() + c.circumradius())
            .fold(0.0_f32, f32::max);

        TreeNode::Branch {
            children,
            centroid,
            circumradius,
        }
    }

    /// Collects the leaf indices whose coarse frustum test passes, tagged
    /// with whether the leaf-level beam refinement found the partition
    /// empty (sensor passed clean through it, no return within truncation
    /// range). Branch nodes are tested without corners, so only leaves can
    /// report `empty`.
    pub fn candidates(
        &self,
        sensor_pos: Vector2<f32>,
        sensor: &SensorPolar2D,
        max_truncation: f32,
        min_range: f32,
        max_range: f32,
    ) -> Vec<(PartitionIndex, bool)> {
        let mut out = Vec::new();
        Self::visit(
            &self.root,
            sensor_pos,
            sensor,
            max_truncation,
            min_range,
            max_range,
            &mut out,
        );
        out
    }

    fn visit(
        node: &TreeNode,
        sensor_pos: Vector2<f32>,
        sensor: &SensorPolar2D,
        max_truncation: f32,
        min_range: f32,
        max_range: f32,
        out: &mut Vec<(PartitionIndex, bool)>,
    ) {
        let corners: Option<&[Vector2<f32>; 4]> = match node {
            TreeNode::Leaf { corners, .. } => Some(corners),
            TreeNode::Branch { .. } => None,
        };

        let visibility = crate::tsd::frustum::frustum_test(
            node.centroid(),
            node.circumradius(),
            sensor_pos,
            sensor,
            corners,
            max_truncation,
            min_range,
            max_range,
        );
        if visibility.reject {
            if visibility.empty {
                if let TreeNode::Leaf { index, .. } = node {
                    out.push((*index, true));
                }
            }
            return;
        }

        match node {
            TreeNode::Leaf { index, .. } => out.push((*index, false)),
            TreeNode::Branch { children, .. } => {
                for child in children {
                    Self::visit(
                        child,
                        sensor_pos,
                        sensor,
                        max_truncation,
                        min_range,
                        max_range,
                        out,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::robot::Pose2;

    #[test]
    fn single_partition_builds_a_leaf() {
        let corners = [
            Vector2::new(0.0, 0.0),
            Vector2::new(2.0, 0.0),
            Vector2::new(2.0, 2.0),
            Vector2::new(0.0, 2.0),
        ];
        let leaves = vec![vec![(Vector2::new(1.0, 1.0), 1.5, corners)]];
        let tree = PartitionTree::build(&leaves);
        let mut sensor = SensorPolar2D::new(4, std::f32::consts::FRAC_PI_2, 0.0, None);
        for beam in 0..4 {
            sensor.set_beam(beam, 1.0, true);
        }
        let candidates = tree.candidates(Vector2::new(1.0, 1.0), &sensor, 0.1, 0.0, 100.0);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0], (PartitionIndex { row: 0, col: 0 }, false));
        let _ = Pose2::identity();
    }

    #[test]
    fn a_beam_passing_clean_through_reports_the_leaf_empty() {
        let corners = [
            Vector2::new(0.0, 0.0),
            Vector2::new(2.0, 0.0),
            Vector2::new(2.0, 2.0),
            Vector2::new(0.0, 2.0),
        ];
        let leaves = vec![vec![(Vector2::new(1.0, 1.0), 1.5, corners)]];
        let tree = PartitionTree::build(&leaves);

        let mut sensor = SensorPolar2D::new(4, std::f32::consts::FRAC_PI_2, 0.0, None);
        for beam in 0..4 {
            sensor.set_beam(beam, 100.0, true);
        }

        let candidates = tree.candidates(Vector2::new(1.0, 1.0), &sensor, 0.1, 0.0, 1000.0);
        assert_eq!(candidates, vec![(PartitionIndex { row: 0, col: 0 }, true)]);
    }
}
