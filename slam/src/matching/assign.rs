//! Nearest-neighbor pair assignment over a k-d tree. Grounded on the
//! teacher's `icp.rs::matrix_to_kdmap`/`find_correspondences`, generalized
//! into the `PairAssign` capability-set trait (spec.md Design Notes §9).

use kd_tree::KdMap;
use nalgebra::Matrix2xX;

use crate::matching::Pair;

/// Read-only k-d tree over the valid model points, built once per ICP call.
pub struct ModelTree {
    tree: KdMap<[f32; 2], usize>,
}

impl ModelTree {
    pub fn build(model: &Matrix2xX<f32>, valid_indices: &[usize]) -> Self {
        let items: Vec<([f32; 2], usize)> = valid_indices
            .iter()
            .map(|&i| {
                let c = model.column(i);
                ([c.x, c.y], i)
            })
            .collect();
        Self {
            tree: KdMap::build_by_ordered_float(items),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Nearest model index and squared distance to `point`, or `None` if the
    /// tree has no entries.
    pub fn nearest(&self, point: [f32; 2]) -> Option<(usize, f32)> {
        let nearest = self.tree.nearest(&point)?;
        let dx = nearest.item.0[0] - point[0];
        let dy = nearest.item.0[1] - point[1];
        Some((nearest.item.1, dx * dx + dy * dy))
    }
}

pub trait PairAssign {
    fn assign(&self, scene: &Matrix2xX<f32>, model_tree: &ModelTree) -> Vec<Pair>;
}

pub struct KdTreeAssign;

impl PairAssign for KdTreeAssign {
    fn assign(&self, scene: &Matrix2xX<f32>, model_tree: &ModelTree) -> Vec<Pair> {
        if model_tree.is_empty() {
            return Vec::new();
        }

        scene
            .column_iter()
            .enumerate()
            .filter_map(|(i, p)| {
                model_tree.nearest([p.x, p.y]).map(|(model_idx, distance_sq)| Pair {
                    scene_idx: i,
                    model_idx,
                    distance: distance_sq.sqrt(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector2;

    #[test]
    fn assigns_each_scene_point_to_its_nearest_model_point() {
        let model = Matrix2xX::from_columns(&[Vector2::new(0.0, 0.0), Vector2::new(10.0, 0.0)]);
        let tree = ModelTree::build(&model, &[0, 1]);

        let scene = Matrix2xX::from_columns(&[Vector2::new(0.1, 0.0), Vector2::new(9.9, 0.0)]);
        let pairs = KdTreeAssign.assign(&scene, &tree);

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].model_idx, 0);
        assert_eq!(pairs[1].model_idx, 1);
    }
}
