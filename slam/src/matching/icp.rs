//! ICP driver (spec.md §4.5): pre-filter scene, assign nearest-neighbor
//! pairs, post-filter, estimate an incremental transform, repeat until
//! convergence. Grounded on the teacher's `icp_point_to_normal` outer loop,
//! restructured around the `PairAssign`/`PairFilter`/`RigidEstimator`
//! capability sets instead of one monolithic function.

use common::robot::Pose2;
use nalgebra::Matrix2xX;

use crate::matching::assign::{ModelTree, PairAssign};
use crate::matching::estimate::{EstimatorError, RigidEstimator};
use crate::matching::filter::{FilterContext, PairFilter};
use crate::matching::Pair;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IcpTermination {
    Converged,
    MaxIterations,
    RmsThreshold,
    RankDeficient,
}

pub struct IcpResult {
    pub pose: Pose2,
    pub termination_reason: IcpTermination,
    pub rms_history: Vec<f32>,
}

pub struct IcpMatcher<A, E> {
    pub assigner: A,
    pub estimator: E,
    pub pre_filters: Vec<Box<dyn PairFilter>>,
    pub post_filters: Vec<Box<dyn PairFilter>>,
    pub max_iterations: usize,
    pub max_rms: f32,
    pub convergence_counter: usize,
}

impl<A: PairAssign, E: RigidEstimator> IcpMatcher<A, E> {
    #[tracing::instrument(skip_all)]
    pub fn run(
        &self,
        model: &Matrix2xX<f32>,
        model_normals: Option<&Matrix2xX<f32>>,
        scene: &Matrix2xX<f32>,
        model_valid: &[usize],
        initial_pose: Pose2,
    ) -> IcpResult {
        let model_tree = ModelTree::build(model, model_valid);
        let mut pose = initial_pose;
        let mut rms_history = Vec::with_capacity(self.max_iterations);
        let mut stable_iterations = 0usize;
        let mut last_rms = f32::INFINITY;
        let mut last_pair_count = usize::MAX;

        for iteration in 0..self.max_iterations {
            let current_scene: Vec<_> = scene
                .column_iter()
                .map(|c| pose.transform_point(&c.into_owned().into()).coords)
                .collect();
            let current_scene = Matrix2xX::from_columns(&current_scene);

            let identity_pairs: Vec<Pair> = (0..current_scene.ncols())
                .map(|i| Pair { scene_idx: i, model_idx: i, distance: 0.0 })
                .collect();

            let ctx = FilterContext { scene: &current_scene, model, iteration };
            let surviving = self
                .pre_filters
                .iter()
                .fold(identity_pairs, |pairs, filter| filter.filter(pairs, &ctx));
            let surviving_indices: Vec<usize> = surviving.iter().map(|p| p.scene_idx).collect();

            let filtered_columns: Vec<_> = surviving_indices.iter().map(|&i| current_scene.column(i).into_owned()).collect();
            let filtered_scene = Matrix2xX::from_columns(&filtered_columns);

            let mut pairs = self.assigner.assign(&filtered_scene, &model_tree);
            for pair in pairs.iter_mut() {
                pair.scene_idx = surviving_indices[pair.scene_idx];
            }

            let ctx = FilterContext { scene: &current_scene, model, iteration };
            let pairs = self.post_filters.iter().fold(pairs, |pairs, filter| filter.filter(pairs, &ctx));

            match self.estimator.estimate(&current_scene, model, model_normals, &pairs) {
                Ok(estimate) => {
                    pose = estimate.delta.compose(&pose);
                    rms_history.push(estimate.rms);

                    let rms_stable = (estimate.rms - last_rms).abs() < 1e-6;
                    let count_stable = pairs.len() == last_pair_count;
                    if rms_stable && count_stable {
                        stable_iterations += 1;
                    } else {
                        stable_iterations = 0;
                    }
                    last_rms = estimate.rms;
                    last_pair_count = pairs.len();

                    if estimate.rms <= self.max_rms {
                        return IcpResult { pose, termination_reason: IcpTermination::RmsThreshold, rms_history };
                    }
                    if stable_iterations >= self.convergence_counter {
                        return IcpResult { pose, termination_reason: IcpTermination::Converged, rms_history };
                    }
                }
                Err(EstimatorError::RankDeficient) | Err(EstimatorError::MissingNormals) => {
                    return IcpResult { pose, termination_reason: IcpTermination::RankDeficient, rms_history };
                }
            }
        }

        IcpResult { pose, termination_reason: IcpTermination::MaxIterations, rms_history }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::matching::assign::KdTreeAssign;
    use crate::matching::estimate::ClosedForm2D;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    #[test]
    fn converges_on_a_simple_translation() {
        let model = Matrix2xX::from_columns(&[
            Vector2::new(0.0, 1.0),
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(2.0, 0.0),
        ]);
        let scene = model.clone();

        let matcher = IcpMatcher {
            assigner: KdTreeAssign,
            estimator: ClosedForm2D,
            pre_filters: Vec::new(),
            post_filters: Vec::new(),
            max_iterations: 10,
            max_rms: 1e-5,
            convergence_counter: 3,
        };

        let result = matcher.run(&model, None, &scene, &[0, 1, 2, 3], Pose2::identity());
        assert_relative_eq!(result.pose.x, 0.0, epsilon = 1e-3);
        assert_relative_eq!(result.pose.y, 0.0, epsilon = 1e-3);
        assert_relative_eq!(result.pose.theta, 0.0, epsilon = 1e-3);
    }
}
