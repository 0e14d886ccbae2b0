//! RANSAC scan-to-scan matcher (spec.md §4.6), ported from
//! `original_source`'s `RansacMatching::match`. The RNG is injected rather
//! than seeded internally, per the spec's Determinism Note.

use common::robot::Pose2;
use nalgebra::{Rotation2, Vector2};
use rand::Rng;

use crate::matching::assign::ModelTree;
use crate::scan::Scan;

const MIN_VALID_POINTS: usize = 10;

#[derive(Clone, Copy, Debug, serde::Deserialize)]
pub struct RansacParameters {
    pub trials: usize,
    pub eps_thresh: f32,
    pub size_control_set: usize,
    pub phi_max: f32,
    pub trans_max: f32,
    pub angular_resolution: f32,
    #[serde(default = "default_min_dist_2nd_sample")]
    pub min_dist_2nd_sample: usize,
}

fn default_min_dist_2nd_sample() -> usize {
    5
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RansacOutcome {
    Accepted { trials_used: usize },
    NoAcceptance { trials_without_acceptance: usize },
    TooFewValidPoints,
}

pub struct RansacMatcher {
    pub params: RansacParameters,
}

struct IntraDistanceLut {
    points: usize,
    max_dist: usize,
    dists: Vec<f32>,
}

impl IntraDistanceLut {
    fn build(points: &[Vector2<f32>], mask: &[bool], max_dist: usize) -> Self {
        let n = points.len();
        let mut dists = vec![f32::NAN; n * n];
        for i in 0..n {
            if !mask[i] {
                continue;
            }
            let j_max = (i + max_dist).min(n);
            for j in (i + 1)..j_max {
                if mask[j] {
                    dists[i * n + j] = (points[j] - points[i]).norm_squared();
                }
            }
        }
        Self { points: n, max_dist, dists }
    }

    fn get(&self, i: usize, j: usize) -> f32 {
        self.dists[i * self.points + j]
    }
}

impl RansacMatcher {
    #[tracing::instrument(skip_all)]
    pub fn match_scans(&self, model: &Scan, scene: &Scan, rng: &mut impl Rng) -> (Pose2, RansacOutcome) {
        let p = &self.params;

        let model_valid = model.valid_indices();
        let scene_valid = scene.valid_indices();
        if model_valid.len() < MIN_VALID_POINTS || scene_valid.len() < MIN_VALID_POINTS {
            return (Pose2::identity(), RansacOutcome::TooFewValidPoints);
        }

        let model_tree = ModelTree::build(&model.points, &model_valid);

        let points_in_s = scene.len();
        let points_in_m = model.len();

        let phi_max = p.phi_max.min(std::f32::consts::FRAC_PI_2);
        let resolution = p.angular_resolution;
        if resolution <= 1e-6 {
            return (Pose2::identity(), RansacOutcome::TooFewValidPoints);
        }
        let span = ((phi_max / resolution) as usize).min(points_in_m);
        let max_dist_2nd_sample = (phi_max / resolution) as usize;
        let min_dist_2nd_sample = p.min_dist_2nd_sample.max(1);

        let scene_points: Vec<Vector2<f32>> = scene.points.column_iter().map(|c| c.into_owned()).collect();
        let model_points: Vec<Vector2<f32>> = model.points.column_iter().map(|c| c.into_owned()).collect();

        let lut = IntraDistanceLut::build(&scene_points, &scene.mask, max_dist_2nd_sample);

        let control_size = p.size_control_set.min(scene_valid.len());
        let mut pool = scene_valid.clone();
        let mut idx_control = Vec::with_capacity(control_size);
        while idx_control.len() < control_size {
            let r = rng.gen_range(0..pool.len());
            idx_control.push(pool.swap_remove(r));
        }

        let eps_sqr = p.eps_thresh * p.eps_thresh;

        let mut best_pose = Pose2::identity();
        let mut cnt_best = 0usize;
        let mut err_best = f32::INFINITY;
        let mut rate_best = 0.0f32;
        let mut trials_used = 0usize;
        let mut accepted = false;

        if model_valid.len() <= 1 + min_dist_2nd_sample {
            return (Pose2::identity(), RansacOutcome::TooFewValidPoints);
        }

        for trial in 0..p.trials {
            trials_used = trial + 1;

            let rand_idx = rng.gen_range(0..(model_valid.len() - 1 - min_dist_2nd_sample));
            let idx1 = model_valid[rand_idx];
            let remaining = (model_valid.len() - rand_idx - 1).min(max_dist_2nd_sample);
            if remaining <= min_dist_2nd_sample {
                continue;
            }
            let idx2 = model_valid[rand_idx + rng.gen_range(0..(remaining - min_dist_2nd_sample)) + min_dist_2nd_sample];

            let v_model = model_points[idx2] - model_points[idx1];
            let c_model = (model_points[idx1] + model_points[idx2]) / 2.0;
            let dist_model = v_model.norm_squared();

            let i_min = idx1.saturating_sub(span);
            let i_max = (idx1 + span).min(points_in_s);

            for i in i_min..i_max {
                if !scene.mask[i] {
                    continue;
                }

                let i2_max = points_in_s.min(i + max_dist_2nd_sample);
                let mut min_dist = f32::INFINITY;
                let mut i_min_dist = 0usize;
                for i2 in (i + min_dist_2nd_sample)..i2_max {
                    if !scene.mask[i2] {
                        continue;
                    }
                    let dist_s = lut.get(i, i2);
                    let dist_eps = (dist_s - dist_model).abs();
                    if dist_eps < min_dist {
                        min_dist = dist_eps;
                        i_min_dist = i2;
                    }
                }

                if !(min_dist < eps_sqr) {
                    continue;
                }
                let scene_similar = scene_points[i_min_dist];

                let v_scene = scene_similar - scene_points[i];
                let mut phi_model = v_model.y.atan2(v_model.x);
                if phi_model < 0.0 {
                    phi_model += std::f32::consts::TAU;
                }
                let mut phi_scene = v_scene.y.atan2(v_scene.x);
                if phi_scene < 0.0 {
                    phi_scene += std::f32::consts::TAU;
                }
                let phi = phi_model - phi_scene;

                if phi.abs() >= phi_max {
                    continue;
                }

                let clipped_beams = (phi / resolution) as isize;
                let c_scene = (scene_similar + scene_points[i]) / 2.0;

                let rotation = Rotation2::new(phi);
                let translation = c_model - rotation * c_scene;
                if translation.norm() > p.trans_max {
                    continue;
                }

                let mut cnt_match = 0usize;
                let mut clipped_points = 0usize;
                let mut err = 0.0f32;

                for &control_idx in &idx_control {
                    let lower = clipped_beams.max(0) as usize;
                    let upper = ((points_in_s as isize + clipped_beams).max(0)) as usize;
                    if control_idx < lower || control_idx > upper.min(points_in_s) {
                        clipped_points += 1;
                        continue;
                    }

                    let transformed = rotation * scene_points[control_idx] + translation;
                    let Some((nearest_local, dist_sq)) = model_tree.nearest([transformed.x, transformed.y]) else {
                        clipped_points += 1;
                        continue;
                    };

                    let lower_m = (-clipped_beams).max(0) as usize;
                    let upper_m = ((points_in_s as isize - clipped_beams).max(0)) as usize;
                    if nearest_local < lower_m || nearest_local > upper_m.min(points_in_s) {
                        clipped_points += 1;
                        continue;
                    }

                    err += dist_sq;
                    if dist_sq < eps_sqr {
                        cnt_match += 1;
                    }
                }

                if cnt_match == 0 {
                    continue;
                }
                err = err.sqrt();

                let max_match_cnt = idx_control.len() - clipped_points;
                if max_match_cnt == 0 {
                    continue;
                }
                let cnt_rate = cnt_match as f32 / max_match_cnt as f32;
                let equal_thresh = 1e-5;

                let rate_condition = (cnt_rate - rate_best) > equal_thresh && cnt_match > cnt_best;
                let error_condition = (cnt_rate - rate_best).abs() < equal_thresh && cnt_match == cnt_best && err < err_best;

                if rate_condition || error_condition {
                    err_best = err;
                    cnt_best = cnt_match;
                    rate_best = cnt_rate;
                    best_pose = Pose2::new(translation.x, translation.y, phi);
                    accepted = true;
                }
            }
        }

        if accepted {
            (best_pose, RansacOutcome::Accepted { trials_used })
        } else {
            (Pose2::identity(), RansacOutcome::NoAcceptance { trials_without_acceptance: trials_used })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Matrix2xX;
    use rand::SeedableRng;

    fn line_scan(offset: Vector2<f32>) -> Scan {
        let points: Vec<Vector2<f32>> = (0..30).map(|i| Vector2::new(i as f32 * 0.1, 0.0) + offset).collect();
        Scan::from_points(Matrix2xX::from_columns(&points))
    }

    #[test]
    fn too_few_valid_points_aborts_immediately() {
        let model = Scan::from_points(Matrix2xX::zeros(3));
        let scene = Scan::from_points(Matrix2xX::zeros(3));
        let matcher = RansacMatcher {
            params: RansacParameters {
                trials: 10,
                eps_thresh: 0.1,
                size_control_set: 5,
                phi_max: 0.5,
                trans_max: 1.0,
                angular_resolution: 0.05,
                min_dist_2nd_sample: 5,
            },
        };
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let (_, outcome) = matcher.match_scans(&model, &scene, &mut rng);
        assert_eq!(outcome, RansacOutcome::TooFewValidPoints);
    }

    #[test]
    fn identical_scans_are_matched_with_near_identity() {
        let model = line_scan(Vector2::zeros());
        let scene = line_scan(Vector2::zeros());
        let matcher = RansacMatcher {
            params: RansacParameters {
                trials: 200,
                eps_thresh: 0.05,
                size_control_set: 15,
                phi_max: 0.3,
                trans_max: 1.0,
                angular_resolution: 0.02,
                min_dist_2nd_sample: 5,
            },
        };
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let (pose, outcome) = matcher.match_scans(&model, &scene, &mut rng);
        assert!(matches!(outcome, RansacOutcome::Accepted { .. }));
        assert!(pose.x.abs() < 0.2);
        assert!(pose.y.abs() < 0.2);
    }
}
