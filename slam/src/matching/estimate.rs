//! Rigid 2D transform estimators. `ClosedForm2D` is the direct point-to-point
//! least-squares solution (spec.md §4.5); `PointToLine2D` ports the teacher's
//! `icp.rs::prepare_system_normals`/`jacobian`/`least_squares` machinery,
//! specialized to solve for an incremental delta about the identity (the
//! accumulated pose lives in `IcpMatcher::run` instead of inside the
//! estimator, unlike the teacher's single monolithic loop).

use common::robot::Pose2;
use nalgebra::{Matrix2, Matrix2xX, Matrix3, Vector2, Vector3};

use crate::matching::Pair;

pub struct Estimate {
    pub delta: Pose2,
    pub rms: f32,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum EstimatorError {
    #[error("fewer than 3 pairs survived filtering")]
    RankDeficient,
    #[error("estimator requires model normals but none were supplied")]
    MissingNormals,
}

pub trait RigidEstimator {
    fn estimate(
        &self,
        scene: &Matrix2xX<f32>,
        model: &Matrix2xX<f32>,
        normals: Option<&Matrix2xX<f32>>,
        pairs: &[Pair],
    ) -> Result<Estimate, EstimatorError>;
}

/// Point-to-point closed-form rigid fit (spec.md §4.5): centroid-subtract,
/// 2x2 cross-covariance, `theta = atan2(H01 - H10, H00 + H11)`.
pub struct ClosedForm2D;

impl RigidEstimator for ClosedForm2D {
    fn estimate(
        &self,
        scene: &Matrix2xX<f32>,
        model: &Matrix2xX<f32>,
        _normals: Option<&Matrix2xX<f32>>,
        pairs: &[Pair],
    ) -> Result<Estimate, EstimatorError> {
        if pairs.len() < 3 {
            return Err(EstimatorError::RankDeficient);
        }

        let n = pairs.len() as f32;
        let scene_centroid = pairs
            .iter()
            .fold(Vector2::zeros(), |acc, p| acc + scene.column(p.scene_idx).into_owned())
            / n;
        let model_centroid = pairs
            .iter()
            .fold(Vector2::zeros(), |acc, p| acc + model.column(p.model_idx).into_owned())
            / n;

        let mut h = Matrix2::zeros();
        for pair in pairs {
            let s: Vector2<f32> = scene.column(pair.scene_idx).into_owned() - scene_centroid;
            let m: Vector2<f32> = model.column(pair.model_idx).into_owned() - model_centroid;
            h += s * m.transpose();
        }

        let theta = (h[(0, 1)] - h[(1, 0)]).atan2(h[(0, 0)] + h[(1, 1)]);
        let rotation = nalgebra::Rotation2::new(theta);
        let translation = model_centroid - rotation * scene_centroid;

        let mut chi = 0.0;
        for pair in pairs {
            let s = scene.column(pair.scene_idx).into_owned();
            let m = model.column(pair.model_idx).into_owned();
            let residual = rotation * s + translation - m;
            chi += residual.norm_squared();
        }

        Ok(Estimate {
            delta: Pose2::new(translation.x, translation.y, theta),
            rms: (chi / n).sqrt(),
        })
    }
}

/// Point-to-line estimator using model normals, ported from the teacher's
/// `prepare_system_normals` Gauss-Newton step and solved via `lstsq`.
pub struct PointToLine2D;

impl RigidEstimator for PointToLine2D {
    fn estimate(
        &self,
        scene: &Matrix2xX<f32>,
        model: &Matrix2xX<f32>,
        normals: Option<&Matrix2xX<f32>>,
        pairs: &[Pair],
    ) -> Result<Estimate, EstimatorError> {
        let normals = normals.ok_or(EstimatorError::MissingNormals)?;
        if pairs.len() < 3 {
            return Err(EstimatorError::RankDeficient);
        }

        // dR(0): derivative of the 2D rotation matrix at theta=0.
        let d_rotation_at_zero = Matrix2::new(0.0, -1.0, 1.0, 0.0);

        let mut hessian = Matrix3::zeros();
        let mut gradient = Vector3::zeros();
        let mut chi = 0.0;
        let mut used = 0usize;

        for pair in pairs {
            let p = scene.column(pair.scene_idx).into_owned();
            let q = model.column(pair.model_idx).into_owned();
            let normal = normals.column(pair.model_idx).into_owned();
            if normal.norm() < 1e-6 {
                continue;
            }

            let residual = normal.dot(&(p - q));

            let mut jacobian = nalgebra::Matrix2x3::identity();
            let rotated = d_rotation_at_zero * p;
            jacobian.set_column(2, &rotated);
            let row = normal.transpose() * jacobian;

            hessian += row.transpose() * row;
            gradient += row.transpose() * residual;
            chi += residual * residual;
            used += 1;
        }

        if used < 3 {
            return Err(EstimatorError::RankDeficient);
        }

        let solution = lstsq::lstsq(&hessian, &(-gradient), 1e-8)
            .map_err(|_| EstimatorError::RankDeficient)?
            .solution;

        Ok(Estimate {
            delta: Pose2::new(solution.x, solution.y, solution.z),
            rms: (chi / used as f32).sqrt(),
        })
    }
}

impl RigidEstimator for Box<dyn RigidEstimator> {
    fn estimate(
        &self,
        scene: &Matrix2xX<f32>,
        model: &Matrix2xX<f32>,
        normals: Option<&Matrix2xX<f32>>,
        pairs: &[Pair],
    ) -> Result<Estimate, EstimatorError> {
        (**self).estimate(scene, model, normals, pairs)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn closed_form_recovers_pure_translation() {
        let scene = Matrix2xX::from_columns(&[
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
        ]);
        let model = Matrix2xX::from_columns(&[
            Vector2::new(2.0, 3.0),
            Vector2::new(3.0, 3.0),
            Vector2::new(2.0, 4.0),
        ]);
        let pairs = vec![
            Pair { scene_idx: 0, model_idx: 0, distance: 0.0 },
            Pair { scene_idx: 1, model_idx: 1, distance: 0.0 },
            Pair { scene_idx: 2, model_idx: 2, distance: 0.0 },
        ];

        let estimate = ClosedForm2D.estimate(&scene, &model, None, &pairs).unwrap();
        assert_relative_eq!(estimate.delta.x, 2.0, epsilon = 1e-4);
        assert_relative_eq!(estimate.delta.y, 3.0, epsilon = 1e-4);
        assert_relative_eq!(estimate.delta.theta, 0.0, epsilon = 1e-4);
        assert_relative_eq!(estimate.rms, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn closed_form_recovers_a_positive_rotation() {
        let scene = Matrix2xX::from_columns(&[
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(-1.0, -1.0),
        ]);
        let rotation = nalgebra::Rotation2::new(std::f32::consts::FRAC_PI_2);
        let model = Matrix2xX::from_columns(&scene.column_iter().map(|c| rotation * c.into_owned()).collect::<Vec<_>>());
        let pairs = vec![
            Pair { scene_idx: 0, model_idx: 0, distance: 0.0 },
            Pair { scene_idx: 1, model_idx: 1, distance: 0.0 },
            Pair { scene_idx: 2, model_idx: 2, distance: 0.0 },
        ];

        let estimate = ClosedForm2D.estimate(&scene, &model, None, &pairs).unwrap();
        assert_relative_eq!(estimate.delta.theta, std::f32::consts::FRAC_PI_2, epsilon = 1e-4);
        assert_relative_eq!(estimate.rms, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn closed_form_rejects_too_few_pairs() {
        let scene = Matrix2xX::from_columns(&[Vector2::new(0.0, 0.0)]);
        let model = Matrix2xX::from_columns(&[Vector2::new(0.0, 0.0)]);
        let pairs = vec![Pair { scene_idx: 0, model_idx: 0, distance: 0.0 }];
        let result = ClosedForm2D.estimate(&scene, &model, None, &pairs);
        assert_eq!(result.unwrap_err(), EstimatorError::RankDeficient);
    }
}
