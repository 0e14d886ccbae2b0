//! Polar 2D sensor model: a fixed ray fan rotated/translated by the sensor's
//! current pose. Ported from `original_source`'s `Sensor`/`SensorPolar2D`
//! pair, which keep a homogeneous pose and a precomputed ray matrix that is
//! only re-rotated (never re-derived) when the sensor moves.

use common::robot::Pose2;
use nalgebra::{Matrix2xX, Vector2};

/// A single beam's range reading, together with validity/accuracy bookkeeping.
#[derive(Clone, Debug)]
pub struct SensorPolar2D {
    beams: usize,
    angular_res: f32,
    phi_min: f32,
    max_range: Option<f32>,
    low_reflectivity_range: Option<f32>,

    pub ranges: Vec<f32>,
    pub mask: Vec<bool>,
    pub accuracy: Option<Vec<f32>>,

    pose: Pose2,

    /// Unit ray directions in the sensor's own frame, fixed at construction.
    local_rays: Matrix2xX<f32>,

    /// `local_rays` rotated into the current world frame by `set_pose`.
    world_rays: Matrix2xX<f32>,
}

impl SensorPolar2D {
    pub fn new(beams: usize, angular_res: f32, phi_min: f32, max_range: Option<f32>) -> Self {
        let columns: Vec<Vector2<f32>> = (0..beams)
            .map(|i| {
                let phi = phi_min + i as f32 * angular_res;
                Vector2::new(phi.cos(), phi.sin())
            })
            .collect();
        let local_rays = Matrix2xX::from_columns(&columns);
        let world_rays = local_rays.clone();

        Self {
            beams,
            angular_res,
            phi_min,
            max_range,
            low_reflectivity_range: None,
            ranges: vec![0.0; beams],
            mask: vec![false; beams],
            accuracy: None,
            pose: Pose2::identity(),
            local_rays,
            world_rays,
        }
    }

    pub fn with_low_reflectivity_range(mut self, range: f32) -> Self {
        self.low_reflectivity_range = Some(range);
        self
    }

    pub fn beams(&self) -> usize {
        self.beams
    }

    pub fn angular_res(&self) -> f32 {
        self.angular_res
    }

    pub fn phi_min(&self) -> f32 {
        self.phi_min
    }

    pub fn max_range(&self) -> Option<f32> {
        self.max_range
    }

    pub fn low_reflectivity_range(&self) -> Option<f32> {
        self.low_reflectivity_range
    }

    pub fn pose(&self) -> Pose2 {
        self.pose
    }

    /// Sets the sensor's pose, re-deriving the world-frame ray matrix by
    /// rotating the fixed sensor-frame rays (translation is carried
    /// separately by `pose`, mirroring `Sensor::transform` splitting `R` out
    /// of `T`).
    pub fn set_pose(&mut self, pose: Pose2) {
        self.pose = pose;
        let rotation = pose.rotation();
        for (mut world_col, local_col) in self
            .world_rays
            .column_iter_mut()
            .zip(self.local_rays.column_iter())
        {
            world_col.copy_from(&(rotation * local_col));
        }
    }

    /// Applies an incremental pose change in the sensor's current frame.
    pub fn transform(&mut self, delta: Pose2) {
        let new_pose = self.pose.compose(&delta);
        self.set_pose(new_pose);
    }

    pub fn position(&self) -> Vector2<f32> {
        self.pose.position()
    }

    /// World-frame unit direction of the given beam.
    pub fn ray(&self, beam: usize) -> Vector2<f32> {
        self.world_rays.column(beam).into_owned()
    }

    pub fn set_beam(&mut self, beam: usize, range: f32, valid: bool) {
        self.ranges[beam] = range;
        self.mask[beam] = valid;
    }

    /// World-frame point measured by `beam`, or `None` if invalid.
    pub fn point(&self, beam: usize) -> Option<Vector2<f32>> {
        if !self.mask[beam] {
            return None;
        }
        Some(self.position() + self.ray(beam) * self.ranges[beam])
    }

    /// Inverts the polar map for a batch of world-frame points: for each
    /// column, returns the beam index it falls on, or `-1` if it falls
    /// outside `[0, beams)`.
    pub fn back_project(&self, points: &Matrix2xX<f32>) -> Vec<i32> {
        points
            .column_iter()
            .map(|p| self.back_project_one(&p.into_owned()))
            .collect()
    }

    /// Scalar variant of [`Self::back_project`] used on the RANSAC/ICP hot
    /// path where allocating a full result vector per call would be wasteful.
    pub fn back_project_one(&self, world_point: &Vector2<f32>) -> i32 {
        let local = self.pose.inverse().rotation() * (world_point - self.pose.position());
        let phi = local.y.atan2(local.x);
        let beam = ((phi - self.phi_min) / self.angular_res).round();
        if beam < 0.0 || beam >= self.beams as f32 {
            -1
        } else {
            beam as i32
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    #[test]
    fn ray_points_in_expected_direction() {
        let sensor = SensorPolar2D::new(4, PI / 2.0, 0.0, None);
        assert_relative_eq!(sensor.ray(0).x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(sensor.ray(1).y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn back_project_round_trips() {
        let mut sensor = SensorPolar2D::new(360, (1.0_f32).to_radians(), 0.0, None);
        sensor.set_pose(Pose2::new(1.0, 2.0, 0.3));

        for beam in [0usize, 90, 180, 270] {
            let world_point = sensor.position() + sensor.ray(beam) * 2.0;
            let recovered = sensor.back_project_one(&world_point);
            assert_eq!(recovered, beam as i32);
        }
    }
}
