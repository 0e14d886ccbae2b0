//! A plain 2D point set, the common currency between the RANSAC matcher's
//! `M`/`S` inputs and the ICP driver's `model`/`scene` inputs (spec.md §3's
//! "Scan (M or S)").

use nalgebra::{Matrix2xX, Vector2};

use crate::sensor::SensorPolar2D;

pub struct Scan {
    pub points: Matrix2xX<f32>,
    pub mask: Vec<bool>,
    pub normals: Option<Matrix2xX<f32>>,
}

impl Scan {
    pub fn from_sensor(sensor: &SensorPolar2D) -> Self {
        let columns: Vec<Vector2<f32>> = (0..sensor.beams())
            .map(|beam| sensor.point(beam).unwrap_or_else(Vector2::zeros))
            .collect();

        Self {
            points: Matrix2xX::from_columns(&columns),
            mask: sensor.mask.clone(),
            normals: None,
        }
    }

    pub fn from_points(points: Matrix2xX<f32>) -> Self {
        let mask = vec![true; points.ncols()];
        Self {
            points,
            mask,
            normals: None,
        }
    }

    pub fn len(&self) -> usize {
        self.points.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.points.ncols() == 0
    }

    /// Column indices whose mask entry is `true`.
    pub fn valid_indices(&self) -> Vec<usize> {
        self.mask
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| v.then_some(i))
            .collect()
    }

    /// Computes per-point normals from the local point-to-point tangent,
    /// leaving the two endpoints normal-less. Direct port of
    /// `icp.rs::compute_normals`.
    pub fn compute_normals(&mut self) {
        let n = self.points.ncols();
        let mut normals = Matrix2xX::zeros(n);

        if n > 2 {
            for i in 1..(n - 1) {
                let prev = self.points.column(i - 1);
                let next = self.points.column(i + 1);
                let diff = next - prev;
                let normal = Vector2::new(-diff.y, diff.x).normalize();
                normals.set_column(i, &normal);
            }
        }

        self.normals = Some(normals);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::robot::Pose2;

    #[test]
    fn from_sensor_drops_invalid_beams_to_origin() {
        let mut sensor = SensorPolar2D::new(4, std::f32::consts::FRAC_PI_2, 0.0, None);
        sensor.set_pose(Pose2::identity());
        sensor.set_beam(0, 1.0, true);
        sensor.set_beam(1, 1.0, false);
        sensor.set_beam(2, 1.0, true);
        sensor.set_beam(3, 1.0, true);

        let scan = Scan::from_sensor(&sensor);
        assert_eq!(scan.len(), 4);
        assert_eq!(scan.valid_indices(), vec![0, 2, 3]);
    }

    #[test]
    fn normals_are_unset_at_endpoints() {
        let points = Matrix2xX::from_columns(&[
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(2.0, 0.0),
        ]);
        let mut scan = Scan::from_points(points);
        scan.compute_normals();
        let normals = scan.normals.unwrap();
        assert_eq!(normals.column(0), Vector2::zeros());
        assert_eq!(normals.column(2), Vector2::zeros());
    }
}
