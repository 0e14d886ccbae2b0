use nalgebra::{Matrix3, Point2, Rotation2, Vector2};

/// The pose of a robot (or sensor) in the 2D plane.
///
/// Carries the same `(x, y, theta)` triple as the teacher's `Pose`, plus a
/// homogeneous-matrix view used throughout `slam` for composing and
/// inverting rigid transforms (scan matching, sensor frame conversions).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Pose2 {
    /// The x position of the robot
    pub x: f32,

    /// The y position of the robot
    pub y: f32,

    /// The rotation of the robot, measured in radians counter-clockwise from the positive x-axis.
    pub theta: f32,
}

impl Pose2 {
    pub fn new(x: f32, y: f32, theta: f32) -> Self {
        Self { x, y, theta }
    }

    pub fn identity() -> Self {
        Self::default()
    }

    /// Builds a pose from a 3x3 homogeneous transform matrix, extracting the
    /// rotation angle via `atan2` and the translation from the last column.
    pub fn from_matrix(m: &Matrix3<f32>) -> Self {
        Self {
            x: m[(0, 2)],
            y: m[(1, 2)],
            theta: m[(1, 0)].atan2(m[(0, 0)]),
        }
    }

    /// The 3x3 homogeneous transform matrix equivalent to this pose.
    pub fn as_matrix(&self) -> Matrix3<f32> {
        let (s, c) = self.theta.sin_cos();
        Matrix3::new(c, -s, self.x, s, c, self.y, 0.0, 0.0, 1.0)
    }

    pub fn position(&self) -> Vector2<f32> {
        Vector2::new(self.x, self.y)
    }

    pub fn rotation(&self) -> Rotation2<f32> {
        Rotation2::new(self.theta)
    }

    /// Composes `self` with `other`, i.e. applies `other` in `self`'s frame.
    pub fn compose(&self, other: &Pose2) -> Pose2 {
        Pose2::from_matrix(&(self.as_matrix() * other.as_matrix()))
    }

    pub fn inverse(&self) -> Pose2 {
        Pose2::from_matrix(&self.as_matrix().try_inverse().unwrap_or_else(Matrix3::identity))
    }

    /// Transforms a point given in this pose's local frame into world frame.
    pub fn transform_point(&self, p: &Point2<f32>) -> Point2<f32> {
        self.rotation() * p + self.position()
    }
}

impl From<Pose2> for (f32, f32) {
    fn from(val: Pose2) -> Self {
        (val.x, val.y)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn round_trip_matrix() {
        let pose = Pose2::new(1.0, -2.0, 0.7);
        let back = Pose2::from_matrix(&pose.as_matrix());
        assert_relative_eq!(pose.x, back.x, epsilon = 1e-5);
        assert_relative_eq!(pose.y, back.y, epsilon = 1e-5);
        assert_relative_eq!(pose.theta, back.theta, epsilon = 1e-5);
    }

    #[test]
    fn inverse_composes_to_identity() {
        let pose = Pose2::new(3.0, 4.0, 1.2);
        let identity = pose.compose(&pose.inverse());
        assert_relative_eq!(identity.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(identity.y, 0.0, epsilon = 1e-4);
        assert_relative_eq!(identity.theta, 0.0, epsilon = 1e-4);
    }
}
