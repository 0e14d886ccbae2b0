//! Shared frustum/visibility test used by both partition leaves and
//! internal tree nodes. Grounded on spec.md §4.3 (derived from
//! `original_source`'s `TsdGridComponent::isInRange`, which this crate
//! splits into the coarse centroid/circumradius check shared by branches
//! and leaves, plus a leaf-only beam refinement).

use nalgebra::Vector2;

use crate::sensor::SensorPolar2D;
use crate::tsd::cell::Visibility;

/// `centroid`/`circumradius` describe the node (partition or tree branch)
/// under test. `corners`, when `Some`, triggers the leaf-only beam
/// refinement (reject/empty based on per-beam ranges).
#[allow(clippy::too_many_arguments)]
pub fn frustum_test(
    centroid: Vector2<f32>,
    circumradius: f32,
    sensor_pos: Vector2<f32>,
    sensor: &SensorPolar2D,
    corners: Option<&[Vector2<f32>; 4]>,
    max_truncation: f32,
    min_range: f32,
    max_range: f32,
) -> Visibility {
    let d = (sensor_pos - centroid).norm();
    let near_dist = d - circumradius - max_truncation;
    let far_dist = d + circumradius + max_truncation;

    if near_dist > max_range || far_dist < min_range {
        return Visibility {
            reject: true,
            empty: false,
        };
    }

    let Some(corners) = corners else {
        return Visibility {
            reject: false,
            empty: false,
        };
    };

    let beam_indices: Vec<i32> = corners
        .iter()
        .map(|c| sensor.back_project_one(c))
        .collect();

    let max_beam = beam_indices.iter().copied().max().unwrap_or(-1);
    if max_beam < 0 {
        return Visibility {
            reject: true,
            empty: false,
        };
    }

    let min_beam = beam_indices
        .iter()
        .copied()
        .filter(|&b| b >= 0)
        .min()
        .unwrap_or(0)
        .max(0) as usize;
    let max_beam = max_beam as usize;

    let low_reflectivity_range = sensor.low_reflectivity_range();

    let mut visible = false;
    let mut all_beyond_far = true;

    for beam in min_beam..=max_beam.min(sensor.beams().saturating_sub(1)) {
        if !sensor.mask[beam] {
            continue;
        }
        let range = sensor.ranges[beam];

        if range > near_dist {
            visible = true;
        }

        let beyond_far = range > far_dist
            || (range.is_infinite() && low_reflectivity_range.is_some_and(|lr| d < lr));
        if !beyond_far {
            all_beyond_far = false;
        }
    }

    if !visible {
        return Visibility {
            reject: true,
            empty: false,
        };
    }

    if all_beyond_far {
        return Visibility {
            reject: true,
            empty: true,
        };
    }

    Visibility {
        reject: false,
        empty: false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::robot::Pose2;

    #[test]
    fn rejects_node_entirely_beyond_max_range() {
        let sensor = SensorPolar2D::new(4, std::f32::consts::FRAC_PI_2, 0.0, None);
        let visibility = frustum_test(
            Vector2::new(1000.0, 1000.0),
            1.0,
            Vector2::zeros(),
            &sensor,
            None,
            0.1,
            0.0,
            10.0,
        );
        assert!(visibility.reject);
        let _ = Pose2::identity();
    }

    #[test]
    fn accepts_close_node_without_beam_refinement() {
        let sensor = SensorPolar2D::new(4, std::f32::consts::FRAC_PI_2, 0.0, None);
        let visibility = frustum_test(
            Vector2::new(1.0, 0.0),
            0.5,
            Vector2::zeros(),
            &sensor,
            None,
            0.1,
            0.0,
            10.0,
        );
        assert!(!visibility.reject);
    }

    #[test]
    fn leaf_with_a_beam_passing_clean_through_is_reported_empty() {
        let corners = [
            Vector2::new(0.0, 0.0),
            Vector2::new(2.0, 0.0),
            Vector2::new(2.0, 2.0),
            Vector2::new(0.0, 2.0),
        ];
        let mut sensor = SensorPolar2D::new(4, std::f32::consts::FRAC_PI_2, 0.0, None);
        for beam in 0..4 {
            sensor.set_beam(beam, 100.0, true);
        }

        let visibility = frustum_test(Vector2::new(1.0, 1.0), 1.5, Vector2::new(1.0, 1.0), &sensor, Some(&corners), 0.1, 0.0, 1000.0);
        assert!(visibility.reject);
        assert!(visibility.empty);
    }

    #[test]
    fn leaf_with_a_beam_terminating_inside_is_not_empty() {
        let corners = [
            Vector2::new(0.0, 0.0),
            Vector2::new(2.0, 0.0),
            Vector2::new(2.0, 2.0),
            Vector2::new(0.0, 2.0),
        ];
        let mut sensor = SensorPolar2D::new(4, std::f32::consts::FRAC_PI_2, 0.0, None);
        for beam in 0..4 {
            sensor.set_beam(beam, 1.0, true);
        }

        let visibility = frustum_test(Vector2::new(1.0, 1.0), 1.5, Vector2::new(1.0, 1.0), &sensor, Some(&corners), 0.1, 0.0, 1000.0);
        assert!(!visibility.reject);
        assert!(!visibility.empty);
    }
}
