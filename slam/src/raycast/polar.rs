//! Per-beam raycasting against a `TsdGrid`: coarse partition skip, fine-step
//! sign-change detection, normal lookup. Grounded on spec.md §4.4 and
//! `original_source`'s `RayCastPolar2D::calcCoords`.

use nalgebra::Vector2;

use crate::sensor::SensorPolar2D;
use crate::tsd::{InterpolationStatus, TsdGrid};

/// Bounds the fine-step loop so a degenerate configuration (near-parallel
/// ray, inverted bounds) reports `RaycastOutcome::Timeout` instead of
/// looping until `idx_max`, which can be `inf`-adjacent. Absent from
/// `original_source`, whose equivalent loop is bounded by a finite
/// `idxMax` that this port can't always guarantee (`max_range` defaults
/// to `None`).
const MAX_RAY_STEPS: u32 = 100_000;

#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    pub point: Vector2<f32>,
    pub normal: Vector2<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RaycastOutcome {
    Hit(RayHit),
    NoHit,
    Timeout,
}

/// 1D slab clip of `pos + t*dir` against `[lo, hi]`. Returns `None` if the
/// ray is parallel to the slab and starts outside it.
fn clip_slab(pos: f32, dir: f32, lo: f32, hi: f32) -> Option<(f32, f32)> {
    if dir.abs() < 1e-12 {
        return if pos >= lo && pos <= hi {
            Some((f32::NEG_INFINITY, f32::INFINITY))
        } else {
            None
        };
    }
    let t1 = (lo - pos) / dir;
    let t2 = (hi - pos) / dir;
    Some((t1.min(t2), t1.max(t2)))
}

fn clip_to_grid<const P: usize>(
    position: Vector2<f32>,
    direction: Vector2<f32>,
    grid: &TsdGrid<P>,
    max_range: Option<f32>,
) -> Option<(f32, f32)> {
    let extent = grid.grid_extent();
    let (x_min, x_max) = clip_slab(position.x, direction.x, 0.0, extent)?;
    let (y_min, y_max) = clip_slab(position.y, direction.y, 0.0, extent)?;

    let mut idx_min = x_min.max(y_min).max(0.0);
    let mut idx_max = x_max.min(y_max);

    if let Some(max_range) = max_range {
        idx_max = idx_max.min(max_range / grid.cell_size());
    }

    if idx_min >= idx_max {
        None
    } else {
        idx_min = idx_min.max(0.0);
        Some((idx_min, idx_max))
    }
}

fn cast_single_beam<const P: usize>(grid: &TsdGrid<P>, position: Vector2<f32>, direction: Vector2<f32>, max_range: Option<f32>) -> RaycastOutcome {
    let Some((idx_min, idx_max)) = clip_to_grid(position, direction, grid, max_range) else {
        return RaycastOutcome::NoHit;
    };

    let step_vec = direction * grid.cell_size();
    let partition_size = {
        // derive the partition's cell span from the grid layout rather than
        // hard-coding P, since P is also the partition's own const generic
        P
    };

    let mut idx = idx_min;
    let mut current = position + step_vec * idx;

    // coarse skip: step by partition_size until we're over initialized content
    let mut steps = 0u32;
    loop {
        let (status, _) = grid.interpolate_bilinear(current);
        if status != InterpolationStatus::EmptyPartition && status != InterpolationStatus::InvalidIndex {
            break;
        }
        idx += partition_size as f32;
        current = position + step_vec * idx;
        steps += 1;
        if idx >= idx_max {
            return RaycastOutcome::NoHit;
        }
        if steps > MAX_RAY_STEPS {
            tracing::warn!("polar raycast coarse skip exceeded step cap");
            return RaycastOutcome::Timeout;
        }
    }

    let (status, mut tsd_prev) = grid.interpolate_bilinear(current);
    if status != InterpolationStatus::Success {
        tsd_prev = f32::NAN;
    }

    idx += 1.0;
    steps = 0;
    while idx < idx_max {
        current = position + step_vec * idx;
        let (status, tsd) = grid.interpolate_bilinear(current);

        if status == InterpolationStatus::Success && tsd_prev.is_finite() && tsd_prev > 0.0 && tsd < 0.0 {
            let alpha = tsd_prev / (tsd_prev - tsd);
            let point = current + step_vec * (alpha - 1.0);
            return match grid.interpolate_normal(point) {
                Some(normal) => RaycastOutcome::Hit(RayHit { point, normal }),
                None => RaycastOutcome::NoHit,
            };
        }

        if status == InterpolationStatus::Success {
            tsd_prev = tsd;
        }

        idx += 1.0;
        steps += 1;
        if steps > MAX_RAY_STEPS {
            tracing::warn!("polar raycast fine step exceeded step cap");
            return RaycastOutcome::Timeout;
        }
    }

    RaycastOutcome::NoHit
}

/// Casts every beam of `sensor` against `grid`, returning sensor-frame hits.
pub fn cast_polar<const P: usize>(grid: &TsdGrid<P>, sensor: &SensorPolar2D) -> Vec<Option<RayHit>> {
    let position = sensor.position();
    let sensor_pose_inv = sensor.pose().inverse();
    let rotation_inv = sensor_pose_inv.rotation();

    (0..sensor.beams())
        .map(|beam| {
            let direction = sensor.ray(beam);
            match cast_single_beam(grid, position, direction, sensor.max_range()) {
                RaycastOutcome::Hit(hit) => Some(RayHit {
                    point: sensor_pose_inv.transform_point(&hit.point.into()),
                    normal: rotation_inv * hit.normal,
                }),
                RaycastOutcome::NoHit | RaycastOutcome::Timeout => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use common::robot::Pose2;

    fn grid_with_wall() -> TsdGrid<8> {
        let mut grid: TsdGrid<8> = TsdGrid::new(0.1, 3, 3);
        let mut sensor = SensorPolar2D::new(32, std::f32::consts::TAU / 32.0, 0.0, Some(2.0));
        sensor.set_pose(Pose2::new(0.4, 0.4, 0.0));
        for beam in 0..32 {
            sensor.set_beam(beam, 0.3, true);
        }
        grid.push(&sensor);
        grid
    }

    #[test]
    fn cast_polar_reports_a_hit_near_the_integrated_wall() {
        let grid = grid_with_wall();
        let mut sensor = SensorPolar2D::new(32, std::f32::consts::TAU / 32.0, 0.0, Some(2.0));
        sensor.set_pose(Pose2::new(0.4, 0.4, 0.0));

        let hits = cast_polar(&grid, &sensor);
        assert_eq!(hits.len(), 32);
        assert!(hits.iter().any(|h| h.is_some()));
    }

    #[test]
    fn clip_to_grid_rejects_ray_that_never_enters_bbox() {
        let grid: TsdGrid<8> = TsdGrid::new(0.1, 3, 3);
        let result = clip_to_grid(Vector2::new(-10.0, -10.0), Vector2::new(0.0, -1.0), &grid, None);
        assert!(result.is_none());
    }
}
