//! Pre/post pair filters (spec.md §4.5 steps 1 and 2), grounded on
//! `PairFilter` from the Design Notes' capability-set redesign.

use nalgebra::{Matrix2xX, Vector2};

use crate::matching::Pair;

pub struct FilterContext<'a> {
    pub scene: &'a Matrix2xX<f32>,
    pub model: &'a Matrix2xX<f32>,
    pub iteration: usize,
}

pub trait PairFilter {
    fn filter(&self, pairs: Vec<Pair>, ctx: &FilterContext) -> Vec<Pair>;
}

/// Pre-filter rejecting scene points outside a world-frame axis-aligned
/// rectangle. Run before assignment, on identity pairs
/// (`scene_idx == model_idx`, see `IcpMatcher::run`).
pub struct OutOfBoundsFilter2D {
    pub min: Vector2<f32>,
    pub max: Vector2<f32>,
}

impl PairFilter for OutOfBoundsFilter2D {
    fn filter(&self, pairs: Vec<Pair>, ctx: &FilterContext) -> Vec<Pair> {
        pairs
            .into_iter()
            .filter(|pair| {
                let p = ctx.scene.column(pair.scene_idx);
                p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
            })
            .collect()
    }
}

/// Post-filter rejecting pairs whose distance exceeds a threshold that
/// decays geometrically per iteration, `threshold * decay.powi(iteration)`,
/// floored at `threshold * decay.powi(ramp_iterations)` once `iteration`
/// reaches `ramp_iterations` (spec.md scenario 1:
/// `DistanceFilter(1.5, 0.01, 30)`).
pub struct DistanceFilter {
    pub threshold: f32,
    pub decay: f32,
    pub ramp_iterations: usize,
}

impl DistanceFilter {
    fn effective_threshold(&self, iteration: usize) -> f32 {
        let exponent = iteration.min(self.ramp_iterations) as i32;
        self.threshold * self.decay.powi(exponent)
    }
}

impl PairFilter for DistanceFilter {
    fn filter(&self, pairs: Vec<Pair>, ctx: &FilterContext) -> Vec<Pair> {
        let threshold = self.effective_threshold(ctx.iteration);
        pairs.into_iter().filter(|pair| pair.distance <= threshold).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn out_of_bounds_filter_rejects_points_outside_rectangle() {
        let scene = Matrix2xX::from_columns(&[Vector2::new(0.0, 0.0), Vector2::new(100.0, 100.0)]);
        let model = Matrix2xX::from_columns(&[Vector2::new(0.0, 0.0)]);
        let ctx = FilterContext { scene: &scene, model: &model, iteration: 0 };

        let pairs = vec![
            Pair { scene_idx: 0, model_idx: 0, distance: 0.0 },
            Pair { scene_idx: 1, model_idx: 0, distance: 0.0 },
        ];

        let filter = OutOfBoundsFilter2D { min: Vector2::new(-1.0, -1.0), max: Vector2::new(1.0, 1.0) };
        let survivors = filter.filter(pairs, &ctx);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].scene_idx, 0);
    }

    #[test]
    fn distance_filter_threshold_decays_geometrically_then_floors() {
        let filter = DistanceFilter { threshold: 1.5, decay: 0.5, ramp_iterations: 4 };
        assert!((filter.effective_threshold(0) - 1.5).abs() < 1e-6);
        assert!((filter.effective_threshold(2) - 1.5 * 0.25).abs() < 1e-6);
        let floor = filter.effective_threshold(4);
        assert!((floor - 1.5 * 0.0625).abs() < 1e-6);
        assert!((filter.effective_threshold(100) - floor).abs() < 1e-6);
    }
}
