use std::sync::{Arc, RwLock};

use common::robot::Pose2;
use nalgebra::Point2;
use serde::Deserialize;
use slam::SensorPolar2D;

use crate::scene::ray::{Intersect, Ray, Scene};

/// Tunable parameters for the synthetic scanner and the scripted motion the
/// simulator drives its pose along, since there is no `Command` input here.
#[derive(Clone, Copy, Deserialize)]
pub struct SimParameters {
    pub update_period: f32,
    pub scanner_range: f32,
    pub beams: usize,
    pub angular_res: f32,
    pub path_radius: f32,
    pub path_angular_speed: f32,
}

impl Default for SimParameters {
    fn default() -> Self {
        Self {
            update_period: 0.2,
            scanner_range: 8.0,
            beams: 360,
            angular_res: std::f32::consts::TAU / 360.0,
            path_radius: 2.0,
            path_angular_speed: 0.3,
        }
    }
}

/// Drives a scripted circular path through `scene` and casts a full polar
/// sweep at every tick, emitting `(SensorPolar2D, Pose2)` pairs.
pub struct Simulator {
    scene: Arc<RwLock<Scene>>,
    parameters: SimParameters,
    time: f32,
    time_since_scan: f32,
    pose: Pose2,
}

impl Simulator {
    pub fn new(scene: Arc<RwLock<Scene>>, parameters: SimParameters) -> Self {
        Self {
            scene,
            parameters,
            time: 0.0,
            time_since_scan: 0.0,
            pose: Pose2::identity(),
        }
    }

    pub fn parameters_mut(&mut self) -> &mut SimParameters {
        &mut self.parameters
    }

    pub fn pose(&self) -> Pose2 {
        self.pose
    }

    fn pose_at(&self, time: f32) -> Pose2 {
        let theta = self.parameters.path_angular_speed * time;
        Pose2::new(
            self.parameters.path_radius * theta.cos(),
            self.parameters.path_radius * theta.sin(),
            theta + std::f32::consts::FRAC_PI_2,
        )
    }

    /// Advances the scripted path and, once `update_period` has elapsed,
    /// casts a fresh scan and returns the new `(sensor, pose)` pair.
    pub fn tick(&mut self, dt: f32) -> Option<(SensorPolar2D, Pose2)> {
        self.time += dt;
        self.time_since_scan += dt;
        self.pose = self.pose_at(self.time);

        if self.time_since_scan < self.parameters.update_period {
            return None;
        }
        self.time_since_scan = 0.0;

        let mut sensor = SensorPolar2D::new(self.parameters.beams, self.parameters.angular_res, 0.0, Some(self.parameters.scanner_range));
        sensor.set_pose(self.pose);

        let scene = self.scene.read().expect("scene lock poisoned");
        for beam in 0..sensor.beams() {
            let direction = sensor.ray(beam);
            let ray = Ray::from_origin_direction(Point2::from(sensor.position()), direction);
            if let Some(u) = scene.intersect(&ray) {
                if u <= self.parameters.scanner_range {
                    sensor.set_beam(beam, u, true);
                    continue;
                }
            }
            sensor.set_beam(beam, self.parameters.scanner_range, false);
        }

        Some((sensor, self.pose))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn empty_scene() -> Arc<RwLock<Scene>> {
        Arc::new(RwLock::new(Scene::new()))
    }

    #[test]
    fn tick_withholds_scan_until_update_period_elapses() {
        let mut sim = Simulator::new(empty_scene(), SimParameters { update_period: 1.0, ..Default::default() });

        assert!(sim.tick(0.3).is_none());
        assert!(sim.tick(0.3).is_none());
        assert!(sim.tick(0.5).is_some());
    }

    #[test]
    fn pose_advances_along_the_circular_path_every_tick() {
        let mut sim = Simulator::new(empty_scene(), SimParameters { update_period: 1.0, path_radius: 2.0, path_angular_speed: 1.0, ..Default::default() });

        assert_eq!(sim.pose(), Pose2::identity());
        sim.tick(0.1);
        let moved = sim.pose();
        assert!(moved.position().norm() > 0.0);
        assert!((moved.position().norm() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn scan_hits_a_surrounding_wall() {
        let mut scene = Scene::new();
        scene.add_rect(Point2::new(-5.0, -5.0), nalgebra::Vector2::new(10.0, 10.0));

        let mut sim = Simulator::new(Arc::new(RwLock::new(scene)), SimParameters { update_period: 0.0, beams: 8, ..Default::default() });

        let (sensor, _) = sim.tick(0.01).expect("scan should fire immediately");
        assert!((0..sensor.beams()).any(|beam| sensor.point(beam).is_some()));
    }
}
