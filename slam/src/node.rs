//! `TsdGridSlamNode`: wires the TSD grid, raycaster and ICP matcher into a
//! `common::node::Node`, generalizing the teacher's
//! `grid::node::GridMapSlamNode` update loop.

use std::sync::Arc;

use common::node::Node;
use common::robot::Pose2;
use common::world::WorldObj;
use nalgebra::Matrix2xX;
use pubsub::{Publisher, Subscription};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{TsdGridSlamParameters, PARTITION_SIZE};
use crate::matching::{IcpMatcher, KdTreeAssign, RansacMatcher, RansacOutcome, RigidEstimator};
use crate::raycast::cast_polar;
use crate::scan::Scan;
use crate::sensor::SensorPolar2D;
use crate::tsd::TsdGrid;

pub struct GridImageMessage {
    pub width: usize,
    pub height: usize,
    pub rgb: Vec<u8>,
}

pub struct TsdGridSlamNode {
    sub_scan: Subscription<(SensorPolar2D, Pose2)>,
    pub_pose: Publisher<Pose2>,
    pub_grid_image: Publisher<GridImageMessage>,

    grid: TsdGrid<PARTITION_SIZE>,
    matcher: IcpMatcher<KdTreeAssign, Box<dyn RigidEstimator>>,
    ransac: Option<RansacMatcher>,
    ransac_rng: StdRng,

    estimated_pose: Pose2,
    last_integrated_pose: Pose2,
    has_integrated: bool,
    push_displacement_threshold: f32,
    image_size: usize,

    /// The previous update's raw scan and the pose it was taken at, kept
    /// around so `self.ransac` has something to pre-align the next scan
    /// against before handing a guess to the ICP matcher.
    last_scan: Option<Scan>,
    last_scan_pose: Pose2,
}

impl TsdGridSlamNode {
    pub fn new(
        sub_scan: Subscription<(SensorPolar2D, Pose2)>,
        pub_pose: Publisher<Pose2>,
        pub_grid_image: Publisher<GridImageMessage>,
        params: TsdGridSlamParameters,
    ) -> Self {
        let mut grid = TsdGrid::new(params.cell_size, params.layout_partition, params.layout_grid);
        if let Some(max_truncation) = params.max_truncation {
            grid.set_max_truncation(max_truncation);
        }

        Self {
            sub_scan,
            pub_pose,
            pub_grid_image,
            grid,
            matcher: params.icp.build(),
            ransac: params.ransac.map(|p| RansacMatcher { params: p }),
            ransac_rng: StdRng::from_entropy(),
            estimated_pose: Pose2::identity(),
            last_integrated_pose: Pose2::identity(),
            has_integrated: false,
            push_displacement_threshold: params.push_displacement_threshold,
            image_size: params.image_size,
            last_scan: None,
            last_scan_pose: Pose2::identity(),
        }
    }

    pub fn estimated_pose(&self) -> Pose2 {
        self.estimated_pose
    }

    /// Raycasts the grid from `self.estimated_pose` using `sensor`'s beam
    /// geometry to build a world-frame ICP model (points + normals).
    fn build_model(&self, sensor: &SensorPolar2D) -> (Matrix2xX<f32>, Matrix2xX<f32>) {
        let mut model_sensor = sensor.clone();
        model_sensor.set_pose(self.estimated_pose);
        let hits = cast_polar(&self.grid, &model_sensor);

        let rotation = self.estimated_pose.rotation();
        let mut points = Vec::new();
        let mut normals = Vec::new();
        for hit in hits.into_iter().flatten() {
            let world_point = self.estimated_pose.transform_point(&hit.point.into());
            points.push(world_point.coords);
            normals.push(rotation * hit.normal);
        }

        (Matrix2xX::from_columns(&points), Matrix2xX::from_columns(&normals))
    }

    /// Coarse scan-to-scan pre-alignment (spec.md §4.6's "RANSAC provides
    /// an optional coarse pre-alignment"): matches `scan` against the
    /// previous update's scan and, on acceptance, corrects `guess_pose`
    /// with the recovered relative transform before ICP ever runs. Falls
    /// back to `guess_pose` unchanged when RANSAC is disabled, there's no
    /// previous scan yet, or the trial loop never accepts a match.
    fn ransac_pre_align(&mut self, scan: &Scan, guess_pose: Pose2) -> Pose2 {
        let (Some(ransac), Some(last_scan)) = (&self.ransac, &self.last_scan) else {
            return guess_pose;
        };

        let (delta, outcome) = ransac.match_scans(last_scan, scan, &mut self.ransac_rng);
        match outcome {
            RansacOutcome::Accepted { trials_used } => {
                tracing::debug!(trials_used, "ransac pre-alignment accepted");
                self.last_scan_pose.compose(&delta)
            }
            RansacOutcome::NoAcceptance { trials_without_acceptance } => {
                tracing::debug!(trials_without_acceptance, "ransac pre-alignment found no match, using guess pose");
                guess_pose
            }
            RansacOutcome::TooFewValidPoints => guess_pose,
        }
    }

    fn integrate(&mut self, sensor: &SensorPolar2D, pose: Pose2) {
        let displacement = (pose.position() - self.last_integrated_pose.position()).norm();
        if self.has_integrated && displacement < self.push_displacement_threshold {
            return;
        }

        let mut moved = sensor.clone();
        moved.set_pose(pose);
        self.grid.push(&moved);
        self.last_integrated_pose = pose;
        self.has_integrated = true;

        let rgb = self.grid.grid_to_color_image(self.image_size, self.image_size);
        self.pub_grid_image.publish(Arc::new(GridImageMessage {
            width: self.image_size,
            height: self.image_size,
            rgb,
        }));
    }
}

impl Node for TsdGridSlamNode {
    #[tracing::instrument(skip_all)]
    fn update(&mut self) {
        let Some(msg) = self.sub_scan.try_recv() else {
            return;
        };
        let (sensor, guess_pose) = (&msg.0, msg.1);

        let scan = Scan::from_sensor(sensor);
        let guess_pose = self.ransac_pre_align(&scan, guess_pose);

        let (model, normals) = self.build_model(sensor);
        if model.ncols() < 3 {
            tracing::debug!("grid has no raycastable content yet, integrating at guess pose");
            self.estimated_pose = guess_pose;
            self.pub_pose.publish(Arc::new(self.estimated_pose));
            self.integrate(sensor, guess_pose);
            self.last_scan_pose = self.estimated_pose;
            self.last_scan = Some(scan);
            return;
        }

        let model_valid: Vec<usize> = (0..model.ncols()).collect();
        let result = self.matcher.run(&model, Some(&normals), &scan.points, &model_valid, guess_pose);

        self.estimated_pose = result.pose;
        self.pub_pose.publish(Arc::new(self.estimated_pose));
        self.integrate(sensor, self.estimated_pose);
        self.last_scan_pose = self.estimated_pose;
        self.last_scan = Some(scan);
    }

    fn draw(&mut self, ui: &egui::Ui, _world: &mut WorldObj<'_>) {
        egui::Window::new("TSD Grid SLAM").show(ui.ctx(), |ui| {
            ui.label(format!(
                "pose: ({:.2}, {:.2}, {:.2})",
                self.estimated_pose.x, self.estimated_pose.y, self.estimated_pose.theta
            ));
            ui.label(format!("has_integrated: {}", self.has_integrated));
        });
    }
}
