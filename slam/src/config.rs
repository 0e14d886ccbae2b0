//! Deserializable configuration for `TsdGridSlamNode`, grounded on the
//! teacher's `grid::node::GridMapSlamNodeConfig` (`topic_*` string fields
//! plus a nested algorithm config) and `baseui::config::NodeConfig`'s
//! enum-of-variants pattern.

use common::node::{Node, NodeConfig};
use nalgebra::Vector2;
use serde::Deserialize;

use crate::matching::{
    ClosedForm2D, DistanceFilter, IcpMatcher, KdTreeAssign, OutOfBoundsFilter2D, PairFilter, PointToLine2D,
    RansacParameters, RigidEstimator,
};
use crate::node::TsdGridSlamNode;

/// Partition size shared by every `TsdGridSlamNode` instance. Const generics
/// can't be chosen at runtime from a deserialized value, so the node is
/// fixed to a single partition size here rather than threading a type
/// parameter through the config layer — see `DESIGN.md`.
pub const PARTITION_SIZE: usize = 16;

#[derive(Deserialize, Clone, Copy, Debug)]
pub enum EstimatorKind {
    ClosedForm,
    PointToLine,
}

#[derive(Deserialize, Clone, Copy, Debug)]
pub struct DistanceFilterConfig {
    pub threshold: f32,
    pub decay: f32,
    pub ramp_iterations: usize,
}

#[derive(Deserialize, Clone, Copy, Debug)]
pub struct BoundsFilterConfig {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

#[derive(Deserialize, Clone, Debug)]
pub struct IcpConfig {
    pub max_iterations: usize,
    pub max_rms: f32,
    pub convergence_counter: usize,
    pub estimator: EstimatorKind,
    pub distance_filter: Option<DistanceFilterConfig>,
    pub bounds_filter: Option<BoundsFilterConfig>,
}

impl IcpConfig {
    pub fn build(&self) -> IcpMatcher<KdTreeAssign, Box<dyn RigidEstimator>> {
        let estimator: Box<dyn RigidEstimator> = match self.estimator {
            EstimatorKind::ClosedForm => Box::new(ClosedForm2D),
            EstimatorKind::PointToLine => Box::new(PointToLine2D),
        };

        let mut pre_filters: Vec<Box<dyn PairFilter>> = Vec::new();
        if let Some(bounds) = &self.bounds_filter {
            pre_filters.push(Box::new(OutOfBoundsFilter2D {
                min: Vector2::new(bounds.min[0], bounds.min[1]),
                max: Vector2::new(bounds.max[0], bounds.max[1]),
            }));
        }

        let mut post_filters: Vec<Box<dyn PairFilter>> = Vec::new();
        if let Some(distance) = &self.distance_filter {
            post_filters.push(Box::new(DistanceFilter {
                threshold: distance.threshold,
                decay: distance.decay,
                ramp_iterations: distance.ramp_iterations,
            }));
        }

        IcpMatcher {
            assigner: KdTreeAssign,
            estimator,
            pre_filters,
            post_filters,
            max_iterations: self.max_iterations,
            max_rms: self.max_rms,
            convergence_counter: self.convergence_counter,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct TsdGridSlamParameters {
    pub cell_size: f32,
    pub layout_partition: u32,
    pub layout_grid: u32,
    pub max_truncation: Option<f32>,
    pub push_displacement_threshold: f32,
    pub icp: IcpConfig,
    pub ransac: Option<RansacParameters>,
    pub image_size: usize,
}

#[derive(Clone, Deserialize)]
pub struct TsdGridSlamNodeConfig {
    pub topic_scan: String,
    pub topic_pose: String,
    pub topic_grid_image: String,
    pub config: TsdGridSlamParameters,
}

impl NodeConfig for TsdGridSlamNodeConfig {
    fn instantiate(&self, pubsub: &mut pubsub::PubSub) -> Box<dyn Node> {
        Box::new(TsdGridSlamNode::new(
            pubsub.subscribe(&self.topic_scan),
            pubsub.publish(&self.topic_pose),
            pubsub.publish(&self.topic_grid_image),
            self.config.clone(),
        ))
    }
}
