//! The TSD grid itself: owns the `M x M` partition matrix and the
//! frustum-culling tree over it. Grounded on `original_source`'s
//! `TsdGrid::init`/`push`/`pushTree`/`pushRecursion`/`propagateBorders`/
//! `interpolateBilinear`/`interpolateNormal`/`coord2Cell`/`grid2ColorImage`.

use nalgebra::{Matrix2xX, Vector2};
use rayon::prelude::*;
use std::collections::HashSet;

use crate::sensor::SensorPolar2D;
use crate::tsd::cell::{InterpolationStatus, TsdPartition};
use crate::tsd::tree::{PartitionIndex, PartitionTree};

pub struct CellRef {
    pub partition: PartitionIndex,
    pub x: usize,
    pub y: usize,
    pub center: Vector2<f32>,
}

pub struct TsdGrid<const P: usize> {
    partitions: Vec<TsdPartition<P>>,
    tree: Option<PartitionTree>,

    partitions_in_x: usize,
    partitions_in_y: usize,

    cell_size: f32,
    max_truncation: f32,
    layout_partition: u32,
    layout_grid: u32,

    grid_cells_per_side: usize,
}

impl<const P: usize> TsdGrid<P> {
    /// Mirrors `TsdGrid::init`. `layout_partition` must satisfy `2^layout_partition == P`;
    /// if `P` does not fit evenly inside `2^layout_grid`, this falls back to a single
    /// partition spanning the whole grid (`layout_partition == layout_grid`) rather than
    /// the original's silent early return — see `DESIGN.md`.
    pub fn new(cell_size: f32, layout_partition: u32, layout_grid: u32) -> Self {
        assert!(
            layout_partition <= 15 && layout_grid <= 15,
            "partition/grid layout must be in [0,15], got ({layout_partition}, {layout_grid})"
        );
        assert_eq!(
            1usize << layout_partition,
            P,
            "layout_partition (2^{layout_partition}) must match the partition's const generic size {P}"
        );

        let mut grid_cells_per_side = 1usize << layout_grid;
        let mut layout_partition = layout_partition;
        let mut layout_grid = layout_grid;

        if P > grid_cells_per_side {
            tracing::warn!(
                partition_size = P,
                grid_cells_per_side,
                "partition larger than grid; falling back to a single partition"
            );
            grid_cells_per_side = P;
            layout_partition = layout_grid;
            layout_grid = layout_partition;
        }

        let partitions_per_side = grid_cells_per_side / P;

        let mut partitions = Vec::with_capacity(partitions_per_side * partitions_per_side);
        for row in 0..partitions_per_side {
            for col in 0..partitions_per_side {
                let origin = Vector2::new(col as f32 * P as f32 * cell_size, row as f32 * P as f32 * cell_size);
                partitions.push(TsdPartition::new(origin, cell_size));
            }
        }

        let tree = if partitions_per_side > 1 {
            let mut leaves = vec![Vec::with_capacity(partitions_per_side); partitions_per_side];
            for row in 0..partitions_per_side {
                for col in 0..partitions_per_side {
                    let partition = &partitions[row * partitions_per_side + col];
                    leaves[row].push((partition.centroid, partition.circumradius, partition.corners));
                }
            }
            Some(PartitionTree::build(&leaves))
        } else {
            None
        };

        Self {
            partitions,
            tree,
            partitions_in_x: partitions_per_side,
            partitions_in_y: partitions_per_side,
            cell_size,
            max_truncation: 2.0 * cell_size,
            layout_partition,
            layout_grid,
            grid_cells_per_side,
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn max_truncation(&self) -> f32 {
        self.max_truncation
    }

    pub fn layout_partition(&self) -> u32 {
        self.layout_partition
    }

    pub fn layout_grid(&self) -> u32 {
        self.layout_grid
    }

    pub fn grid_extent(&self) -> f32 {
        self.grid_cells_per_side as f32 * self.cell_size
    }

    /// Mirrors `TsdGrid::setMaxTruncation`: clamps to `>= 2*cell_size`, warning if clamped.
    pub fn set_max_truncation(&mut self, val: f32) {
        let min_allowed = 2.0 * self.cell_size;
        if val < min_allowed {
            tracing::warn!(
                requested = val,
                minimum = min_allowed,
                "truncation radius must be at least 2x cell size, clamping"
            );
            self.max_truncation = min_allowed;
        } else {
            self.max_truncation = val;
        }
    }

    fn linear(&self, idx: PartitionIndex) -> usize {
        idx.row * self.partitions_in_x + idx.col
    }

    pub fn partition(&self, idx: PartitionIndex) -> &TsdPartition<P> {
        &self.partitions[self.linear(idx)]
    }

    /// Integrates one scan. Tree-filtered for `M > 1`, flat-scanned otherwise,
    /// matching `TsdGrid::pushTree`/`push` respectively. Parallelized with `rayon`
    /// over the candidate set; each task exclusively owns one partition.
    #[tracing::instrument(skip_all)]
    pub fn push(&mut self, sensor: &SensorPolar2D) {
        let sensor_pos = sensor.position();
        let max_truncation = self.max_truncation;
        let min_range = 0.0;
        let max_range = sensor.max_range().unwrap_or(f32::INFINITY);

        let (candidates, empties): (HashSet<PartitionIndex>, Vec<PartitionIndex>) = match &self.tree {
            Some(tree) => {
                let mut accept = HashSet::new();
                let mut empty = Vec::new();
                for (idx, is_empty) in tree.candidates(sensor_pos, sensor, max_truncation, min_range, max_range) {
                    if is_empty {
                        empty.push(idx);
                    } else {
                        accept.insert(idx);
                    }
                }
                (accept, empty)
            }
            None => {
                let mut set = HashSet::new();
                let mut empty = Vec::new();
                for row in 0..self.partitions_in_y {
                    for col in 0..self.partitions_in_x {
                        let idx = PartitionIndex { row, col };
                        let visibility =
                            self.partition(idx)
                                .is_in_range(sensor_pos, sensor, max_truncation, min_range, max_range);
                        if visibility.reject {
                            if visibility.empty {
                                empty.push(idx);
                            }
                            continue;
                        }
                        set.insert(idx);
                    }
                }
                (set, empty)
            }
        };

        tracing::debug!(candidates = candidates.len(), empties = empties.len(), "partitions selected for update");

        for idx in empties {
            self.partition_mut(idx).mark_empty(0.0);
        }

        let partitions_in_x = self.partitions_in_x;
        self.partitions
            .par_iter_mut()
            .enumerate()
            .filter(|(linear, _)| {
                let idx = PartitionIndex {
                    row: linear / partitions_in_x,
                    col: linear % partitions_in_x,
                };
                candidates.contains(&idx)
            })
            .for_each(|(_, partition)| {
                let cell_centers_xy: Matrix2xX<f32> = partition.cell_centers.fixed_rows::<2>(0).into_owned();
                let beams = sensor.back_project(&cell_centers_xy);

                for (c, &beam_idx) in beams.iter().enumerate() {
                    if beam_idx < 0 {
                        continue;
                    }
                    let beam_idx = beam_idx as usize;
                    if !sensor.mask[beam_idx] {
                        continue;
                    }

                    let world = cell_centers_xy.column(c).into_owned();
                    let distance = (world - sensor_pos).norm();
                    let signed_distance = sensor.ranges[beam_idx] - distance;

                    let local = partition.local_coords.column(c).into_owned();
                    partition.add_tsd(local.x, local.y, signed_distance, max_truncation);
                }
            });

        self.propagate_borders();
    }

    /// Copies valid tsd/weight values of neighbors into the border row/column
    /// of each initialized partition so bilinear interpolation at partition
    /// boundaries needs no cross-partition lookup.
    fn propagate_borders(&mut self) {
        let width = P;
        let height = P;

        for row in 0..self.partitions_in_y {
            for col in 0..self.partitions_in_x {
                let cur_idx = PartitionIndex { row, col };
                if !self.partition(cur_idx).is_initialized() {
                    continue;
                }

                if col < self.partitions_in_x - 1 {
                    let right_idx = PartitionIndex { row, col: col + 1 };
                    if self.partition(right_idx).is_initialized() {
                        for i in 0..height {
                            let cell = self.partition(right_idx).cell(i, 0);
                            self.partition_mut(cur_idx).set_cell(i, width, cell);
                        }
                    }
                }

                if row < self.partitions_in_y - 1 {
                    let up_idx = PartitionIndex { row: row + 1, col };
                    if self.partition(up_idx).is_initialized() {
                        for i in 0..width {
                            let cell = self.partition(up_idx).cell(0, i);
                            self.partition_mut(cur_idx).set_cell(height, i, cell);
                        }
                    }
                }

                if col < self.partitions_in_x - 1 && row < self.partitions_in_y - 1 {
                    let up_right_idx = PartitionIndex { row: row + 1, col: col + 1 };
                    if self.partition(up_right_idx).is_initialized() {
                        let cell = self.partition(up_right_idx).cell(0, 0);
                        self.partition_mut(cur_idx).set_cell(height, width, cell);
                    }
                }
            }
        }
    }

    fn partition_mut(&mut self, idx: PartitionIndex) -> &mut TsdPartition<P> {
        let linear = self.linear(idx);
        &mut self.partitions[linear]
    }

    /// The "center of cell" rule with a half-cell shift so the query point
    /// always has four bilinear neighbors. Mirrors `TsdGrid::coord2Cell`.
    pub fn coord_to_cell(&self, world: Vector2<f32>) -> Option<CellRef> {
        let inv_cell_size = 1.0 / self.cell_size;

        let mut x_idx = (world.x * inv_cell_size).floor() as isize;
        let mut y_idx = (world.y * inv_cell_size).floor() as isize;

        let mut dx = (x_idx as f32 + 0.5) * self.cell_size;
        let mut dy = (y_idx as f32 + 0.5) * self.cell_size;

        if world.x < dx {
            x_idx -= 1;
            dx -= self.cell_size;
        }
        if world.y < dy {
            y_idx -= 1;
            dy -= self.cell_size;
        }

        let cells_per_side = self.grid_cells_per_side as isize;
        if x_idx < 0 || x_idx >= cells_per_side || y_idx < 0 || y_idx >= cells_per_side {
            return None;
        }

        let partition = PartitionIndex {
            row: y_idx as usize / P,
            col: x_idx as usize / P,
        };

        Some(CellRef {
            partition,
            x: x_idx as usize % P,
            y: y_idx as usize % P,
            center: Vector2::new(dx, dy),
        })
    }

    pub fn interpolate_bilinear(&self, world: Vector2<f32>) -> (InterpolationStatus, f32) {
        let Some(cell_ref) = self.coord_to_cell(world) else {
            return (InterpolationStatus::InvalidIndex, f32::NAN);
        };

        let partition = self.partition(cell_ref.partition);
        if !partition.is_initialized() {
            return (InterpolationStatus::EmptyPartition, f32::NAN);
        }

        let wx = ((world.x - cell_ref.center.x) / self.cell_size).abs();
        let wy = ((world.y - cell_ref.center.y) / self.cell_size).abs();
        let tsd = partition.interpolate_bilinear(cell_ref.x, cell_ref.y, wx, wy);

        if tsd.is_nan() {
            (InterpolationStatus::IsNan, tsd)
        } else {
            (InterpolationStatus::Success, tsd)
        }
    }

    /// Central differences of bilinear lookups +/- `cell_size`, L2-normalized.
    pub fn interpolate_normal(&self, world: Vector2<f32>) -> Option<Vector2<f32>> {
        let cs = self.cell_size;

        let (status, inc_x) = self.interpolate_bilinear(world + Vector2::new(cs, 0.0));
        if status != InterpolationStatus::Success {
            return None;
        }
        let (status, dec_x) = self.interpolate_bilinear(world - Vector2::new(cs, 0.0));
        if status != InterpolationStatus::Success {
            return None;
        }

        let (status, inc_y) = self.interpolate_bilinear(world + Vector2::new(0.0, cs));
        if status != InterpolationStatus::Success {
            return None;
        }
        let (status, dec_y) = self.interpolate_bilinear(world - Vector2::new(0.0, cs));
        if status != InterpolationStatus::Success {
            return None;
        }

        let normal = Vector2::new(inc_x - dec_x, inc_y - dec_y);
        if normal.norm() < 1e-9 {
            None
        } else {
            Some(normal.normalize())
        }
    }

    /// RGB raster matching `TsdGrid::grid2ColorImage`'s color rule (the
    /// negative-tsd red channel is clamped instead of cast from a negative
    /// double, which was undefined behavior in the C++ original).
    pub fn grid_to_color_image(&self, width: usize, height: usize) -> Vec<u8> {
        let mut image = vec![0u8; width * height * 3];
        let step_w = self.grid_extent() / width as f32;
        let step_h = self.grid_extent() / height as f32;

        for h in 0..height {
            for w in 0..width {
                let world = Vector2::new(w as f32 * step_w, h as f32 * step_h);
                let i = (h * width + w) * 3;

                let (tsd, is_empty) = match self.coord_to_cell(world) {
                    Some(cell_ref) => {
                        let partition = self.partition(cell_ref.partition);
                        let tsd = if partition.is_initialized() {
                            partition.cell(cell_ref.y, cell_ref.x).tsd
                        } else {
                            f32::NAN
                        };
                        (tsd, partition.is_empty())
                    }
                    None => (f32::NAN, false),
                };

                let rgb = if tsd > 0.0 && tsd < 0.999_999 {
                    [(tsd * 150.0) as u8, 255, (tsd * 150.0) as u8]
                } else if tsd >= 0.999_999 {
                    [255, 255, 255]
                } else if tsd < 0.0 {
                    [(-tsd * 255.0).min(255.0) as u8, 0, 0]
                } else if is_empty {
                    [255, 255, 255]
                } else {
                    [0, 0, 0]
                };

                image[i..i + 3].copy_from_slice(&rgb);
            }
        }

        image
    }

    pub fn partitions_per_side(&self) -> usize {
        self.partitions_in_x
    }

    pub fn partitions(&self) -> &[TsdPartition<P>] {
        &self.partitions
    }

    pub fn partitions_mut(&mut self) -> &mut [TsdPartition<P>] {
        &mut self.partitions
    }

    pub fn store<W: std::io::Write>(&self, writer: W) -> Result<(), crate::tsd::io::GridIoError> {
        crate::tsd::io::store(self, writer)
    }

    pub fn load<R: std::io::Read>(reader: R) -> Result<Self, crate::tsd::io::GridIoError> {
        crate::tsd::io::load(reader)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::robot::Pose2;

    fn sensor_facing_east(range: f32) -> SensorPolar2D {
        let mut sensor = SensorPolar2D::new(4, std::f32::consts::FRAC_PI_2, 0.0, Some(range + 1.0));
        sensor.set_pose(Pose2::new(0.5, 0.5, 0.0));
        sensor.set_beam(0, range, true);
        sensor
    }

    #[test]
    fn push_leaves_cells_in_valid_range() {
        let mut grid: TsdGrid<4> = TsdGrid::new(0.1, 2, 2);
        let sensor = sensor_facing_east(0.3);
        grid.push(&sensor);

        for partition in grid.partitions() {
            if !partition.is_initialized() {
                continue;
            }
            for row in 0..4 {
                for col in 0..4 {
                    let cell = partition.cell(row, col);
                    assert!(cell.tsd >= -1.0 && cell.tsd <= 1.0);
                    assert!(cell.weight <= super::super::cell::MAXWEIGHT);
                }
            }
        }
    }

    #[test]
    fn push_marks_a_partition_the_beam_passes_clean_through_as_empty() {
        let mut grid: TsdGrid<4> = TsdGrid::new(0.1, 2, 3);
        let mut sensor = SensorPolar2D::new(4, std::f32::consts::FRAC_PI_2, 0.0, Some(10.0));
        sensor.set_pose(Pose2::new(0.05, 0.05, 0.0));
        sensor.set_beam(0, 5.0, true);

        grid.push(&sensor);

        assert!(grid.partitions().iter().any(|p| p.is_empty()));
        assert!(!grid.partitions().iter().any(|p| p.is_initialized() && p.is_empty()));
    }

    #[test]
    fn coord_to_cell_outermost_ring_is_invalid() {
        let grid: TsdGrid<4> = TsdGrid::new(0.1, 2, 2);
        let far_outside = Vector2::new(1000.0, 1000.0);
        assert!(grid.coord_to_cell(far_outside).is_none());
    }

    #[test]
    fn set_max_truncation_clamps_below_minimum() {
        let mut grid: TsdGrid<4> = TsdGrid::new(0.1, 2, 2);
        grid.set_max_truncation(0.05);
        assert_eq!(grid.max_truncation(), 0.2);
    }
}
