//! Axis-aligned zero-crossing enumeration, used for visualization and model
//! extraction. Grounded on spec.md §4.4's "axis-aligned variant" /
//! `original_source`'s `calcCoordsAligned`.

use nalgebra::Vector2;

use crate::tsd::{PartitionState, TsdGrid};

/// Cells this close to full saturation are excluded from crossing
/// detection, ported from `original_source`'s `calcCoordsAligned`
/// (`fabs(tsdf) < 0.9999`). Near-truncated cells sit on a flat plateau of
/// the TSDF and can produce spurious crossings unrelated to the true
/// surface.
const SATURATION_GUARD: f32 = 0.9999;

/// Scans every initialized partition's cell grid row-then-column, emitting
/// the interpolated zero-crossing point between each adjacent cell pair
/// whose signs differ.
pub fn cast_axis_aligned<const P: usize>(grid: &TsdGrid<P>) -> Vec<Vector2<f32>> {
    let mut points = Vec::new();
    let cell_size = grid.cell_size();

    for (partition_idx, partition) in grid.partitions().iter().enumerate() {
        if partition.state() != PartitionState::Content {
            continue;
        }
        let partitions_per_side = grid.partitions_per_side();
        let row = partition_idx / partitions_per_side;
        let col = partition_idx % partitions_per_side;
        let origin = Vector2::new(col as f32 * P as f32 * cell_size, row as f32 * P as f32 * cell_size);

        // rows: walk along x for each y
        for y in 0..P {
            for x in 0..(P - 1) {
                let a = partition.cell(y, x);
                let b = partition.cell(y, x + 1);
                if a.is_unused() || b.is_unused() || a.tsd.abs() >= SATURATION_GUARD || b.tsd.abs() >= SATURATION_GUARD {
                    continue;
                }
                if (a.tsd > 0.0) != (b.tsd > 0.0) {
                    let alpha = a.tsd / (a.tsd - b.tsd);
                    let local_x = (x as f32 + 0.5 + alpha) * cell_size;
                    let local_y = (y as f32 + 0.5) * cell_size;
                    points.push(origin + Vector2::new(local_x, local_y));
                }
            }
        }

        // columns: walk along y for each x
        for x in 0..P {
            for y in 0..(P - 1) {
                let a = partition.cell(y, x);
                let b = partition.cell(y + 1, x);
                if a.is_unused() || b.is_unused() || a.tsd.abs() >= SATURATION_GUARD || b.tsd.abs() >= SATURATION_GUARD {
                    continue;
                }
                if (a.tsd > 0.0) != (b.tsd > 0.0) {
                    let alpha = a.tsd / (a.tsd - b.tsd);
                    let local_x = (x as f32 + 0.5) * cell_size;
                    let local_y = (y as f32 + 0.5 + alpha) * cell_size;
                    points.push(origin + Vector2::new(local_x, local_y));
                }
            }
        }
    }

    points
}

#[cfg(test)]
mod test {
    use super::*;
    use common::robot::Pose2;
    use crate::sensor::SensorPolar2D;

    #[test]
    fn finds_crossings_around_an_integrated_wall() {
        let mut grid: TsdGrid<8> = TsdGrid::new(0.1, 3, 3);
        let mut sensor = SensorPolar2D::new(32, std::f32::consts::TAU / 32.0, 0.0, Some(2.0));
        sensor.set_pose(Pose2::new(0.4, 0.4, 0.0));
        for beam in 0..32 {
            sensor.set_beam(beam, 0.3, true);
        }
        grid.push(&sensor);

        let points = cast_axis_aligned(&grid);
        assert!(!points.is_empty());
    }

    #[test]
    fn empty_grid_has_no_crossings() {
        let grid: TsdGrid<8> = TsdGrid::new(0.1, 3, 3);
        assert!(cast_axis_aligned(&grid).is_empty());
    }

    #[test]
    fn saturated_cells_are_excluded_from_crossing_detection() {
        use crate::tsd::TsdCell;

        let mut grid: TsdGrid<4> = TsdGrid::new(0.1, 2, 2);
        {
            let partition = &mut grid.partitions_mut()[0];
            partition.init(0.0);
            partition.set_cell(0, 0, TsdCell { tsd: 0.99995, weight: 1.0 });
            partition.set_cell(0, 1, TsdCell { tsd: -0.5, weight: 1.0 });
        }
        assert!(cast_axis_aligned(&grid).is_empty());

        {
            let partition = &mut grid.partitions_mut()[0];
            partition.set_cell(0, 0, TsdCell { tsd: 0.5, weight: 1.0 });
        }
        assert!(!cast_axis_aligned(&grid).is_empty());
    }
}
