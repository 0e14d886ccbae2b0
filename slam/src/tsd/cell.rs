//! A single TSD cell and the `(P+1)x(P+1)` partition that owns a flat,
//! strided array of them. Grounded on `original_source`'s
//! `TsdGridPartition` (`addTsd`, `interpolateBilinear`, `isInRange`), kept
//! as an owning flat buffer instead of the original's raw `TsdCell**`
//! matrix.

use nalgebra::{Matrix2xX, Matrix3xX, Vector2};

use crate::sensor::SensorPolar2D;

pub const MAXWEIGHT: f32 = 32.0;

#[derive(Clone, Copy, Debug)]
pub struct TsdCell {
    pub tsd: f32,
    pub weight: f32,
}

impl Default for TsdCell {
    fn default() -> Self {
        Self {
            tsd: 1.0,
            weight: 0.0,
        }
    }
}

impl TsdCell {
    pub fn is_unused(&self) -> bool {
        self.weight == 0.0
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum PartitionState {
    Uninitialized,
    Empty { init_weight: f32 },
    Content,
}

/// Status of a single `interpolateBilinear` query.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum InterpolationStatus {
    Success,
    InvalidIndex,
    EmptyPartition,
    IsNan,
}

/// Result of a leaf-level frustum test, per spec.md §4.3.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Visibility {
    pub reject: bool,
    pub empty: bool,
}

/// Owns a `(P+1) x (P+1)` flat array of cells, where `P = 2^layout_partition`.
/// The extra row/column cache the neighbor partitions' first row/column
/// (border propagation, see `TsdGrid::propagate_borders`).
pub struct TsdPartition<const P: usize> {
    cells: Vec<TsdCell>,
    state: PartitionState,

    /// World-space origin (bottom-left corner) of this partition.
    origin: Vector2<f32>,
    cell_size: f32,

    pub centroid: Vector2<f32>,
    pub circumradius: f32,
    pub corners: [Vector2<f32>; 4],

    /// Homogeneous world-space centers of every `P x P` cell, used to
    /// back-project against the sensor during `push`.
    pub cell_centers: Matrix3xX<f32>,
    pub local_coords: Matrix2xX<f32>,
}

impl<const P: usize> TsdPartition<P> {
    const DIM: usize = P + 1;

    pub fn new(origin: Vector2<f32>, cell_size: f32) -> Self {
        let half_extent = P as f32 * cell_size / 2.0;
        let centroid = origin + Vector2::new(half_extent, half_extent);
        let circumradius = half_extent * std::f32::consts::SQRT_2;

        let corners = [
            origin,
            origin + Vector2::new(P as f32 * cell_size, 0.0),
            origin + Vector2::new(P as f32 * cell_size, P as f32 * cell_size),
            origin + Vector2::new(0.0, P as f32 * cell_size),
        ];

        let mut local_coords = Matrix2xX::zeros(P * P);
        let mut cell_centers = Matrix3xX::zeros(P * P);
        for row in 0..P {
            for col in 0..P {
                let idx = row * P + col;
                let local_x = (col as f32 + 0.5) * cell_size;
                let local_y = (row as f32 + 0.5) * cell_size;
                local_coords.set_column(idx, &Vector2::new(local_x, local_y));
                let world = origin + Vector2::new(local_x, local_y);
                cell_centers.set_column(idx, &nalgebra::Vector3::new(world.x, world.y, 1.0));
            }
        }

        Self {
            cells: vec![TsdCell::default(); Self::DIM * Self::DIM],
            state: PartitionState::Uninitialized,
            origin,
            cell_size,
            centroid,
            circumradius,
            corners,
            cell_centers,
            local_coords,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state == PartitionState::Content
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.state, PartitionState::Empty { .. })
    }

    pub fn state(&self) -> PartitionState {
        self.state
    }

    fn index(&self, row: usize, col: usize) -> usize {
        row * Self::DIM + col
    }

    pub fn cell(&self, row: usize, col: usize) -> TsdCell {
        self.cells[self.index(row, col)]
    }

    pub fn set_cell(&mut self, row: usize, col: usize, cell: TsdCell) {
        let idx = self.index(row, col);
        self.cells[idx] = cell;
    }

    pub fn cells_mut(&mut self) -> &mut [TsdCell] {
        &mut self.cells
    }

    /// Transitions UNINITIALIZED -> CONTENT, seeding every cell with the
    /// sentinel `(tsd=1, weight=init_weight)`.
    pub fn init(&mut self, init_weight: f32) {
        if self.state == PartitionState::Content {
            return;
        }
        for cell in self.cells.iter_mut() {
            *cell = TsdCell {
                tsd: 1.0,
                weight: init_weight,
            };
        }
        self.state = PartitionState::Content;
    }

    pub fn mark_empty(&mut self, init_weight: f32) {
        if self.state == PartitionState::Uninitialized {
            self.state = PartitionState::Empty { init_weight };
        }
    }

    /// Weighted running-mean fusion of a new signed distance observation,
    /// clamped to `[-1, 1]` and weight-capped at `MAXWEIGHT`.
    pub fn add_tsd(&mut self, local_x: f32, local_y: f32, signed_distance: f32, max_truncation: f32) {
        let normalized = (signed_distance / max_truncation).clamp(-1.0, 1.0);
        if signed_distance < -max_truncation {
            return;
        }

        let col = (local_x / self.cell_size).floor() as isize;
        let row = (local_y / self.cell_size).floor() as isize;
        if col < 0 || row < 0 || col as usize >= P || row as usize >= P {
            return;
        }

        self.init(0.0);

        let cell = self.cell(row as usize, col as usize);
        let new_weight = (cell.weight + 1.0).min(MAXWEIGHT);
        let new_tsd = (cell.tsd * cell.weight + normalized) / new_weight;
        self.set_cell(
            row as usize,
            col as usize,
            TsdCell {
                tsd: new_tsd,
                weight: new_weight,
            },
        );
    }

    /// Four-neighbor bilinear mix using the boundary-extended `(P+1)x(P+1)`
    /// array. `x, y` index the lower-left of the four-cell neighborhood,
    /// `wx, wy in [0,1]` are the interpolation weights.
    pub fn interpolate_bilinear(&self, x: usize, y: usize, wx: f32, wy: f32) -> f32 {
        let c00 = self.cell(y, x);
        let c10 = self.cell(y, x + 1);
        let c01 = self.cell(y + 1, x);
        let c11 = self.cell(y + 1, x + 1);

        (1.0 - wx) * (1.0 - wy) * c00.tsd
            + wx * (1.0 - wy) * c10.tsd
            + (1.0 - wx) * wy * c01.tsd
            + wx * wy * c11.tsd
    }

    /// Frustum test for this leaf partition, per spec.md §4.3.
    pub fn is_in_range(
        &self,
        sensor_pos: Vector2<f32>,
        sensor: &SensorPolar2D,
        max_truncation: f32,
        min_range: f32,
        max_range: f32,
    ) -> Visibility {
        crate::tsd::frustum::frustum_test(
            self.centroid,
            self.circumradius,
            sensor_pos,
            sensor,
            Some(&self.corners),
            max_truncation,
            min_range,
            max_range,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn init_seeds_sentinel_values() {
        let mut partition: TsdPartition<4> = TsdPartition::new(Vector2::zeros(), 0.1);
        partition.init(0.0);
        assert!(partition.is_initialized());
        assert_eq!(partition.cell(0, 0).tsd, 1.0);
        assert_eq!(partition.cell(0, 0).weight, 0.0);
    }

    #[test]
    fn add_tsd_clamps_and_caps_weight() {
        let mut partition: TsdPartition<4> = TsdPartition::new(Vector2::zeros(), 0.1);
        for _ in 0..64 {
            partition.add_tsd(0.05, 0.05, 10.0, 0.2);
        }
        let cell = partition.cell(0, 0);
        assert!(cell.tsd <= 1.0 && cell.tsd >= -1.0);
        assert!(cell.weight <= MAXWEIGHT);
    }

    #[test]
    fn bilinear_matches_cell_when_uniform() {
        let mut partition: TsdPartition<4> = TsdPartition::new(Vector2::zeros(), 0.1);
        partition.init(0.0);
        for cell in partition.cells_mut() {
            cell.tsd = 0.5;
            cell.weight = 1.0;
        }
        let v = partition.interpolate_bilinear(1, 1, 0.3, 0.7);
        assert!((v - 0.5).abs() < 1e-6);
    }
}
