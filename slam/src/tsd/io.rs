//! Textual grid snapshot format, per spec.md §6. Grounded on
//! `original_source`'s `TsdGrid::storeGrid` and its load constructor.
//!
//! Format (whitespace-separated tokens, one header line then per-partition
//! records in row-major order):
//!
//! ```text
//! <cell_size> <layout_partition> <layout_grid> <max_truncation>
//! <tag> [<init_weight> | <tsd_0> <weight_0> ... <tsd_{P*P-1}> <weight_{P*P-1}>]
//! ```
//!
//! `tag` is `0` (uninitialized), `1` (empty, followed by its init weight) or
//! `2` (content, followed by `P*P` `(tsd, weight)` pairs in row-major order).

use std::io::{Read, Write};

use crate::tsd::cell::{PartitionState, TsdCell, TsdPartition};
use crate::tsd::grid::TsdGrid;

#[derive(thiserror::Error, Debug)]
pub enum GridIoError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid layout: {0}")]
    InvalidLayout(String),
    #[error("truncated snapshot: expected more data after {0} tokens")]
    Truncated(usize),
    #[error("malformed token {token:?} at position {position}")]
    Malformed { token: String, position: usize },
}

struct TokenStream {
    tokens: Vec<String>,
    pos: usize,
}

impl TokenStream {
    fn new(text: &str) -> Self {
        Self {
            tokens: text.split_whitespace().map(str::to_owned).collect(),
            pos: 0,
        }
    }

    fn next(&mut self) -> Result<&str, GridIoError> {
        let token = self.tokens.get(self.pos).ok_or(GridIoError::Truncated(self.pos))?;
        self.pos += 1;
        Ok(token)
    }

    fn next_f32(&mut self) -> Result<f32, GridIoError> {
        let pos = self.pos;
        let token = self.next()?.to_owned();
        token.parse().map_err(|_| GridIoError::Malformed { token, position: pos })
    }

    fn next_u32(&mut self) -> Result<u32, GridIoError> {
        let pos = self.pos;
        let token = self.next()?.to_owned();
        token.parse().map_err(|_| GridIoError::Malformed { token, position: pos })
    }
}

pub fn store<W: Write, const P: usize>(grid: &TsdGrid<P>, mut writer: W) -> Result<(), GridIoError> {
    writeln!(
        writer,
        "{} {} {} {}",
        grid.cell_size(),
        grid.layout_partition(),
        grid.layout_grid(),
        grid.max_truncation()
    )?;

    for partition in grid.partitions() {
        match partition.state() {
            PartitionState::Uninitialized => writeln!(writer, "0")?,
            PartitionState::Empty { init_weight } => writeln!(writer, "1 {init_weight}")?,
            PartitionState::Content => {
                write!(writer, "2")?;
                for row in 0..P {
                    for col in 0..P {
                        let cell = partition.cell(row, col);
                        write!(writer, " {} {}", cell.tsd, cell.weight)?;
                    }
                }
                writeln!(writer)?;
            }
        }
    }

    Ok(())
}

pub fn load<R: Read, const P: usize>(mut reader: R) -> Result<TsdGrid<P>, GridIoError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    let mut tokens = TokenStream::new(&text);

    let cell_size = tokens.next_f32()?;
    let layout_partition = tokens.next_u32()?;
    let layout_grid = tokens.next_u32()?;
    let max_truncation = tokens.next_f32()?;

    if layout_partition > 15 || layout_grid > 15 {
        return Err(GridIoError::InvalidLayout(format!(
            "layout_partition={layout_partition}, layout_grid={layout_grid} must be in [0,15]"
        )));
    }

    let mut grid: TsdGrid<P> = TsdGrid::new(cell_size, layout_partition, layout_grid);
    grid.set_max_truncation(max_truncation);

    for partition in grid.partitions_mut() {
        let tag = tokens.next_u32()?;
        match tag {
            0 => {}
            1 => {
                let init_weight = tokens.next_f32()?;
                partition.mark_empty(init_weight);
            }
            2 => {
                partition.init(0.0);
                for row in 0..P {
                    for col in 0..P {
                        let tsd = tokens.next_f32()?;
                        let weight = tokens.next_f32()?;
                        partition.set_cell(row, col, TsdCell { tsd, weight });
                    }
                }
            }
            other => {
                return Err(GridIoError::Malformed {
                    token: other.to_string(),
                    position: tokens.pos,
                })
            }
        }
    }

    Ok(grid)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_a_pushed_grid() {
        use common::robot::Pose2;
        use crate::sensor::SensorPolar2D;

        let mut grid: TsdGrid<4> = TsdGrid::new(0.1, 2, 2);
        let mut sensor = SensorPolar2D::new(4, std::f32::consts::FRAC_PI_2, 0.0, Some(1.0));
        sensor.set_pose(Pose2::new(0.5, 0.5, 0.0));
        sensor.set_beam(0, 0.3, true);
        grid.push(&sensor);

        let mut buf = Vec::new();
        store(&grid, &mut buf).unwrap();

        let loaded: TsdGrid<4> = load(buf.as_slice()).unwrap();
        assert_eq!(loaded.cell_size(), grid.cell_size());
        assert_eq!(loaded.layout_grid(), grid.layout_grid());

        for (a, b) in grid.partitions().iter().zip(loaded.partitions()) {
            assert_eq!(a.state(), b.state());
        }
    }

    #[test]
    fn rejects_truncated_header() {
        let result: Result<TsdGrid<4>, GridIoError> = load("0.1 2".as_bytes());
        assert!(matches!(result, Err(GridIoError::Truncated(_))));
    }
}
