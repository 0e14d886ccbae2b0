pub mod cell;
pub mod frustum;
pub mod grid;
pub mod io;
pub mod tree;

pub use cell::{InterpolationStatus, PartitionState, TsdCell, TsdPartition, Visibility};
pub use grid::{CellRef, TsdGrid};
pub use io::GridIoError;
pub use tree::{PartitionIndex, PartitionTree};
