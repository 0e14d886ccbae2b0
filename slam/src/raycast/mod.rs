pub mod axis;
pub mod polar;

pub use axis::cast_axis_aligned;
pub use polar::{cast_polar, RayHit, RaycastOutcome};
