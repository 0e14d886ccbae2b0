pub mod config;
pub mod matching;
pub mod node;
pub mod raycast;
pub mod scan;
pub mod sensor;
pub mod tsd;

pub use config::{TsdGridSlamNodeConfig, TsdGridSlamParameters};
pub use node::TsdGridSlamNode;
pub use scan::Scan;
pub use sensor::SensorPolar2D;
pub use tsd::{TsdCell, TsdGrid};
