pub mod bitmask;
pub mod coord;

pub use bitmask::Bitmask;
pub use coord::Coord;
