//! Tile layout: lazy grid coordinate sequences and the grid configuration
//! that selects between them.

pub mod sequence;
mod tiles;

pub use sequence::{column_major, finite, infinite, row_major, Finite, GridSequence, Infinite, Tile};
pub use tiles::{Direction, Extent, TileConfiguration, TileSequence};
