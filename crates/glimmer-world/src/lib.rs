//! Bounded tile grid that stores accumulated light and owns its tracer.
#![forbid(unsafe_code)]

mod map;
mod tile;

pub use map::{MAX_TILES, TileMap};
pub use tile::{Tile, TileFaces};

#[cfg(test)]
mod tests;
