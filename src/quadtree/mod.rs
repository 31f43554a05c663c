// src/quadtree/mod.rs
//! Scenario quadtrees used to bucket placed objects by location

pub mod index;
pub mod store;
pub mod tile;

pub use index::{QuadtreeIndex, DEFAULT_MAX_LOD};
pub use store::{MemoryTileRepository, TileRepository};
pub use tile::{ScenarioId, Tile, TileId};
