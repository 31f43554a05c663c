// src/lib.rs
//! Landscape Tiles Library
//!
//! Tile pyramid and quadtree core of a landscape visualization server: raster
//! tiles are served from per-layer directory pyramids that fill themselves in
//! from coarser zoom levels, and placed objects are bucketed into per-scenario
//! quadtrees that only grow where data lands.

pub mod config;
pub mod error;
pub mod map;
pub mod quadtree;
pub mod service;

// Re-export main types for convenience
pub use config::TileServerConfig;
pub use error::{Result, TileError};
pub use map::{MercatorPoint, RasterLayer, TileCoord, TilePyramid};
pub use quadtree::{MemoryTileRepository, QuadtreeIndex, Tile, TileRepository};
pub use service::{TileLookup, TileService};
