// src/map/mod.rs
//! Tile addressing, raster tile pyramids and pixel upscaling

pub mod epx;
pub mod maintenance;
pub mod projection;
mod pyramid;

pub use projection::{tile_coords, tile_origin, tile_size, MercatorPoint, Quadrant, TileCoord};
pub use pyramid::{is_cached, tile_path, RasterLayer, TilePyramid, DEFAULT_MAX_STEPS};
