// src/quadtree/tile.rs
//! Quadtree node record

use crate::map::projection::TileCoord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TileId = u64;
pub type ScenarioId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub id: TileId,
    pub scenario_id: ScenarioId,
    pub lod: u32,
    pub x: i64,
    pub y: i64,
    /// Equal to `id` for the scenario root
    pub parent_id: TileId,
    pub created_at: DateTime<Utc>,
}

impl Tile {
    /// The root is the one tile that is its own parent
    pub fn is_root(&self) -> bool {
        self.parent_id == self.id
    }

    pub fn coord(&self) -> TileCoord {
        TileCoord::new(self.lod, self.x, self.y)
    }

    /// (min_x, min_y, max_x, max_y) covered by this tile in projected meters
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.coord().bounds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(id: TileId, parent_id: TileId, lod: u32) -> Tile {
        Tile {
            id,
            scenario_id: 5,
            lod,
            x: 0,
            y: 0,
            parent_id,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_root() {
        assert!(tile(3, 3, 0).is_root());
        assert!(!tile(4, 3, 1).is_root());
    }

    #[test]
    fn test_root_bounds_cover_world() {
        let (min_x, min_y, max_x, max_y) = tile(1, 1, 0).bounds();
        assert!((max_x - min_x - crate::map::projection::WORLD_SIZE).abs() < 1e-6);
        assert!((max_y - min_y - crate::map::projection::WORLD_SIZE).abs() < 1e-6);
    }
}
