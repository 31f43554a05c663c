// src/quadtree/index.rs
//! Lazily grown quadtree of storage buckets per scenario

use super::store::TileRepository;
use super::tile::{ScenarioId, Tile};
use crate::error::Result;
use crate::map::projection::{tile_coords, MercatorPoint};
use std::sync::Arc;
use tracing::debug;

/// Deepest level a tree may grow to
pub const DEFAULT_MAX_LOD: u32 = 28;

/// Finds or creates the tile a point belongs to
pub struct QuadtreeIndex<R: TileRepository> {
    repository: Arc<R>,
}

impl<R: TileRepository> Clone for QuadtreeIndex<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: TileRepository> QuadtreeIndex<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// The scenario's root tile, created on first access
    pub fn get_root(&self, scenario: ScenarioId) -> Result<Tile> {
        if let Some(tile) = self.repository.find_tile(scenario, 0, 0, 0)? {
            if tile.is_root() {
                return Ok(tile);
            }
        }
        self.repository.create_tile(scenario, 0, 0, 0, None)
    }

    /// Deepest existing tile containing `location`, growing the tree down to
    /// `min_lod` if the existing branch stops short of it
    pub fn resolve(
        &self,
        scenario: ScenarioId,
        location: MercatorPoint,
        min_lod: u32,
    ) -> Result<Tile> {
        self.resolve_with_ceiling(scenario, location, min_lod, DEFAULT_MAX_LOD)
    }

    pub fn resolve_with_ceiling(
        &self,
        scenario: ScenarioId,
        location: MercatorPoint,
        min_lod: u32,
        max_lod: u32,
    ) -> Result<Tile> {
        let root = self.get_root(scenario)?;
        self.resolve_from(root, location, min_lod, max_lod)
    }

    /// Same as [`resolve_with_ceiling`](Self::resolve_with_ceiling) but
    /// starting below an already fetched tile
    pub fn resolve_from(
        &self,
        start: Tile,
        location: MercatorPoint,
        min_lod: u32,
        max_lod: u32,
    ) -> Result<Tile> {
        let mut tile = start;

        while tile.lod < max_lod {
            let lod = tile.lod + 1;
            let (x, y) = tile_coords(location.x, location.y, lod);

            match self.repository.find_tile(tile.scenario_id, lod, x, y)? {
                Some(child) => tile = child,
                None if tile.lod >= min_lod => return Ok(tile),
                None => return self.grow(tile, location, min_lod.min(max_lod)),
            }
        }

        Ok(tile)
    }

    /// Create one tile per level along the branch containing `location`
    fn grow(&self, mut tile: Tile, location: MercatorPoint, target_lod: u32) -> Result<Tile> {
        while tile.lod < target_lod {
            let lod = tile.lod + 1;
            let (x, y) = tile_coords(location.x, location.y, lod);
            tile = self
                .repository
                .create_tile(tile.scenario_id, lod, x, y, Some(tile.id))?;
        }
        debug!(
            "resolved scenario {} bucket at lod {} ({}, {})",
            tile.scenario_id, tile.lod, tile.x, tile.y
        );
        Ok(tile)
    }
}
