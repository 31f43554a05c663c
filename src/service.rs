// src/service.rs
//! Request-level coordination of the pyramid and the quadtree index

use crate::{
    config::TileServerConfig,
    error::{Result, TileError},
    map::{MercatorPoint, TilePyramid},
    quadtree::{QuadtreeIndex, ScenarioId, Tile, TileRepository},
};
use serde::Serialize;
use std::{collections::BTreeMap, path::PathBuf, sync::Arc};
use tokio::task;

/// Path per layer for one request, `None` where no tile could be produced
pub type LayerTiles = BTreeMap<String, Option<PathBuf>>;

/// Answer to a raster request, serialized as `{"x":..,"y":..,"zoom":..,"layers":{..}}`
#[derive(Debug, Clone, Serialize)]
pub struct TileLookup {
    pub x: f64,
    pub y: f64,
    pub zoom: u32,
    pub layers: LayerTiles,
}

/// Shares one pyramid and one quadtree index between concurrent requests
pub struct TileService<R: TileRepository + 'static> {
    pyramid: Arc<TilePyramid>,
    index: QuadtreeIndex<R>,
    building_min_lod: u32,
    max_lod: u32,
}

impl<R: TileRepository + 'static> Clone for TileService<R> {
    fn clone(&self) -> Self {
        Self {
            pyramid: Arc::clone(&self.pyramid),
            index: self.index.clone(),
            building_min_lod: self.building_min_lod,
            max_lod: self.max_lod,
        }
    }
}

fn join_error(e: task::JoinError) -> TileError {
    TileError::Other(format!("Worker task failed: {}", e))
}

impl<R: TileRepository + 'static> TileService<R> {
    pub fn new(config: &TileServerConfig, repository: Arc<R>) -> Self {
        Self {
            pyramid: Arc::new(TilePyramid::with_max_steps(
                config.raster_layers(),
                config.max_steps,
            )),
            index: QuadtreeIndex::new(repository),
            building_min_lod: config.building_min_lod,
            max_lod: config.max_lod,
        }
    }

    pub fn pyramid(&self) -> &TilePyramid {
        &self.pyramid
    }

    pub fn index(&self) -> &QuadtreeIndex<R> {
        &self.index
    }

    /// Resolve one layer on the blocking pool
    pub async fn layer_tile(
        &self,
        layer: &str,
        point: MercatorPoint,
        zoom: u32,
    ) -> Result<Option<PathBuf>> {
        let pyramid = Arc::clone(&self.pyramid);
        let layer = layer.to_string();
        task::spawn_blocking(move || pyramid.get_layer_tile(&layer, point, zoom))
            .await
            .map_err(join_error)?
    }

    /// Resolve every configured layer for one request, all layers in parallel
    pub async fn lookup(&self, point: MercatorPoint, zoom: u32) -> Result<TileLookup> {
        let mut handles = Vec::new();
        for name in self.pyramid.layer_names() {
            let pyramid = Arc::clone(&self.pyramid);
            handles.push(task::spawn_blocking(move || {
                let tile = pyramid.get_layer_tile(&name, point, zoom);
                (name, tile)
            }));
        }

        let mut layers = LayerTiles::new();
        for handle in handles {
            let (name, tile) = handle.await.map_err(join_error)?;
            layers.insert(name, tile?);
        }

        Ok(TileLookup {
            x: point.x,
            y: point.y,
            zoom,
            layers,
        })
    }

    /// Bucket tile for a placed object.
    ///
    /// `min_lod` defaults to the building level and `max_lod` to the configured ceiling.
    pub async fn place(
        &self,
        scenario: ScenarioId,
        location: MercatorPoint,
        min_lod: Option<u32>,
        max_lod: Option<u32>,
    ) -> Result<Tile> {
        let index = self.index.clone();
        let min_lod = min_lod.unwrap_or(self.building_min_lod);
        let max_lod = max_lod.unwrap_or(self.max_lod);
        task::spawn_blocking(move || {
            index.resolve_with_ceiling(scenario, location, min_lod, max_lod)
        })
        .await
        .map_err(join_error)?
    }

    pub async fn root(&self, scenario: ScenarioId) -> Result<Tile> {
        let index = self.index.clone();
        task::spawn_blocking(move || index.get_root(scenario))
            .await
            .map_err(join_error)?
    }
}
