// src/map/pyramid.rs
//! File-backed tile pyramid that fills cache misses by cropping coarser tiles
//!
//! A layer directory is organised as `{base}/{zoom}/{tile_x}/{tile_y}.{ext}`.
//! When a tile is missing, the tile one zoom level coarser is located (or
//! generated the same way), the quarter covering the requested tile is cut
//! out of it and optionally EPX-upscaled, and the result is written back so
//! the next request is a plain cache hit.

use crate::error::{Result, TileError};
use crate::map::epx;
use crate::map::projection::{MercatorPoint, TileCoord};
use image::ImageFormat;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// How many coarser levels are probed before giving up
pub const DEFAULT_MAX_STEPS: u32 = 8;

const LOCK_STRIPES: usize = 64;

/// One raster layer on disk
#[derive(Debug, Clone, PartialEq)]
pub struct RasterLayer {
    pub base_path: PathBuf,
    pub extension: String,
    pub upscale: bool,
}

impl RasterLayer {
    pub fn new(base_path: impl Into<PathBuf>, extension: &str, upscale: bool) -> Self {
        Self {
            base_path: base_path.into(),
            extension: extension.trim_start_matches('.').to_string(),
            upscale,
        }
    }

    /// Expected location of a tile image
    pub fn tile_path(&self, tile: TileCoord) -> PathBuf {
        tile_path(&self.base_path, tile, &self.extension)
    }
}

/// Build `{base}/{zoom}/{x}/{y}.{ext}`
pub fn tile_path(base_path: &Path, tile: TileCoord, extension: &str) -> PathBuf {
    base_path
        .join(tile.zoom.to_string())
        .join(tile.x.to_string())
        .join(format!("{}.{}", tile.y, extension))
}

/// A cached tile exists and is not empty
pub fn is_cached(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// Materializes tiles for a fixed set of named layers
pub struct TilePyramid {
    layers: HashMap<String, RasterLayer>,
    max_steps: u32,
    stripes: Vec<Mutex<()>>,
}

impl TilePyramid {
    pub fn new(layers: HashMap<String, RasterLayer>) -> Self {
        Self::with_max_steps(layers, DEFAULT_MAX_STEPS)
    }

    pub fn with_max_steps(layers: HashMap<String, RasterLayer>, max_steps: u32) -> Self {
        Self {
            layers,
            max_steps,
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn layer(&self, name: &str) -> Option<&RasterLayer> {
        self.layers.get(name)
    }

    /// Layer names in sorted order
    pub fn layer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.layers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve a tile of a configured layer
    pub fn get_layer_tile(
        &self,
        name: &str,
        point: MercatorPoint,
        zoom: u32,
    ) -> Result<Option<PathBuf>> {
        let layer = self
            .layers
            .get(name)
            .ok_or_else(|| TileError::UnknownLayer(name.to_string()))?;
        Ok(self.get_tile(point, zoom, layer))
    }

    /// Path to the tile containing `point` at `zoom`, generating it from coarser tiles if needed.
    ///
    /// Returns `None` when no ancestor within `max_steps` levels exists or the
    /// tile could not be produced.
    pub fn get_tile(
        &self,
        point: MercatorPoint,
        zoom: u32,
        layer: &RasterLayer,
    ) -> Option<PathBuf> {
        let path = self.resolve_recursive(point, zoom, layer, 0)?;
        if is_cached(&path) {
            Some(path)
        } else {
            None
        }
    }

    fn resolve_recursive(
        &self,
        point: MercatorPoint,
        zoom: u32,
        layer: &RasterLayer,
        steps: u32,
    ) -> Option<PathBuf> {
        if steps >= self.max_steps {
            error!(
                "{}: no tile could be found or created (tried from zoom {} down to {}) at location {}, {}",
                layer.base_path.display(),
                zoom + steps,
                zoom + 1,
                point.x,
                point.y
            );
            return None;
        }

        let tile = TileCoord::containing(point, zoom);
        let path = layer.tile_path(tile);

        if is_cached(&path) {
            debug!("cache hit {}", path.display());
            return Some(path);
        }

        if zoom == 0 {
            error!(
                "{}: no tile could be found or created (tried from zoom {} down to 0) at location {}, {}",
                layer.base_path.display(),
                steps,
                point.x,
                point.y
            );
            return None;
        }

        // The coarser tile is either already there or failed; failure bubbles up
        self.resolve_recursive(point, zoom - 1, layer, steps + 1)?;

        if let Err(e) = self.materialize_child(point, zoom - 1, layer) {
            warn!(
                "Could not derive {} from zoom {}: {}",
                path.display(),
                zoom - 1,
                e
            );
        }

        Some(path)
    }

    /// Cut the quarter covering `point` out of the tile at `parent_zoom` and
    /// store it as the tile at `parent_zoom + 1`.
    ///
    /// Returns `Ok(false)` without touching anything when the parent image is
    /// not on disk or the child has been written by someone else meanwhile.
    pub fn materialize_child(
        &self,
        point: MercatorPoint,
        parent_zoom: u32,
        layer: &RasterLayer,
    ) -> Result<bool> {
        let parent = TileCoord::containing(point, parent_zoom);
        let child = TileCoord::containing(point, parent_zoom + 1);

        let parent_path = layer.tile_path(parent);
        let child_path = layer.tile_path(child);

        if !parent_path.is_file() {
            return Ok(false);
        }

        let _guard = self.stripe(layer, child).lock();
        if is_cached(&child_path) {
            return Ok(false);
        }

        let source = image::open(&parent_path)?;
        let (width, height) = (source.width(), source.height());
        let quadrant = child.quadrant();

        let (x0, x1) = if quadrant.is_right() {
            (width / 2, width)
        } else {
            (0, width / 2)
        };
        let (y0, y1) = if quadrant.is_bottom() {
            (height / 2, height)
        } else {
            (0, height / 2)
        };

        let mut cropped = source.crop_imm(x0, y0, x1 - x0, y1 - y0);
        if layer.upscale {
            cropped = epx::scale_dynamic(&cropped);
        }

        let directory = child_path.parent().ok_or_else(|| {
            TileError::Other(format!("No parent directory for {}", child_path.display()))
        })?;
        std::fs::create_dir_all(directory)?;

        let format = ImageFormat::from_path(&child_path)?;
        let mut staging = tempfile::Builder::new()
            .prefix(".tile-")
            .tempfile_in(directory)?;
        {
            let mut writer = BufWriter::new(staging.as_file_mut());
            cropped.write_to(&mut writer, format)?;
            writer.flush()?;
        }
        staging.persist(&child_path)?;

        info!("generated {} from {}", child_path.display(), parent_path.display());
        Ok(true)
    }

    fn stripe(&self, layer: &RasterLayer, tile: TileCoord) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        layer.base_path.hash(&mut hasher);
        layer.extension.hash(&mut hasher);
        tile.hash(&mut hasher);
        &self.stripes[(hasher.finish() as usize) % self.stripes.len()]
    }
}
