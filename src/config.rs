// src/config.rs
//! Configuration: raster layer locations, pyramid and quadtree limits

use crate::error::{Result, TileError};
use crate::map::{RasterLayer, DEFAULT_MAX_STEPS};
use crate::quadtree::DEFAULT_MAX_LOD;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Relative paths are resolved against `texture_root`
    pub path: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default)]
    pub upscale: bool,
}

fn default_extension() -> String {
    "png".to_string()
}

impl LayerConfig {
    fn new(path: &str, extension: &str) -> Self {
        Self {
            path: PathBuf::from(path),
            extension: extension.to_string(),
            upscale: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TileServerConfig {
    pub texture_root: PathBuf,
    pub layers: BTreeMap<String, LayerConfig>,
    pub max_steps: u32,
    pub max_lod: u32,
    pub building_min_lod: u32,
    pub tile_store: PathBuf,
    pub log_filter: String,
}

impl Default for TileServerConfig {
    fn default() -> Self {
        let mut layers = BTreeMap::new();
        layers.insert("ortho".to_string(), LayerConfig::new("raster/bmaporthofoto30cm", "jpg"));
        layers.insert("map".to_string(), LayerConfig::new("raster/opentopomap", "png"));
        layers.insert("dhm".to_string(), LayerConfig::new("raster/dhm", "png"));
        layers.insert("land-use".to_string(), LayerConfig::new("land-use/data", "png"));

        Self {
            texture_root: PathBuf::from("resources"),
            layers,
            max_steps: DEFAULT_MAX_STEPS,
            max_lod: DEFAULT_MAX_LOD,
            building_min_lod: 16,
            tile_store: PathBuf::from("resources/tiles.json"),
            log_filter: "info".to_string(),
        }
    }
}

impl TileServerConfig {
    /// Load from the user config file, or defaults if there is none
    pub fn load() -> Result<Self> {
        let path = Self::get_config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TileError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            TileError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// `$HOME/.config/landscape-tiles/config.json`
    pub fn get_config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| TileError::Config("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home).join(".config").join("landscape-tiles").join("config.json"))
    }

    fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(TileError::Config("max_steps must be at least 1".to_string()));
        }
        if self.building_min_lod > self.max_lod {
            return Err(TileError::Config(format!(
                "building_min_lod {} is above max_lod {}",
                self.building_min_lod, self.max_lod
            )));
        }
        for (name, layer) in &self.layers {
            if layer.extension.trim_start_matches('.').is_empty() {
                return Err(TileError::Config(format!("Layer {} has no file extension", name)));
            }
        }
        Ok(())
    }

    /// Layer map handed to the pyramid, with paths made absolute against `texture_root`
    pub fn raster_layers(&self) -> HashMap<String, RasterLayer> {
        self.layers
            .iter()
            .map(|(name, layer)| {
                let base = if layer.path.is_absolute() {
                    layer.path.clone()
                } else {
                    self.texture_root.join(&layer.path)
                };
                (name.clone(), RasterLayer::new(base, &layer.extension, layer.upscale))
            })
            .collect()
    }
}
