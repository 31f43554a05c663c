// src/error.rs
//! Error types for the tile subsystem

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TileError>;

#[derive(Debug, Error)]
pub enum TileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to move tile into place: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("Unknown raster layer: {0}")]
    UnknownLayer(String),
    #[error("Tile store error: {0}")]
    Store(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Error: {0}")]
    Other(String),
}
