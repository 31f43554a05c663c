// src/map/projection.rs
//! Web Mercator meter coordinates <-> slippy map tile addresses

use serde::{Deserialize, Serialize};

/// Half the circumference of the Web Mercator sphere (6378137 m radius)
pub const ORIGIN_SHIFT: f64 = std::f64::consts::PI * 6_378_137.0;

/// Edge length in meters of the single zoom 0 tile
pub const WORLD_SIZE: f64 = 2.0 * ORIGIN_SHIFT;

/// Edge length in pixels of every tile image
pub const TILE_PIXELS: u32 = 256;

/// A projected point in Web Mercator meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MercatorPoint {
    pub x: f64,
    pub y: f64,
}

impl MercatorPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Integer tile address at a zoom level.
///
/// Numbering follows OSM: `x` grows eastward from the antimeridian, `y` grows
/// southward from the northern edge of the projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub zoom: u32,
    pub x: i64,
    pub y: i64,
}

/// Which quarter of its parent a tile covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Quadrant {
    /// True for the right column (odd x)
    pub fn is_right(&self) -> bool {
        matches!(self, Quadrant::TopRight | Quadrant::BottomRight)
    }

    /// True for the bottom row (odd y)
    pub fn is_bottom(&self) -> bool {
        matches!(self, Quadrant::BottomLeft | Quadrant::BottomRight)
    }
}

impl TileCoord {
    pub fn new(zoom: u32, x: i64, y: i64) -> Self {
        Self { zoom, x, y }
    }

    /// Tile containing `point` at `zoom`
    pub fn containing(point: MercatorPoint, zoom: u32) -> Self {
        let (x, y) = tile_coords(point.x, point.y, zoom);
        Self { zoom, x, y }
    }

    /// The tile one zoom level coarser that contains this one
    pub fn parent(&self) -> Option<Self> {
        if self.zoom == 0 {
            return None;
        }
        Some(Self {
            zoom: self.zoom - 1,
            x: self.x.div_euclid(2),
            y: self.y.div_euclid(2),
        })
    }

    /// The four tiles one zoom level finer, in reading order
    pub fn children(&self) -> [Self; 4] {
        let zoom = self.zoom + 1;
        let (x, y) = (self.x * 2, self.y * 2);
        [
            Self::new(zoom, x, y),
            Self::new(zoom, x + 1, y),
            Self::new(zoom, x, y + 1),
            Self::new(zoom, x + 1, y + 1),
        ]
    }

    /// Position of this tile inside its parent, from coordinate parity
    pub fn quadrant(&self) -> Quadrant {
        match (self.x.rem_euclid(2) == 1, self.y.rem_euclid(2) == 1) {
            (false, false) => Quadrant::TopLeft,
            (true, false) => Quadrant::TopRight,
            (false, true) => Quadrant::BottomLeft,
            (true, true) => Quadrant::BottomRight,
        }
    }

    /// (min_x, min_y, max_x, max_y) in meters
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        tile_bounds(self.x, self.y, self.zoom)
    }
}

/// Edge length in meters of a tile at `zoom`
pub fn tile_size(zoom: u32) -> f64 {
    WORLD_SIZE / 2_f64.powi(zoom as i32)
}

/// Ground resolution of a tile image at `zoom`
pub fn meters_per_pixel(zoom: u32) -> f64 {
    tile_size(zoom) / TILE_PIXELS as f64
}

/// Calculate tile coordinates from projected meters and zoom level
pub fn tile_coords(meter_x: f64, meter_y: f64, zoom: u32) -> (i64, i64) {
    let size = tile_size(zoom);
    let x = ((meter_x + ORIGIN_SHIFT) / size).floor() as i64;
    let y = ((ORIGIN_SHIFT - meter_y) / size).floor() as i64;
    (x, y)
}

/// North-west corner of a tile in projected meters
pub fn tile_origin(tile_x: i64, tile_y: i64, zoom: u32) -> (f64, f64) {
    let size = tile_size(zoom);
    let meter_x = tile_x as f64 * size - ORIGIN_SHIFT;
    let meter_y = ORIGIN_SHIFT - tile_y as f64 * size;
    (meter_x, meter_y)
}

/// (min_x, min_y, max_x, max_y) of a tile in projected meters
pub fn tile_bounds(tile_x: i64, tile_y: i64, zoom: u32) -> (f64, f64, f64, f64) {
    let size = tile_size(zoom);
    let (min_x, max_y) = tile_origin(tile_x, tile_y, zoom);
    (min_x, max_y - size, min_x + size, max_y)
}

/// Convert a y coordinate between OSM and TMS numbering (the mapping is its own inverse)
pub fn flip_y(tile_y: i64, zoom: u32) -> i64 {
    (1_i64 << zoom) - tile_y - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_zero_covers_world() {
        assert_eq!(tile_coords(0.0, 0.0, 0), (0, 0));
        assert_eq!(tile_coords(-ORIGIN_SHIFT + 1.0, ORIGIN_SHIFT - 1.0, 0), (0, 0));
        assert_eq!(tile_coords(ORIGIN_SHIFT - 1.0, -ORIGIN_SHIFT + 1.0, 0), (0, 0));
    }

    #[test]
    fn test_origin_lands_on_center_tiles() {
        // (0, 0) sits on the corner shared by the four central tiles
        assert_eq!(tile_coords(0.0, 0.0, 1), (1, 1));
        assert_eq!(tile_coords(0.0, 0.0, 16), (1 << 15, 1 << 15));
        assert_eq!(tile_coords(-1.0, 1.0, 1), (0, 0));
    }

    #[test]
    fn test_y_grows_southward() {
        let (_, north) = tile_coords(0.0, 5_000_000.0, 4);
        let (_, south) = tile_coords(0.0, -5_000_000.0, 4);
        assert!(north < south);
    }

    #[test]
    fn test_origin_inverts_coords() {
        let zoom = 12;
        let (x, y) = tile_coords(1_822_000.0, 6_141_000.0, zoom);
        let (min_x, min_y, max_x, max_y) = tile_bounds(x, y, zoom);

        assert!(min_x <= 1_822_000.0 && 1_822_000.0 < max_x);
        assert!(min_y < 6_141_000.0 && 6_141_000.0 <= max_y);
        assert!((max_x - min_x - tile_size(zoom)).abs() < 1e-6);
    }

    #[test]
    fn test_tile_size_halves() {
        assert!((tile_size(0) - WORLD_SIZE).abs() < 1e-9);
        assert!((tile_size(1) * 2.0 - WORLD_SIZE).abs() < 1e-9);
        assert!((meters_per_pixel(0) * 256.0 - WORLD_SIZE).abs() < 1e-9);
    }

    #[test]
    fn test_children_and_parent() {
        let tile = TileCoord::new(9, 2, 2);
        let children = tile.children();

        assert_eq!(children[0], TileCoord::new(10, 4, 4));
        assert_eq!(children[1], TileCoord::new(10, 5, 4));
        assert_eq!(children[2], TileCoord::new(10, 4, 5));
        assert_eq!(children[3], TileCoord::new(10, 5, 5));

        for child in &children {
            assert_eq!(child.parent(), Some(tile));
        }
        assert_eq!(TileCoord::new(0, 0, 0).parent(), None);
    }

    #[test]
    fn test_quadrant_from_parity() {
        let children = TileCoord::new(3, 1, 6).children();
        assert_eq!(children[0].quadrant(), Quadrant::TopLeft);
        assert_eq!(children[1].quadrant(), Quadrant::TopRight);
        assert_eq!(children[2].quadrant(), Quadrant::BottomLeft);
        assert_eq!(children[3].quadrant(), Quadrant::BottomRight);
        assert!(children[3].quadrant().is_right() && children[3].quadrant().is_bottom());
    }

    #[test]
    fn test_point_child_is_child_of_point_parent() {
        let point = MercatorPoint::new(1_523_456.7, 5_987_654.3);
        for zoom in 1..20 {
            let child = TileCoord::containing(point, zoom);
            let parent = TileCoord::containing(point, zoom - 1);
            assert_eq!(child.parent(), Some(parent));
        }
    }

    #[test]
    fn test_flip_y() {
        assert_eq!(flip_y(0, 3), 7);
        assert_eq!(flip_y(7, 3), 0);
        assert_eq!(flip_y(flip_y(5, 10), 10), 5);
    }
}
