// src/map/maintenance.rs
//! Housekeeping over a layer directory: statistics, pruning, renumbering

use crate::error::{Result, TileError};
use crate::map::projection::flip_y;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Deepest zoom whose rows still fit an `i64`
const MAX_RENUMBER_ZOOM: u32 = 62;

/// One file found in a `{zoom}/{x}/{y}.{ext}` tree
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidEntry {
    pub zoom: u32,
    pub x: i64,
    pub y: i64,
    /// Everything after the first dot, e.g. `png` or `png.aux.xml`
    pub suffix: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct PyramidStats {
    pub tiles: usize,
    pub bytes: u64,
    pub tiles_per_zoom: BTreeMap<u32, usize>,
}

impl PyramidStats {
    pub fn size_mb(&self) -> f64 {
        self.bytes as f64 / 1_048_576.0
    }
}

fn ensure_dir(root: &Path) -> Result<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(TileError::Other(format!(
            "Invalid path {} - must be a directory",
            root.display()
        )))
    }
}

/// List every tile file below `root`; names that are not numeric are skipped
pub fn walk_pyramid(root: &Path) -> Result<Vec<PyramidEntry>> {
    ensure_dir(root)?;
    let mut entries = Vec::new();

    for zoom_dir in std::fs::read_dir(root)? {
        let zoom_dir = zoom_dir?;
        let Some(zoom) = parse_name::<u32>(&zoom_dir.path()) else {
            continue;
        };
        if !zoom_dir.file_type()?.is_dir() {
            continue;
        }

        for x_dir in std::fs::read_dir(zoom_dir.path())? {
            let x_dir = x_dir?;
            let Some(x) = parse_name::<i64>(&x_dir.path()) else {
                continue;
            };
            if !x_dir.file_type()?.is_dir() {
                continue;
            }

            for file in std::fs::read_dir(x_dir.path())? {
                let file = file?;
                if !file.file_type()?.is_file() {
                    continue;
                }
                let name = file.file_name().to_string_lossy().into_owned();
                let Some((stem, suffix)) = name.split_once('.') else {
                    continue;
                };
                let Ok(y) = stem.parse::<i64>() else {
                    continue;
                };

                entries.push(PyramidEntry {
                    zoom,
                    x,
                    y,
                    suffix: suffix.to_string(),
                    path: file.path(),
                });
            }
        }
    }

    entries.sort_by(|a, b| (a.zoom, a.x, a.y, &a.suffix).cmp(&(b.zoom, b.x, b.y, &b.suffix)));
    Ok(entries)
}

fn parse_name<T: std::str::FromStr>(path: &Path) -> Option<T> {
    path.file_name()?.to_str()?.parse().ok()
}

/// Count tiles and bytes on disk
pub fn pyramid_stats(root: &Path) -> Result<PyramidStats> {
    let mut stats = PyramidStats::default();
    for entry in walk_pyramid(root)? {
        stats.tiles += 1;
        stats.bytes += std::fs::metadata(&entry.path)?.len();
        *stats.tiles_per_zoom.entry(entry.zoom).or_insert(0) += 1;
    }
    Ok(stats)
}

/// Find (and unless `check_only`, delete) PNG tiles with fully transparent pixels.
///
/// Such tiles come from partially covered source imagery and would leave
/// holes when mixed with complete tiles of a neighbouring import.
pub fn remove_incomplete_tiles(root: &Path, check_only: bool) -> Result<Vec<PathBuf>> {
    let mut incomplete = Vec::new();

    for entry in walk_pyramid(root)? {
        if entry.suffix != "png" {
            continue;
        }

        let image = match image::open(&entry.path) {
            Ok(image) => image,
            Err(e) => {
                warn!("Skipping unreadable tile {}: {}", entry.path.display(), e);
                continue;
            }
        };

        if !image.color().has_alpha() {
            continue;
        }

        let has_holes = image.to_rgba8().pixels().any(|p| p.0[3] == 0);
        if !has_holes {
            continue;
        }

        if check_only {
            info!("{} contains transparency and would be removed", entry.path.display());
        } else {
            std::fs::remove_file(&entry.path)?;
            info!("removed incomplete tile {}", entry.path.display());
        }
        incomplete.push(entry.path);
    }

    Ok(incomplete)
}

/// Rename every tile of a TMS-numbered layer to OSM numbering, in place.
///
/// Returns the `(from, to)` pairs. Sidecar files such as `.png.aux.xml`
/// follow their tile. Running it twice restores the original numbering.
/// Files whose zoom or row cannot belong to a valid tile are left alone.
/// If a rename fails, every file already moved is put back before the error
/// is returned.
pub fn tms_to_osm(root: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    let entries = walk_pyramid(root)?;

    let mut plan = Vec::with_capacity(entries.len());
    for entry in &entries {
        if entry.zoom > MAX_RENUMBER_ZOOM || !(0..1_i64 << entry.zoom).contains(&entry.y) {
            warn!("Skipping {}: not a tile at zoom {}", entry.path.display(), entry.zoom);
            continue;
        }
        let y = flip_y(entry.y, entry.zoom);
        let target = entry
            .path
            .with_file_name(format!("{}.{}", y, entry.suffix));
        plan.push((entry.path.clone(), target));
    }

    // Two passes through temporary names so swapped pairs (y <-> 2^z - 1 - y) do not collide
    let mut staged = Vec::with_capacity(plan.len());
    for (from, to) in plan {
        if from == to {
            continue;
        }
        let name = from
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temporary = from.with_file_name(format!(".renaming-{}", name));
        if let Err(e) = std::fs::rename(&from, &temporary) {
            roll_back(&[], &staged);
            return Err(e.into());
        }
        staged.push(Staged { from, temporary, to });
    }

    for (position, file) in staged.iter().enumerate() {
        if let Err(e) = std::fs::rename(&file.temporary, &file.to) {
            error!("Could not rename {} to {}: {}", file.from.display(), file.to.display(), e);
            roll_back(&staged[..position], &staged[position..]);
            return Err(e.into());
        }
        info!("renamed {} to {}", file.from.display(), file.to.display());
    }

    Ok(staged.into_iter().map(|file| (file.from, file.to)).collect())
}

struct Staged {
    from: PathBuf,
    temporary: PathBuf,
    to: PathBuf,
}

/// Undo a partial renumbering: `done` files sit at their target names,
/// `pending` ones under their temporary names
fn roll_back(done: &[Staged], pending: &[Staged]) {
    // Targets may be the original names of pending files, so clear them first
    for file in done {
        if let Err(e) = std::fs::rename(&file.to, &file.temporary) {
            error!("{} left at {}: {}", file.from.display(), file.to.display(), e);
        }
    }
    for file in done.iter().chain(pending) {
        if let Err(e) = std::fs::rename(&file.temporary, &file.from) {
            error!("{} left at {}: {}", file.from.display(), file.temporary.display(), e);
        }
    }
}
