// src/quadtree/store.rs
//! Tile persistence behind a small repository trait

use super::tile::{ScenarioId, Tile, TileId};
use crate::error::{Result, TileError};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Storage consumed by the quadtree index.
///
/// `create_tile` must be a find-or-create on `(scenario, lod, x, y)`: calling
/// it for a key that already exists returns the stored row instead of adding
/// a second one.
pub trait TileRepository: Send + Sync {
    fn find_tile(&self, scenario: ScenarioId, lod: u32, x: i64, y: i64) -> Result<Option<Tile>>;

    /// `parent: None` creates a root that points at itself
    fn create_tile(
        &self,
        scenario: ScenarioId,
        lod: u32,
        x: i64,
        y: i64,
        parent: Option<TileId>,
    ) -> Result<Tile>;
}

type TileKey = (ScenarioId, u32, i64, i64);

#[derive(Debug, Default, Serialize, Deserialize)]
struct Arena {
    tiles: Vec<Tile>,
    #[serde(skip)]
    index: HashMap<TileKey, usize>,
    #[serde(skip)]
    by_id: HashMap<TileId, usize>,
    #[serde(skip)]
    last_id: TileId,
}

impl Arena {
    fn rebuild_index(&mut self) -> Result<()> {
        self.index.clear();
        self.by_id.clear();
        self.last_id = self.tiles.iter().map(|t| t.id).max().unwrap_or(0);
        for (slot, tile) in self.tiles.iter().enumerate() {
            let key = (tile.scenario_id, tile.lod, tile.x, tile.y);
            if self.index.insert(key, slot).is_some() {
                return Err(TileError::Store(format!(
                    "Duplicate tile {:?} in scenario {}",
                    (tile.lod, tile.x, tile.y),
                    tile.scenario_id
                )));
            }
            if self.by_id.insert(tile.id, slot).is_some() {
                return Err(TileError::Store(format!("Duplicate tile id {}", tile.id)));
            }
        }
        Ok(())
    }

    fn by_id(&self, id: TileId) -> Option<&Tile> {
        self.by_id.get(&id).map(|slot| &self.tiles[*slot])
    }

    fn next_id(&mut self) -> TileId {
        self.last_id += 1;
        self.last_id
    }
}

/// In-process tile table with a unique `(scenario, lod, x, y)` index
#[derive(Debug, Default)]
pub struct MemoryTileRepository {
    arena: Mutex<Arena>,
}

impl MemoryTileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot written by [`save`](Self::save); a missing file yields an empty store
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let contents = std::fs::read_to_string(path)?;
        let mut arena: Arena = serde_json::from_str(&contents)?;
        arena.rebuild_index()?;

        Ok(Self {
            arena: Mutex::new(arena),
        })
    }

    /// Write a snapshot; the previous file stays intact until the new one is complete
    pub fn save(&self, path: &Path) -> Result<()> {
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(directory)?;

        let contents = {
            let arena = self.arena.lock();
            serde_json::to_vec_pretty(&*arena)?
        };

        let mut staging = tempfile::Builder::new()
            .prefix(".tiles-")
            .tempfile_in(directory)?;
        staging.write_all(&contents)?;
        staging.as_file().sync_all()?;
        staging.persist(path)?;

        debug!("saved tile store {}", path.display());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.arena.lock().tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All tiles of a scenario ordered by id
    pub fn scenario_tiles(&self, scenario: ScenarioId) -> Vec<Tile> {
        let arena = self.arena.lock();
        let mut tiles: Vec<Tile> = arena
            .tiles
            .iter()
            .filter(|t| t.scenario_id == scenario)
            .cloned()
            .collect();
        tiles.sort_by_key(|t| t.id);
        tiles
    }

    pub fn get(&self, id: TileId) -> Option<Tile> {
        self.arena.lock().by_id(id).cloned()
    }
}

impl TileRepository for MemoryTileRepository {
    fn find_tile(&self, scenario: ScenarioId, lod: u32, x: i64, y: i64) -> Result<Option<Tile>> {
        let arena = self.arena.lock();
        Ok(arena
            .index
            .get(&(scenario, lod, x, y))
            .map(|slot| arena.tiles[*slot].clone()))
    }

    fn create_tile(
        &self,
        scenario: ScenarioId,
        lod: u32,
        x: i64,
        y: i64,
        parent: Option<TileId>,
    ) -> Result<Tile> {
        let mut arena = self.arena.lock();
        let key = (scenario, lod, x, y);

        if let Some(slot) = arena.index.get(&key) {
            return Ok(arena.tiles[*slot].clone());
        }

        if let Some(parent_id) = parent {
            let parent = arena
                .by_id(parent_id)
                .ok_or_else(|| TileError::Store(format!("Unknown parent tile {}", parent_id)))?;
            if parent.scenario_id != scenario || parent.lod + 1 != lod {
                return Err(TileError::Store(format!(
                    "Tile {} (scenario {}, lod {}) cannot parent a lod {} tile in scenario {}",
                    parent.id, parent.scenario_id, parent.lod, lod, scenario
                )));
            }
        }

        let id = arena.next_id();
        let parent_id = parent.unwrap_or(id);

        let tile = Tile {
            id,
            scenario_id: scenario,
            lod,
            x,
            y,
            parent_id,
            created_at: Utc::now(),
        };

        debug!("created tile {} at lod {} ({}, {}) in scenario {}", id, lod, x, y, scenario);
        let slot = arena.tiles.len();
        arena.tiles.push(tile.clone());
        arena.index.insert(key, slot);
        arena.by_id.insert(id, slot);
        Ok(tile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_is_find_or_create() {
        let repo = MemoryTileRepository::new();
        let first = repo.create_tile(1, 0, 0, 0, None).unwrap();
        let second = repo.create_tile(1, 0, 0, 0, None).unwrap();

        assert_eq!(first, second);
        assert!(first.is_root());
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_scenarios_are_separate() {
        let repo = MemoryTileRepository::new();
        let a = repo.create_tile(1, 0, 0, 0, None).unwrap();
        let b = repo.create_tile(2, 0, 0, 0, None).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(repo.find_tile(1, 0, 0, 0).unwrap(), Some(a));
        assert_eq!(repo.find_tile(3, 0, 0, 0).unwrap(), None);
    }

    #[test]
    fn test_rejects_inconsistent_parent() {
        let repo = MemoryTileRepository::new();
        let root = repo.create_tile(1, 0, 0, 0, None).unwrap();

        assert!(repo.create_tile(1, 2, 0, 0, Some(root.id)).is_err());
        assert!(repo.create_tile(2, 1, 0, 0, Some(root.id)).is_err());
        assert!(repo.create_tile(1, 1, 0, 0, Some(999)).is_err());
        assert!(repo.create_tile(1, 1, 1, 0, Some(root.id)).is_ok());
    }

    #[test]
    fn test_snapshot_round_trip_keeps_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store").join("tiles.json");

        let repo = MemoryTileRepository::new();
        let root = repo.create_tile(7, 0, 0, 0, None).unwrap();
        let child = repo.create_tile(7, 1, 1, 0, Some(root.id)).unwrap();
        repo.save(&path).unwrap();

        let restored = MemoryTileRepository::load(&path).unwrap();
        assert_eq!(restored.find_tile(7, 1, 1, 0).unwrap(), Some(child.clone()));
        // Ids keep increasing after a reload
        let next = restored.create_tile(7, 1, 0, 0, Some(root.id)).unwrap();
        assert!(next.id > child.id);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = MemoryTileRepository::load(&dir.path().join("absent.json")).unwrap();
        assert!(repo.is_empty());
    }

    #[test]
    fn test_save_replaces_snapshot_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiles.json");
        std::fs::write(&path, "{\"tiles\": [garbage").unwrap();

        let repo = MemoryTileRepository::new();
        let root = repo.create_tile(3, 0, 0, 0, None).unwrap();
        repo.save(&path).unwrap();
        repo.create_tile(3, 1, 0, 1, Some(root.id)).unwrap();
        repo.save(&path).unwrap();

        let restored = MemoryTileRepository::load(&path).unwrap();
        assert_eq!(restored.len(), 2);

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["tiles.json".to_string()]);
    }

    #[test]
    fn test_get_by_id_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiles.json");

        let repo = MemoryTileRepository::new();
        let a = repo.create_tile(1, 0, 0, 0, None).unwrap();
        let b = repo.create_tile(2, 0, 0, 0, None).unwrap();
        let child = repo.create_tile(2, 1, 1, 1, Some(b.id)).unwrap();
        repo.save(&path).unwrap();

        let restored = MemoryTileRepository::load(&path).unwrap();
        assert_eq!(restored.get(a.id), Some(a));
        assert_eq!(restored.get(child.id), Some(child.clone()));
        assert_eq!(restored.get(child.id + 100), None);
        // Parent lookups go through the same id table
        assert!(restored.create_tile(2, 2, 2, 2, Some(child.id)).is_ok());
    }
}
