//! Process-wide sharing of loaded grids.
//!
//! Models that reference the same grid file, or that embed identical grids,
//! share one `Arc<Grid>`. Loads are single-flight per path: concurrent callers
//! asking for a path that is still loading block on the same load.

use crate::codec;
use crate::error::Result;
use crate::grid::Grid;
use crate::types::CacheStats;
use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

static GLOBAL: Lazy<GridCache> = Lazy::new(GridCache::new);

type Slot = Arc<OnceCell<Arc<Grid>>>;

/// Grids keyed by id, plus the path each was loaded from.
#[derive(Debug, Default)]
pub struct GridCache {
    by_path: Mutex<HashMap<PathBuf, Slot>>,
    by_id: Mutex<HashMap<String, Arc<Grid>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl GridCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache used when models are loaded with grid reuse enabled.
    pub fn global() -> &'static GridCache {
        &GLOBAL
    }

    /// Return the grid stored at `path`, loading it on first request.
    pub fn get_or_load(&self, path: impl AsRef<Path>) -> Result<Arc<Grid>> {
        let path = path.as_ref();
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let slot: Slot = lock(&self.by_path).entry(key.clone()).or_default().clone();

        let mut loaded = false;
        let grid = slot.get_or_try_init(|| {
            loaded = true;
            codec::read_grid_file(path).map(|grid| self.share(grid))
        })?;

        if loaded {
            self.misses.fetch_add(1, Ordering::Relaxed);
            info!(path = %key.display(), grid_id = %grid.grid_id(), "Grid cache miss");
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(path = %key.display(), grid_id = %grid.grid_id(), "Grid cache hit");
        }
        Ok(Arc::clone(grid))
    }

    /// Intern an already-built grid: if a grid with the same id is cached,
    /// that instance is returned and `grid` dropped.
    pub fn share(&self, grid: Grid) -> Arc<Grid> {
        let mut by_id = lock(&self.by_id);
        if let Some(existing) = by_id.get(grid.grid_id()) {
            debug!(grid_id = %grid.grid_id(), "Grid already cached");
            return Arc::clone(existing);
        }
        let grid = Arc::new(grid);
        by_id.insert(grid.grid_id().to_string(), Arc::clone(&grid));
        grid
    }

    /// Cached grid with the given id.
    pub fn get(&self, grid_id: &str) -> Option<Arc<Grid>> {
        lock(&self.by_id).get(grid_id).cloned()
    }

    pub fn contains(&self, grid_id: &str) -> bool {
        lock(&self.by_id).contains_key(grid_id)
    }

    /// Number of distinct grids held.
    pub fn size(&self) -> usize {
        lock(&self.by_id).len()
    }

    /// Drop every cached grid. Grids still referenced elsewhere stay alive.
    pub fn clear(&self) {
        let paths = {
            let mut by_path = lock(&self.by_path);
            let n = by_path.len();
            by_path.clear();
            n
        };
        let grids = {
            let mut by_id = lock(&self.by_id);
            let n = by_id.len();
            by_id.clear();
            n
        };
        info!(paths, grids, "Grid cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let paths = lock(&self.by_path)
            .values()
            .filter(|slot| slot.get().is_some())
            .count();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.size(),
            paths,
        }
    }
}
