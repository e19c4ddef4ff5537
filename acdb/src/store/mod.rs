//! Tile-partitioned marker and review storage.
//!
//! # Locking
//!
//! Every tile sits behind its own `RwLock`, so writers on different tiles
//! never wait for each other and a reader sees a tile either before or after
//! a mutation. Mutations touching several tiles (a marker moving between
//! tiles, a sync batch with stray entries) lock all of them in tile-index
//! order before changing anything.
//!
//! Writers also hold a lock stripe for every marker and review id they
//! touch, taken before any tile lock. The id indexes only gain or move an
//! entry under its stripe, so two writers upserting the same id are
//! serialized and the second sees where the first put it.
//!
//! A store-wide `barrier` is held shared by every operation and exclusively
//! by [`TileStore::delete_database`], so a wipe is never observed half done.
//! Public methods take the barrier exactly once and never call each other
//! while holding it. Lock order: barrier, version, id stripes, tiles.

mod backend;
mod bundle;
mod tile_data;
mod transaction;

pub use backend::{DiskBackend, MemoryBackend, TileBackend};
pub use bundle::TileBundle;
pub use tile_data::TileData;
pub(crate) use transaction::TileTransaction;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard};
use tracing::{info, warn};

use crate::error::AcdbResult;
use crate::model::{DatabaseVersion, LastUpdateInfo, Marker, MarkerId, Review, ReviewId};
use crate::tile::{tiles_overlapping, BoundingBox, TileXY, TILE_COUNT};

/// Outcome of a successful [`TileStore::install_tile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallSummary {
    pub tile: TileXY,
    pub version: DatabaseVersion,
    pub markers: usize,
    pub reviews: usize,
}

/// Number of id lock stripes, split evenly between markers and reviews.
const ID_STRIPES: usize = 64;

/// The tile store.
pub struct TileStore {
    barrier: RwLock<()>,
    tiles: Vec<RwLock<TileData>>,
    id_stripes: Vec<Mutex<()>>,
    /// Owning tile of every stored marker, kept in step with `tiles`.
    marker_tiles: DashMap<MarkerId, TileXY>,
    review_tiles: DashMap<ReviewId, TileXY>,
    /// Reviews stored for each marker, wherever they live.
    marker_reviews: DashMap<MarkerId, BTreeSet<ReviewId>>,
    version: RwLock<DatabaseVersion>,
    backend: Box<dyn TileBackend>,
}

impl std::fmt::Debug for TileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileStore")
            .field("backend", &self.backend.name())
            .field("version", &*self.version.read())
            .field("markers", &self.marker_tiles.len())
            .field("reviews", &self.review_tiles.len())
            .finish()
    }
}

impl TileStore {
    /// Create an empty store that persists nothing.
    pub fn in_memory() -> Self {
        Self::empty(Box::new(MemoryBackend))
    }

    /// Open a store, loading every tile the back end holds.
    pub fn open(backend: impl TileBackend + 'static) -> AcdbResult<Self> {
        let store = Self::empty(Box::new(backend));

        let mut loaded = 0usize;
        for tile in TileXY::all() {
            let Some(data) = store.backend.load_tile(tile)? else {
                continue;
            };
            for id in data.markers.keys() {
                store.marker_tiles.insert(*id, tile);
            }
            for (id, review) in &data.reviews {
                store.review_tiles.insert(*id, tile);
                store.link_review(review.marker_id, *id);
            }
            *store.tiles[tile.index()].write() = data;
            loaded += 1;
        }

        if let Some(version) = store.backend.load_version()? {
            *store.version.write() = version;
        }

        info!(
            backend = store.backend.name(),
            tiles = loaded,
            markers = store.marker_tiles.len(),
            reviews = store.review_tiles.len(),
            version = %store.version(),
            "Tile store opened"
        );
        Ok(store)
    }

    fn empty(backend: Box<dyn TileBackend>) -> Self {
        Self {
            barrier: RwLock::new(()),
            tiles: (0..TILE_COUNT).map(|_| RwLock::new(TileData::default())).collect(),
            id_stripes: (0..ID_STRIPES).map(|_| Mutex::new(())).collect(),
            marker_tiles: DashMap::new(),
            review_tiles: DashMap::new(),
            marker_reviews: DashMap::new(),
            version: RwLock::new(DatabaseVersion::ZERO),
            backend,
        }
    }

    /// Content version of the installed data; `0.0.0.0` until first install.
    pub fn version(&self) -> DatabaseVersion {
        let _barrier = self.barrier.read();
        *self.version.read()
    }

    /// Erase everything, in memory and in the back end.
    ///
    /// Waits for all in-flight operations and blocks new ones until done.
    pub fn delete_database(&self) -> AcdbResult<()> {
        let _barrier = self.barrier.write();

        self.backend.clear()?;
        for tile in &self.tiles {
            *tile.write() = TileData::default();
        }
        self.marker_tiles.clear();
        self.review_tiles.clear();
        self.marker_reviews.clear();
        *self.version.write() = DatabaseVersion::ZERO;

        info!("Database deleted");
        Ok(())
    }

    /// Remove all markers and reviews of a tile and clear its last update.
    pub fn delete_tile(&self, tile: TileXY) -> AcdbResult<()> {
        let (markers, reviews) = self.write(&[tile], &[], &[], |txn| {
            let data = txn.tile_mut(tile);
            let counts = (data.markers.len(), data.reviews.len());
            *data = TileData::default();
            Ok(counts)
        })?;
        info!(tile = %tile, markers, reviews, "Tile deleted");
        Ok(())
    }

    /// Remove the reviews of a tile and clear its review last update.
    ///
    /// Markers and the marker last update are untouched.
    pub fn delete_tile_reviews(&self, tile: TileXY) -> AcdbResult<()> {
        let reviews = self.write(&[tile], &[], &[], |txn| {
            let data = txn.tile_mut(tile);
            let count = data.reviews.len();
            data.reviews.clear();
            data.last_update.review_last_update = None;
            Ok(count)
        })?;
        info!(tile = %tile, reviews, "Tile reviews deleted");
        Ok(())
    }

    /// Last-update record of a tile; unset if the tile was never synced.
    pub fn tile_last_modified(&self, tile: TileXY) -> LastUpdateInfo {
        self.read_tile(tile, |data| data.last_update)
    }

    /// Last-update records of the defined tiles overlapping `bbox`.
    ///
    /// A tile is defined if it holds data or has a set timestamp. All tiles are
    /// read under one barrier acquisition so a concurrent wipe is either fully
    /// visible or not at all.
    pub fn tiles_last_modified(&self, bbox: &BoundingBox) -> BTreeMap<TileXY, LastUpdateInfo> {
        let mut result = BTreeMap::new();
        self.scan_tiles(&tiles_overlapping(bbox), |tile, data| {
            if !data.is_empty() {
                result.insert(tile, data.last_update);
            }
        });
        result
    }

    /// Merge the bundle at `path` into `tile`.
    ///
    /// Bundle records overwrite same-id records; other records stay. Last
    /// update timestamps only move forward. On any failure the tile is left as
    /// it was.
    pub fn install_tile(&self, path: &Path, tile: TileXY) -> AcdbResult<InstallSummary> {
        let bundle = TileBundle::load(path, tile)?;
        let summary = InstallSummary {
            tile,
            version: bundle.version,
            markers: bundle.markers.len(),
            reviews: bundle.reviews.len(),
        };

        // Review owners are striped too so a concurrent marker delete sees them
        let mut marker_ids: Vec<MarkerId> = bundle.markers.iter().map(|m| m.id).collect();
        marker_ids.extend(bundle.reviews.iter().map(|r| r.marker_id));
        let review_ids: Vec<ReviewId> = bundle.reviews.iter().map(|r| r.id).collect();

        let barrier = self.barrier.read();
        // Held across both writes so concurrent installs cannot interleave them
        let mut version = self.version.write();
        let prior_version = *version;
        self.backend.save_version(bundle.version)?;

        let result = self.transaction(&barrier, &[tile], &marker_ids, &review_ids, |txn| {
            for marker in bundle.markers {
                if let Some(previous) = txn.find_marker(marker.id).filter(|t| *t != tile) {
                    txn.tile_mut(previous).markers.remove(&marker.id);
                }
                txn.tile_mut(tile).markers.insert(marker.id, marker);
            }
            for review in bundle.reviews {
                if let Some(previous) = txn.find_review(review.id).filter(|t| *t != tile) {
                    txn.tile_mut(previous).reviews.remove(&review.id);
                }
                txn.tile_mut(tile).reviews.insert(review.id, review);
            }

            let data = txn.tile_mut(tile);
            if let Some(ts) = bundle.last_update.marker_last_update {
                data.last_update.advance_markers(ts);
            }
            if let Some(ts) = bundle.last_update.review_last_update {
                data.last_update.advance_reviews(ts);
            }
            Ok(())
        });

        if let Err(e) = result {
            if let Err(restore) = self.backend.save_version(prior_version) {
                warn!(version = %prior_version, error = %restore, "Failed to restore version after aborted install");
            }
            return Err(e);
        }
        *version = bundle.version;
        drop(version);
        drop(barrier);

        info!(
            tile = %tile,
            path = %path.display(),
            version = %summary.version,
            markers = summary.markers,
            reviews = summary.reviews,
            "Tile installed"
        );
        Ok(summary)
    }

    pub fn marker(&self, id: MarkerId) -> Option<Marker> {
        let _barrier = self.barrier.read();
        let tile = *self.marker_tiles.get(&id)?;
        self.tiles[tile.index()].read().markers.get(&id).cloned()
    }

    pub fn review(&self, id: ReviewId) -> Option<Review> {
        let _barrier = self.barrier.read();
        let tile = *self.review_tiles.get(&id)?;
        self.tiles[tile.index()].read().reviews.get(&id).cloned()
    }

    /// Owning tile of a marker, if stored.
    pub fn marker_tile(&self, id: MarkerId) -> Option<TileXY> {
        self.marker_tiles.get(&id).map(|entry| *entry)
    }

    /// Copy of a tile's full contents, taken under one lock.
    pub fn tile_snapshot(&self, tile: TileXY) -> TileData {
        self.read_tile(tile, TileData::clone)
    }

    /// Markers stored in a tile, ordered by id.
    pub fn markers_in_tile(&self, tile: TileXY) -> Vec<Marker> {
        self.read_tile(tile, |data| data.markers.values().cloned().collect())
    }

    /// Reviews stored in a tile, ordered by id.
    pub fn reviews_in_tile(&self, tile: TileXY) -> Vec<Review> {
        self.read_tile(tile, |data| data.reviews.values().cloned().collect())
    }

    /// Number of stored markers and reviews.
    pub fn counts(&self) -> (usize, usize) {
        (self.marker_tiles.len(), self.review_tiles.len())
    }

    /// Run `f` on a tile under its read lock.
    pub(crate) fn read_tile<R>(&self, tile: TileXY, f: impl FnOnce(&TileData) -> R) -> R {
        let _barrier = self.barrier.read();
        let data = self.tiles[tile.index()].read();
        f(&data)
    }

    /// Visit tiles in order, each under its read lock.
    pub(crate) fn scan_tiles(&self, tiles: &[TileXY], mut f: impl FnMut(TileXY, &TileData)) {
        let _barrier = self.barrier.read();
        for tile in tiles {
            let data = self.tiles[tile.index()].read();
            f(*tile, &data);
        }
    }

    /// Run a mutation over `anchors` plus the tiles currently holding the
    /// given ids, then commit it.
    pub(crate) fn write<R>(
        &self,
        anchors: &[TileXY],
        marker_ids: &[MarkerId],
        review_ids: &[ReviewId],
        f: impl FnOnce(&mut TileTransaction<'_>) -> AcdbResult<R>,
    ) -> AcdbResult<R> {
        let barrier = self.barrier.read();
        self.transaction(&barrier, anchors, marker_ids, review_ids, f)
    }

    fn transaction<R>(
        &self,
        _barrier: &RwLockReadGuard<'_, ()>,
        anchors: &[TileXY],
        marker_ids: &[MarkerId],
        review_ids: &[ReviewId],
        f: impl FnOnce(&mut TileTransaction<'_>) -> AcdbResult<R>,
    ) -> AcdbResult<R> {
        let _stripes = self.lock_ids(marker_ids, review_ids);

        // With the stripes held no other writer can add or move these ids;
        // whole-tile deletes may still remove them, which only over-locks.
        let mut wanted: BTreeSet<TileXY> = anchors.iter().copied().collect();
        for id in marker_ids {
            wanted.extend(self.marker_tile(*id));
            if let Some(reviews) = self.marker_reviews.get(id) {
                wanted.extend(reviews.iter().filter_map(|r| self.review_tile(*r)));
            }
        }
        wanted.extend(review_ids.iter().filter_map(|id| self.review_tile(*id)));

        let guards: BTreeMap<_, _> = wanted
            .iter()
            .map(|tile| (*tile, self.tiles[tile.index()].write()))
            .collect();

        let mut txn = TileTransaction::new(guards);
        let result = f(&mut txn)?;
        txn.commit(self)?;
        Ok(result)
    }

    /// Lock the stripes covering `marker_ids` and `review_ids`, in index order.
    fn lock_ids(&self, marker_ids: &[MarkerId], review_ids: &[ReviewId]) -> Vec<MutexGuard<'_, ()>> {
        let half = (ID_STRIPES / 2) as u64;
        let stripes: BTreeSet<usize> = marker_ids
            .iter()
            .map(|id| (id % half) as usize * 2)
            .chain(review_ids.iter().map(|id| (id % half) as usize * 2 + 1))
            .collect();
        stripes.iter().map(|i| self.id_stripes[*i].lock()).collect()
    }

    fn review_tile(&self, id: ReviewId) -> Option<TileXY> {
        self.review_tiles.get(&id).map(|entry| *entry)
    }

    /// Record that `review_id` belongs to `marker_id`.
    pub(crate) fn link_review(&self, marker_id: MarkerId, review_id: ReviewId) {
        self.marker_reviews
            .entry(marker_id)
            .or_default()
            .insert(review_id);
    }

    /// Drop `review_id` from the reviews recorded for `marker_id`.
    pub(crate) fn unlink_review(&self, marker_id: MarkerId, review_id: ReviewId) {
        if let Some(mut reviews) = self.marker_reviews.get_mut(&marker_id) {
            reviews.remove(&review_id);
        }
        self.marker_reviews
            .remove_if(&marker_id, |_, reviews| reviews.is_empty());
    }

    /// Ids of the reviews stored for a marker, across all tiles.
    pub fn reviews_of_marker(&self, marker_id: MarkerId) -> Vec<ReviewId> {
        self.marker_reviews
            .get(&marker_id)
            .map(|reviews| reviews.iter().copied().collect())
            .unwrap_or_default()
    }
}
