//! Staged multi-tile mutation.

use std::collections::BTreeMap;

use parking_lot::RwLockWriteGuard;
use tracing::warn;

use crate::error::AcdbResult;
use crate::model::{MarkerId, ReviewId};
use crate::tile::TileXY;

use super::tile_data::TileData;
use super::TileStore;

/// Write access to a locked set of tiles.
///
/// Changes are made on copies. [`TileTransaction::commit`] persists the copies
/// and only then swaps them in; dropping the transaction discards them.
pub(crate) struct TileTransaction<'a> {
    guards: BTreeMap<TileXY, RwLockWriteGuard<'a, TileData>>,
    staged: BTreeMap<TileXY, TileData>,
}

impl<'a> TileTransaction<'a> {
    pub(super) fn new(guards: BTreeMap<TileXY, RwLockWriteGuard<'a, TileData>>) -> Self {
        Self {
            guards,
            staged: BTreeMap::new(),
        }
    }

    /// Current (possibly staged) contents of a locked tile.
    pub fn tile(&self, tile: TileXY) -> Option<&TileData> {
        self.staged
            .get(&tile)
            .or_else(|| self.guards.get(&tile).map(|guard| &**guard))
    }

    /// Mutable staged copy of a locked tile.
    ///
    /// # Panics
    ///
    /// Panics if `tile` was not locked when the transaction began. Callers
    /// lock every tile they can reach before opening the transaction.
    pub fn tile_mut(&mut self, tile: TileXY) -> &mut TileData {
        let guards = &self.guards;
        self.staged.entry(tile).or_insert_with(|| {
            guards
                .get(&tile)
                .map(|guard| (**guard).clone())
                .unwrap_or_else(|| panic!("tile {} was not locked by this transaction", tile))
        })
    }

    /// Locked tile currently holding the marker.
    pub fn find_marker(&self, id: MarkerId) -> Option<TileXY> {
        self.guards
            .keys()
            .copied()
            .find(|tile| self.tile(*tile).is_some_and(|d| d.markers.contains_key(&id)))
    }

    /// Locked tile currently holding the review.
    pub fn find_review(&self, id: ReviewId) -> Option<TileXY> {
        self.guards
            .keys()
            .copied()
            .find(|tile| self.tile(*tile).is_some_and(|d| d.reviews.contains_key(&id)))
    }

    pub fn locked_tiles(&self) -> impl Iterator<Item = TileXY> + '_ {
        self.guards.keys().copied()
    }

    /// Persist staged tiles, then publish them and update the id indexes.
    ///
    /// If any tile fails to persist, tiles already written are restored from
    /// the unchanged in-memory state and nothing is published.
    pub(super) fn commit(self, store: &TileStore) -> AcdbResult<()> {
        let Self { mut guards, staged } = self;

        let mut written: Vec<TileXY> = Vec::with_capacity(staged.len());
        for (tile, data) in &staged {
            if let Err(e) = store.backend.save_tile(*tile, data) {
                for done in &written {
                    if let Some(original) = guards.get(done) {
                        if let Err(restore) = store.backend.save_tile(*done, original) {
                            warn!(tile = %done, error = %restore, "Failed to restore tile after aborted commit");
                        }
                    }
                }
                return Err(e);
            }
            written.push(*tile);
        }

        // Removals for every tile first, so an id moving between two staged
        // tiles ends up owned by its new tile whatever the tile order.
        for (tile, data) in &staged {
            let Some(guard) = guards.get(tile) else {
                continue;
            };
            for id in guard.markers.keys() {
                if !data.markers.contains_key(id) {
                    store.marker_tiles.remove_if(id, |_, owner| owner == tile);
                }
            }
            for (id, review) in &guard.reviews {
                if data.reviews.contains_key(id) {
                    continue;
                }
                if store.review_tiles.remove_if(id, |_, owner| owner == tile).is_some() {
                    store.unlink_review(review.marker_id, *id);
                }
            }
        }

        for (tile, data) in &staged {
            for id in data.markers.keys() {
                store.marker_tiles.insert(*id, *tile);
            }
            for (id, review) in &data.reviews {
                let old_owner = guards
                    .get(tile)
                    .and_then(|guard| guard.reviews.get(id))
                    .map(|old| old.marker_id)
                    .filter(|owner| *owner != review.marker_id);
                if let Some(owner) = old_owner {
                    store.unlink_review(owner, *id);
                }
                store.review_tiles.insert(*id, *tile);
                store.link_review(review.marker_id, *id);
            }
        }

        for (tile, data) in staged {
            if let Some(guard) = guards.get_mut(&tile) {
                **guard = data;
            }
        }
        Ok(())
    }
}
