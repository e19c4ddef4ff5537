//! Contents of a single tile.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{LastUpdateInfo, Marker, MarkerId, Review, ReviewId};

/// Markers, reviews and sync bookkeeping owned by one tile.
///
/// Maps are ordered by id so a tile serializes identically for identical
/// contents, which keeps repeated syncs byte-stable on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TileData {
    #[serde(default)]
    pub markers: BTreeMap<MarkerId, Marker>,
    #[serde(default)]
    pub reviews: BTreeMap<ReviewId, Review>,
    #[serde(default)]
    pub last_update: LastUpdateInfo,
}

impl TileData {
    /// True if the tile holds nothing worth persisting.
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty() && self.reviews.is_empty() && self.last_update.is_unset()
    }

    /// Remove every review of the given marker. Returns how many were removed.
    pub fn remove_reviews_of(&mut self, marker_id: MarkerId) -> usize {
        let before = self.reviews.len();
        self.reviews.retain(|_, review| review.marker_id != marker_id);
        before - self.reviews.len()
    }
}
