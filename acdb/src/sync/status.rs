//! Sync status exchange: which tiles to ask about and what to do with the
//! answers.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AcdbResult;
use crate::model::LastUpdateInfo;
use crate::store::TileStore;
use crate::tile::{BoundingBox, TileXY};

/// Per-tile entry of a sync status request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusRequest {
    pub tile_x: i32,
    pub tile_y: i32,
    pub poi_date_last_modified: Option<String>,
    pub review_date_last_modified: Option<String>,
}

impl SyncStatusRequest {
    pub fn new(tile: TileXY, info: &LastUpdateInfo) -> Self {
        Self {
            tile_x: i32::from(tile.x()),
            tile_y: i32::from(tile.y()),
            poi_date_last_modified: info.marker_last_update_string(),
            review_date_last_modified: info.review_last_update_string(),
        }
    }

    /// One request per defined tile overlapping any of `boxes`.
    ///
    /// Tiles covered by several boxes appear once. An empty result means the
    /// store has nothing for the area yet and the caller should ask the
    /// service which tiles exist instead.
    pub fn for_boxes(store: &TileStore, boxes: &[BoundingBox]) -> Vec<Self> {
        let mut tiles: BTreeMap<TileXY, LastUpdateInfo> = BTreeMap::new();
        for bbox in boxes {
            tiles.extend(store.tiles_last_modified(bbox));
        }
        tiles
            .iter()
            .map(|(tile, info)| Self::new(*tile, info))
            .collect()
    }
}

/// Action the service asks for on one entity class of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncStatusType {
    /// Too far behind; download a full export.
    Export,
    /// Request incremental changes.
    Sync,
    /// The tile no longer has data of this class.
    Delete,
    None,
}

/// Per-tile entry of a sync status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusResponse {
    pub tile_x: i32,
    pub tile_y: i32,
    pub poi_update_type: SyncStatusType,
    pub review_update_type: SyncStatusType,
}

/// Follow-up work derived from a sync status response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub export: BTreeSet<TileXY>,
    pub sync_markers: BTreeSet<TileXY>,
    pub sync_reviews: BTreeSet<TileXY>,
    pub deleted_markers: BTreeSet<TileXY>,
    pub deleted_reviews: BTreeSet<TileXY>,
}

impl SyncPlan {
    /// Sort responses into work sets, applying `Delete` outcomes right away.
    ///
    /// A marker delete removes the whole tile; a review delete removes only
    /// its reviews. Coordinates outside the grid fail the whole plan before
    /// any delete is applied.
    pub fn from_responses(responses: &[SyncStatusResponse], store: &TileStore) -> AcdbResult<Self> {
        let entries = responses
            .iter()
            .map(|r| TileXY::new(r.tile_x, r.tile_y).map(|tile| (tile, r)))
            .collect::<AcdbResult<Vec<_>>>()?;

        let mut plan = Self::default();
        for (tile, response) in entries {
            match response.poi_update_type {
                SyncStatusType::Export => {
                    plan.export.insert(tile);
                }
                SyncStatusType::Sync => {
                    plan.sync_markers.insert(tile);
                }
                SyncStatusType::Delete => {
                    store.delete_tile(tile)?;
                    plan.deleted_markers.insert(tile);
                }
                SyncStatusType::None => {}
            }
            match response.review_update_type {
                SyncStatusType::Export => {
                    plan.export.insert(tile);
                }
                SyncStatusType::Sync => {
                    plan.sync_reviews.insert(tile);
                }
                SyncStatusType::Delete => {
                    store.delete_tile_reviews(tile)?;
                    plan.deleted_reviews.insert(tile);
                }
                SyncStatusType::None => {}
            }
        }

        info!(
            export = plan.export.len(),
            sync_markers = plan.sync_markers.len(),
            sync_reviews = plan.sync_reviews.len(),
            deleted_markers = plan.deleted_markers.len(),
            deleted_reviews = plan.deleted_reviews.len(),
            "Sync plan built"
        );
        Ok(plan)
    }

    /// Switch a tile from incremental sync to export, e.g. after the service
    /// refused an incremental request.
    pub fn require_export(&mut self, tile: TileXY) {
        self.sync_markers.remove(&tile);
        self.sync_reviews.remove(&tile);
        if self.export.insert(tile) {
            debug!(tile = %tile, "Tile escalated to export");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.export.is_empty() && self.sync_markers.is_empty() && self.sync_reviews.is_empty()
    }
}

/// Whether another page should be requested after a sync batch.
///
/// True when the batch was full and moved the tile's timestamp; a full batch
/// that left it in place would return the same page again.
pub fn needs_follow_up(
    processed: usize,
    page_limit: usize,
    before: Option<DateTime<Utc>>,
    after: Option<DateTime<Utc>>,
) -> bool {
    page_limit > 0 && processed >= page_limit && after.is_some() && after != before
}
