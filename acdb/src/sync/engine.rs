//! Applies validated response payloads to the tile store.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{AcdbError, AcdbResult};
use crate::model::{MapIcon, Marker, MarkerId, Review, ReviewId};
use crate::store::{TileStore, TileTransaction};
use crate::tile::TileXY;
use crate::wire::{MarkerChange, ReviewChange};

use super::payload::{
    CreateMarkerResponse, MoveMarkerResponse, SyncMarkersResponse, SyncReviewsResponse,
    VoteForReviewResponse, WebViewResponse,
};

/// Turns response bodies fetched by the host into store mutations.
///
/// Every operation merges by entity id, so replaying a payload (duplicate or
/// out-of-order delivery) leaves the store as a single application would.
/// Each `process_*` method parses and validates first; the matching `apply_*`
/// method takes an already-parsed payload.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    store: Arc<TileStore>,
}

impl SyncEngine {
    pub fn new(store: Arc<TileStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<TileStore> {
        &self.store
    }

    /// Insert the created marker into the tile its position maps to.
    pub fn process_create_marker_response(&self, json: &str) -> AcdbResult<MarkerId> {
        self.apply_create_marker(CreateMarkerResponse::parse(json)?)
    }

    pub fn apply_create_marker(&self, response: CreateMarkerResponse) -> AcdbResult<MarkerId> {
        let marker = response.marker;
        let id = marker.id;
        let tile = marker.tile();

        self.store.write(&[tile], &[id], &[], |txn| {
            upsert_marker(txn, marker);
            Ok(())
        })?;

        info!(marker_id = id, tile = %tile, "Marker created");
        Ok(id)
    }

    /// Update a marker's position, relocating it if its tile changes.
    ///
    /// Neither tile's marker timestamp moves, and the marker's reviews stay in
    /// the tile they were created in.
    pub fn process_move_marker_response(&self, json: &str) -> AcdbResult<()> {
        self.apply_move_marker(MoveMarkerResponse::parse(json)?)
    }

    pub fn apply_move_marker(&self, response: MoveMarkerResponse) -> AcdbResult<()> {
        let id = response.id;
        let target = crate::tile::tile_for_position(&response.position);

        let from = self.store.write(&[target], &[id], &[], |txn| {
            let from = txn.find_marker(id).ok_or(AcdbError::UnknownMarker(id))?;
            let Some(mut marker) = txn.tile_mut(from).markers.remove(&id) else {
                return Err(AcdbError::UnknownMarker(id));
            };

            marker.position = response.position;
            marker.last_modified = response.last_modified;
            if let Some(name) = response.name {
                marker.name = name;
            }
            if let Some(marker_type) = response.marker_type {
                marker.marker_type = marker_type;
            }
            let is_sponsor = response
                .is_sponsor
                .unwrap_or_else(|| is_sponsor_icon(marker.map_icon));
            marker.map_icon = MapIcon::for_marker(marker.marker_type, is_sponsor);

            txn.tile_mut(target).markers.insert(id, marker);
            Ok(from)
        })?;

        if from != target {
            info!(marker_id = id, from = %from, to = %target, "Marker relocated");
        } else {
            debug!(marker_id = id, tile = %target, "Marker moved within tile");
        }
        Ok(())
    }

    /// Apply a page of marker changes for `tile`. Returns the entry count.
    ///
    /// The tile's marker timestamp advances to the newest entry time unless
    /// it is already at or past it. Entries are applied either way.
    pub fn process_sync_markers_response(&self, json: &str, tile: TileXY) -> AcdbResult<usize> {
        self.apply_sync_markers(SyncMarkersResponse::parse(json)?, tile)
    }

    pub fn apply_sync_markers(&self, response: SyncMarkersResponse, tile: TileXY) -> AcdbResult<usize> {
        let count = response.changes.len();
        let version = response.version();

        let mut anchors = vec![tile];
        anchors.extend(response.changes.iter().filter_map(|change| match change {
            MarkerChange::Upsert(marker) => Some(marker.tile()),
            MarkerChange::Delete { .. } => None,
        }));
        let ids: Vec<MarkerId> = response.changes.iter().map(MarkerChange::id).collect();

        let advanced = self.store.write(&anchors, &ids, &[], |txn| {
            for change in response.changes {
                match change {
                    MarkerChange::Upsert(marker) => upsert_marker(txn, marker),
                    MarkerChange::Delete { id, .. } => remove_marker(txn, id),
                }
            }
            Ok(version.is_some_and(|ts| txn.tile_mut(tile).last_update.advance_markers(ts)))
        })?;

        info!(tile = %tile, count, advanced, "Marker sync applied");
        Ok(count)
    }

    /// Apply a page of review changes for `tile`. Returns the entry count.
    ///
    /// Same timestamp rule as markers, on the review timestamp.
    pub fn process_sync_reviews_response(&self, json: &str, tile: TileXY) -> AcdbResult<usize> {
        self.apply_sync_reviews(SyncReviewsResponse::parse(json)?, tile)
    }

    pub fn apply_sync_reviews(&self, response: SyncReviewsResponse, tile: TileXY) -> AcdbResult<usize> {
        let count = response.changes.len();
        let version = response.version();
        let ids: Vec<ReviewId> = response.changes.iter().map(ReviewChange::id).collect();
        // Owners are locked too so a concurrent marker delete cannot miss these reviews.
        let owners: Vec<MarkerId> = response
            .changes
            .iter()
            .filter_map(|change| match change {
                ReviewChange::Upsert(review) => Some(review.marker_id),
                ReviewChange::Delete { .. } => None,
            })
            .collect();

        let advanced = self.store.write(&[tile], &owners, &ids, |txn| {
            for change in response.changes {
                match change {
                    ReviewChange::Upsert(review) => upsert_review(txn, review, tile),
                    ReviewChange::Delete { id, .. } => remove_review(txn, id),
                }
            }
            Ok(version.is_some_and(|ts| txn.tile_mut(tile).last_update.advance_reviews(ts)))
        })?;

        info!(tile = %tile, count, advanced, "Review sync applied");
        Ok(count)
    }

    /// Update a review's vote count and the captain's vote state.
    pub fn process_vote_for_review_response(&self, json: &str) -> AcdbResult<()> {
        self.apply_vote_for_review(VoteForReviewResponse::parse(json)?)
    }

    pub fn apply_vote_for_review(&self, response: VoteForReviewResponse) -> AcdbResult<()> {
        let id = response.review_id;
        self.store.write(&[], &[], &[id], |txn| {
            let tile = txn.find_review(id).ok_or(AcdbError::UnknownReview(id))?;
            if let Some(review) = txn.tile_mut(tile).reviews.get_mut(&id) {
                review.votes = response.votes;
                review.is_voted = response.is_voted;
            }
            Ok(())
        })?;
        debug!(review_id = id, votes = response.votes, "Review vote applied");
        Ok(())
    }

    /// Apply the result posted by an edit web view.
    ///
    /// Result types the engine does not apply are logged and returned as
    /// `UnhandledResponseKind` with the store untouched; callers may treat
    /// that as non-fatal (see [`AcdbError::is_recoverable`]).
    pub fn process_web_view_response(&self, json: &str) -> AcdbResult<()> {
        self.apply_web_view(WebViewResponse::parse(json)?)
    }

    pub fn apply_web_view(&self, response: WebViewResponse) -> AcdbResult<()> {
        match response {
            WebViewResponse::MarkerSaved(marker) => {
                let id = marker.id;
                let tile = marker.tile();
                self.store.write(&[tile], &[id], &[], |txn| {
                    upsert_marker(txn, marker);
                    Ok(())
                })?;
                info!(marker_id = id, tile = %tile, "Marker saved from web view");
            }
            WebViewResponse::MarkerDeleted(id) => {
                let Some(tile) = self.store.marker_tile(id) else {
                    debug!(marker_id = id, "Deleted marker not stored");
                    return Ok(());
                };
                self.store.write(&[tile], &[id], &[], |txn| {
                    remove_marker(txn, id);
                    Ok(())
                })?;
                info!(marker_id = id, tile = %tile, "Marker deleted from web view");
            }
            WebViewResponse::ReviewSaved(review) => {
                let (id, marker_id) = (review.id, review.marker_id);
                self.store.write(&[], &[marker_id], &[id], |txn| {
                    let tile = txn
                        .find_review(id)
                        .or_else(|| txn.find_marker(marker_id))
                        .ok_or(AcdbError::UnknownMarker(marker_id))?;
                    upsert_review(txn, review, tile);
                    Ok(())
                })?;
                info!(review_id = id, marker_id, "Review saved from web view");
            }
            WebViewResponse::ReviewDeleted(id) => {
                self.store.write(&[], &[], &[id], |txn| {
                    remove_review(txn, id);
                    Ok(())
                })?;
                info!(review_id = id, "Review deleted from web view");
            }
            WebViewResponse::Unhandled(kind) => {
                warn!(kind = %kind, "Unhandled web view response");
                return Err(AcdbError::UnhandledResponseKind(kind));
            }
        }
        Ok(())
    }
}

fn is_sponsor_icon(icon: MapIcon) -> bool {
    matches!(
        icon,
        MapIcon::AnchorageSponsor | MapIcon::BusinessSponsor | MapIcon::MarinaSponsor
    )
}

/// Store `marker` in its tile, removing it from any other locked tile.
fn upsert_marker(txn: &mut TileTransaction<'_>, marker: Marker) {
    let target = marker.tile();
    if let Some(previous) = txn.find_marker(marker.id).filter(|t| *t != target) {
        txn.tile_mut(previous).markers.remove(&marker.id);
        debug!(marker_id = marker.id, from = %previous, to = %target, "Marker relocated by update");
    }
    txn.tile_mut(target).markers.insert(marker.id, marker);
}

/// Remove a marker and its reviews from the locked tiles.
fn remove_marker(txn: &mut TileTransaction<'_>, id: MarkerId) {
    if let Some(tile) = txn.find_marker(id) {
        txn.tile_mut(tile).markers.remove(&id);
    }
    let holding: Vec<TileXY> = txn
        .locked_tiles()
        .filter(|tile| {
            txn.tile(*tile)
                .is_some_and(|data| data.reviews.values().any(|r| r.marker_id == id))
        })
        .collect();
    for tile in holding {
        txn.tile_mut(tile).remove_reviews_of(id);
    }
}

/// Store `review` in `tile`, removing it from any other locked tile.
fn upsert_review(txn: &mut TileTransaction<'_>, review: Review, tile: TileXY) {
    if let Some(previous) = txn.find_review(review.id).filter(|t| *t != tile) {
        txn.tile_mut(previous).reviews.remove(&review.id);
    }
    txn.tile_mut(tile).reviews.insert(review.id, review);
}

fn remove_review(txn: &mut TileTransaction<'_>, id: ReviewId) {
    if let Some(tile) = txn.find_review(id) {
        txn.tile_mut(tile).reviews.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MarkerType;

    fn engine() -> SyncEngine {
        SyncEngine::new(Arc::new(TileStore::in_memory()))
    }

    fn tile(x: i32, y: i32) -> TileXY {
        TileXY::new(x, y).unwrap()
    }

    // Tile (3, 4): lon [-112.5, -90), lat [-45, -33.75).
    const CREATE: &str = r#"{"id": 1, "poiType": "Marina", "name": "Harbor",
        "mapLocation": {"latitude": -40.0, "longitude": -100.0},
        "dateLastModified": "2021-05-01T00:00:00Z", "isSponsor": true}"#;

    const REVIEWS: &str = r#"{"reviews": [
        {"id": 10, "poiId": 1, "rating": 4, "votes": 2, "dateLastModified": "2021-05-02T00:00:00Z"}
    ]}"#;

    #[test]
    fn test_create_marker() {
        let engine = engine();
        assert_eq!(engine.process_create_marker_response(CREATE).unwrap(), 1);
        assert_eq!(engine.store().marker_tile(1), Some(tile(3, 4)));
        // Creation does not count as a sync
        assert!(engine.store().tile_last_modified(tile(3, 4)).is_unset());
    }

    #[test]
    fn test_create_marker_malformed() {
        let err = engine()
            .process_create_marker_response(r#"{"id": 1}"#)
            .unwrap_err();
        assert!(matches!(err, AcdbError::MalformedResponse(_)));
    }

    #[test]
    fn test_move_marker_relocates_without_reviews() {
        let engine = engine();
        engine.process_create_marker_response(CREATE).unwrap();
        engine.process_sync_reviews_response(REVIEWS, tile(3, 4)).unwrap();

        // (5, 6): lon [-67.5, -45), lat [-22.5, -11.25)
        engine
            .process_move_marker_response(
                r#"{"id": 1, "mapLocation": {"latitude": -20.0, "longitude": -50.0},
                    "dateLastModified": "2021-06-01T00:00:00Z"}"#,
            )
            .unwrap();

        let store = engine.store();
        assert_eq!(store.marker_tile(1), Some(tile(5, 6)));
        assert!(store.markers_in_tile(tile(3, 4)).is_empty());
        assert_eq!(store.reviews_in_tile(tile(3, 4)).len(), 1);
        assert!(store.tile_last_modified(tile(5, 6)).is_unset());

        let marker = store.marker(1).unwrap();
        assert_eq!(marker.map_icon, MapIcon::MarinaSponsor);
        assert_eq!(marker.name, "Harbor");
    }

    #[test]
    fn test_delete_after_move_removes_reviews_in_old_tile() {
        let engine = engine();
        engine.process_create_marker_response(CREATE).unwrap();
        engine.process_sync_reviews_response(REVIEWS, tile(3, 4)).unwrap();
        engine
            .process_move_marker_response(
                r#"{"id": 1, "mapLocation": {"latitude": -20.0, "longitude": -50.0},
                    "dateLastModified": "2021-06-01T00:00:00Z"}"#,
            )
            .unwrap();
        assert_eq!(engine.store().reviews_of_marker(1), vec![10]);

        engine
            .process_web_view_response(r#"{"resultType": "DELETE", "data": {"id": 1}}"#)
            .unwrap();

        let store = engine.store();
        assert!(store.marker(1).is_none());
        assert!(store.review(10).is_none());
        assert!(store.reviews_in_tile(tile(3, 4)).is_empty());
        assert!(store.reviews_of_marker(1).is_empty());
    }

    #[test]
    fn test_sync_delete_after_move_removes_reviews_in_old_tile() {
        let engine = engine();
        engine.process_create_marker_response(CREATE).unwrap();
        engine.process_sync_reviews_response(REVIEWS, tile(3, 4)).unwrap();
        engine
            .process_move_marker_response(
                r#"{"id": 1, "mapLocation": {"latitude": -20.0, "longitude": -50.0},
                    "dateLastModified": "2021-06-01T00:00:00Z"}"#,
            )
            .unwrap();

        engine
            .process_sync_markers_response(
                r#"{"pointsOfInterest": [
                    {"id": 1, "isDeleted": true, "dateLastModified": "2021-07-01T00:00:00Z"}
                ]}"#,
                tile(5, 6),
            )
            .unwrap();

        assert!(engine.store().review(10).is_none());
        assert!(engine.store().reviews_in_tile(tile(3, 4)).is_empty());
    }

    #[test]
    fn test_move_with_unrecognized_type_keeps_type() {
        let engine = engine();
        engine.process_create_marker_response(CREATE).unwrap();
        engine
            .process_move_marker_response(
                r#"{"id": 1, "poiType": "Lighthouse",
                    "mapLocation": {"latitude": -40.0, "longitude": -100.0},
                    "dateLastModified": "2021-06-01T00:00:00Z"}"#,
            )
            .unwrap();

        let marker = engine.store().marker(1).unwrap();
        assert_eq!(marker.marker_type, MarkerType::Marina);
        assert_eq!(marker.map_icon, MapIcon::MarinaSponsor);
    }

    #[test]
    fn test_move_unknown_marker() {
        let err = engine()
            .process_move_marker_response(
                r#"{"id": 77, "mapLocation": {"latitude": 0.0, "longitude": 0.0},
                    "dateLastModified": "2021-06-01T00:00:00Z"}"#,
            )
            .unwrap_err();
        assert!(matches!(err, AcdbError::UnknownMarker(77)));
    }

    #[test]
    fn test_sync_markers_deletes_with_reviews() {
        let engine = engine();
        engine.process_create_marker_response(CREATE).unwrap();
        engine.process_sync_reviews_response(REVIEWS, tile(3, 4)).unwrap();

        let count = engine
            .process_sync_markers_response(
                r#"{"pointsOfInterest": [
                    {"id": 1, "isDeleted": true, "dateLastModified": "2021-07-01T00:00:00Z"}
                ]}"#,
                tile(3, 4),
            )
            .unwrap();

        assert_eq!(count, 1);
        assert!(engine.store().marker(1).is_none());
        assert!(engine.store().review(10).is_none());
        assert!(engine
            .store()
            .tile_last_modified(tile(3, 4))
            .marker_last_update
            .is_some());
    }

    #[test]
    fn test_sync_markers_entry_outside_scope_goes_to_own_tile() {
        let engine = engine();
        engine
            .process_sync_markers_response(
                r#"{"pointsOfInterest": [
                    {"id": 5, "poiType": "Hazard",
                     "mapLocation": {"latitude": -20.0, "longitude": -50.0},
                     "dateLastModified": "2021-07-01T00:00:00Z"}
                ]}"#,
                tile(3, 4),
            )
            .unwrap();

        assert_eq!(engine.store().marker_tile(5), Some(tile(5, 6)));
        assert_eq!(
            engine.store().marker(5).map(|m| m.marker_type),
            Some(MarkerType::Hazard)
        );
    }

    #[test]
    fn test_empty_sync_batch_keeps_timestamp_unset() {
        let engine = engine();
        let count = engine
            .process_sync_markers_response(r#"{"pointsOfInterest": []}"#, tile(3, 4))
            .unwrap();
        assert_eq!(count, 0);
        assert!(engine.store().tile_last_modified(tile(3, 4)).is_unset());
    }

    #[test]
    fn test_vote() {
        let engine = engine();
        engine.process_sync_reviews_response(REVIEWS, tile(3, 4)).unwrap();
        engine
            .process_vote_for_review_response(r#"{"id": 10, "votes": 3, "isVoted": true}"#)
            .unwrap();

        let review = engine.store().review(10).unwrap();
        assert_eq!(review.votes, 3);
        assert!(review.is_voted);
    }

    #[test]
    fn test_vote_unknown_review() {
        let err = engine()
            .process_vote_for_review_response(r#"{"id": 10, "votes": 3, "isVoted": true}"#)
            .unwrap_err();
        assert!(matches!(err, AcdbError::UnknownReview(10)));
    }

    #[test]
    fn test_web_view_review_goes_to_marker_tile() {
        let engine = engine();
        engine.process_create_marker_response(CREATE).unwrap();
        engine
            .process_web_view_response(
                r#"{"resultType": "REVIEWSUCCESS", "data":
                    {"id": 11, "poiId": 1, "rating": 5, "dateLastModified": "2021-05-03T00:00:00Z"}}"#,
            )
            .unwrap();
        assert_eq!(engine.store().reviews_in_tile(tile(3, 4)).len(), 1);
    }

    #[test]
    fn test_web_view_review_for_unknown_marker() {
        let err = engine()
            .process_web_view_response(
                r#"{"resultType": "REVIEWSUCCESS", "data":
                    {"id": 11, "poiId": 1, "dateLastModified": "2021-05-03T00:00:00Z"}}"#,
            )
            .unwrap_err();
        assert!(matches!(err, AcdbError::UnknownMarker(1)));
    }

    #[test]
    fn test_web_view_delete_is_idempotent() {
        let engine = engine();
        engine.process_create_marker_response(CREATE).unwrap();
        let delete = r#"{"resultType": "DELETE", "data": {"id": 1}}"#;
        engine.process_web_view_response(delete).unwrap();
        engine.process_web_view_response(delete).unwrap();
        assert!(engine.store().marker(1).is_none());
    }

    #[test]
    fn test_web_view_unhandled_kind_leaves_store() {
        let engine = engine();
        engine.process_create_marker_response(CREATE).unwrap();
        let err = engine
            .process_web_view_response(r#"{"resultType": "actionComplete"}"#)
            .unwrap_err();
        assert!(err.is_recoverable());
        assert!(engine.store().marker(1).is_some());
    }
}
