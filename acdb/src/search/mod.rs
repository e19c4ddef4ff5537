//! Bounding-box queries over the tile store.
//!
//! Boxes are resolved to the overlapping tiles (edges inclusive), candidates
//! are collected from those tiles and filtered to the box itself.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::AcdbResult;
use crate::model::{LastUpdateInfo, MapIcon, Marker, MarkerId, MarkerType};
use crate::store::TileStore;
use crate::tile::{tiles_overlapping, BoundingBox, GeoPoint, TileXY};

/// Marker summary returned by name searches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchMarker {
    pub id: MarkerId,
    pub name: String,
    pub marker_type: MarkerType,
    pub map_icon: MapIcon,
    pub position: GeoPoint,
}

impl From<&Marker> for SearchMarker {
    fn from(marker: &Marker) -> Self {
        Self {
            id: marker.id,
            name: marker.name.clone(),
            marker_type: marker.marker_type,
            map_icon: marker.map_icon,
            position: marker.position,
        }
    }
}

/// Spatial queries against a shared store.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    store: Arc<TileStore>,
}

impl SpatialIndex {
    pub fn new(store: Arc<TileStore>) -> Self {
        Self { store }
    }

    /// Last-update records of the defined tiles overlapping the box.
    ///
    /// Degenerate or inverted boxes are `InvalidBoundingBox`; boxes outside
    /// the grid give an empty map.
    pub fn tiles_last_modified(
        &self,
        south: f64,
        west: f64,
        north: f64,
        east: f64,
    ) -> AcdbResult<BTreeMap<TileXY, LastUpdateInfo>> {
        let bbox = BoundingBox::new(south, west, north, east)?;
        Ok(self.store.tiles_last_modified(&bbox))
    }

    /// Markers inside the box whose name contains `name`, ignoring case.
    ///
    /// An empty or absent `name` matches every marker. Results are ordered by
    /// case-folded name, then id, and cut to `max_results`.
    pub fn search_markers_by_name(
        &self,
        name: Option<&str>,
        south: f64,
        west: f64,
        north: f64,
        east: f64,
        max_results: usize,
    ) -> AcdbResult<Vec<SearchMarker>> {
        let bbox = BoundingBox::new(south, west, north, east)?;
        let needle = name
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty());

        let tiles = tiles_overlapping(&bbox);
        let mut hits: Vec<(String, SearchMarker)> = Vec::new();
        self.store.scan_tiles(&tiles, |_, data| {
            for marker in data.markers.values() {
                if !bbox.contains(&marker.position) {
                    continue;
                }
                let folded = marker.name.to_lowercase();
                if needle.as_deref().is_some_and(|n| !folded.contains(n)) {
                    continue;
                }
                hits.push((folded, SearchMarker::from(marker)));
            }
        });

        hits.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.id.cmp(&b.1.id)));
        let total = hits.len();
        let results: Vec<SearchMarker> = hits
            .into_iter()
            .take(max_results)
            .map(|(_, marker)| marker)
            .collect();

        debug!(
            tiles = tiles.len(),
            matched = total,
            returned = results.len(),
            "Marker search"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AcdbError;
    use chrono::{TimeZone, Utc};

    fn marker(id: MarkerId, name: &str, latitude: f64, longitude: f64) -> Marker {
        Marker {
            id,
            marker_type: MarkerType::Anchorage,
            name: name.to_string(),
            position: GeoPoint::new(latitude, longitude),
            map_icon: MapIcon::Anchorage,
            attributes: Default::default(),
            last_modified: Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn index_with(markers: Vec<Marker>) -> SpatialIndex {
        let store = Arc::new(TileStore::in_memory());
        for m in markers {
            let tile = m.tile();
            store
                .write(&[tile], &[], &[], |txn| {
                    txn.tile_mut(tile).markers.insert(m.id, m);
                    Ok(())
                })
                .unwrap();
        }
        SpatialIndex::new(store)
    }

    #[test]
    fn test_name_filter_is_case_insensitive_substring() {
        let index = index_with(vec![
            marker(1, "Spa Creek", 38.97, -76.48),
            marker(2, "Back Creek", 38.96, -76.47),
            marker(3, "Whitehall Bay", 39.0, -76.43),
        ]);

        let results = index
            .search_markers_by_name(Some("CREEK"), 38.0, -77.0, 40.0, -76.0, 10)
            .unwrap();
        let ids: Vec<_> = results.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_empty_name_matches_all() {
        let index = index_with(vec![
            marker(1, "A", 38.97, -76.48),
            marker(2, "B", 38.96, -76.47),
        ]);
        for name in [None, Some(""), Some("   ")] {
            let results = index
                .search_markers_by_name(name, 38.0, -77.0, 40.0, -76.0, 10)
                .unwrap();
            assert_eq!(results.len(), 2);
        }
    }

    #[test]
    fn test_filters_to_box_and_caps() {
        let index = index_with(vec![
            marker(1, "Inside one", 38.97, -76.48),
            marker(2, "Inside two", 38.96, -76.47),
            // Same tile, outside the query box
            marker(3, "Outside", 36.0, -80.0),
        ]);

        let results = index
            .search_markers_by_name(None, 38.0, -77.0, 40.0, -76.0, 1)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);

        let none = index
            .search_markers_by_name(None, 38.0, -77.0, 40.0, -76.0, 0)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_ties_ordered_by_id() {
        let index = index_with(vec![
            marker(9, "Same", 38.97, -76.48),
            marker(4, "same", 38.96, -76.47),
        ]);
        let results = index
            .search_markers_by_name(None, 38.0, -77.0, 40.0, -76.0, 10)
            .unwrap();
        assert_eq!(results.iter().map(|m| m.id).collect::<Vec<_>>(), vec![4, 9]);
    }

    #[test]
    fn test_degenerate_box_rejected() {
        let index = index_with(vec![]);
        assert!(matches!(
            index.search_markers_by_name(None, 10.0, 0.0, 10.0, 5.0, 10),
            Err(AcdbError::InvalidBoundingBox { .. })
        ));
        assert!(matches!(
            index.tiles_last_modified(10.0, 5.0, 20.0, 0.0),
            Err(AcdbError::InvalidBoundingBox { .. })
        ));
    }

    #[test]
    fn test_box_outside_grid_is_empty() {
        let index = index_with(vec![marker(1, "A", 38.97, -76.48)]);
        let result = index.tiles_last_modified(95.0, 0.0, 100.0, 10.0).unwrap();
        assert!(result.is_empty());
    }
}
