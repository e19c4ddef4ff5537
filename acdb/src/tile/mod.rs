//! Tile addressing for the 16×16 geographic grid.
//!
//! Markers and reviews are partitioned by the tile that contains the marker's
//! position. This module converts positions to tiles and resolves bounding
//! boxes to the set of tiles whose footprint they touch.

mod types;

pub use types::{
    BoundingBox, GeoPoint, TileXY, GRID_SIZE, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON, TILE_COUNT,
    TILE_HEIGHT_DEG, TILE_WIDTH_DEG,
};

const LAST: i64 = GRID_SIZE as i64 - 1;

/// Returns the tile owning a position.
///
/// Positions on a shared edge belong to the tile east/north of the edge;
/// the grid's far edges (longitude 180°, latitude 90°) fold into tile 15.
/// Out-of-extent positions are clamped to the nearest border tile, callers
/// validate positions before storing them.
///
/// # Example
///
/// ```
/// use acdb::tile::{tile_for_position, GeoPoint};
///
/// // Chesapeake Bay
/// let tile = tile_for_position(&GeoPoint::new(38.98, -76.48));
/// assert_eq!((tile.x(), tile.y()), (4, 11));
/// ```
#[inline]
pub fn tile_for_position(point: &GeoPoint) -> TileXY {
    let x = ((point.longitude - MIN_LON) / TILE_WIDTH_DEG).floor() as i64;
    let y = ((point.latitude - MIN_LAT) / TILE_HEIGHT_DEG).floor() as i64;
    TileXY::from_index((y.clamp(0, LAST) * GRID_SIZE as i64 + x.clamp(0, LAST)) as usize)
}

/// Returns every tile whose footprint intersects the box, edges inclusive.
///
/// A box that only touches a tile boundary includes the tiles on both sides.
/// Boxes entirely outside the grid extent resolve to no tiles. Tiles are
/// returned in index order.
pub fn tiles_overlapping(bbox: &BoundingBox) -> Vec<TileXY> {
    let Some((x_lo, x_hi)) = axis_span(bbox.west, bbox.east, MIN_LON, MAX_LON, TILE_WIDTH_DEG)
    else {
        return Vec::new();
    };
    let Some((y_lo, y_hi)) = axis_span(bbox.south, bbox.north, MIN_LAT, MAX_LAT, TILE_HEIGHT_DEG)
    else {
        return Vec::new();
    };

    let mut tiles = Vec::with_capacity(((x_hi - x_lo + 1) * (y_hi - y_lo + 1)) as usize);
    for y in y_lo..=y_hi {
        for x in x_lo..=x_hi {
            tiles.push(TileXY::from_index((y * GRID_SIZE as i64 + x) as usize));
        }
    }
    tiles
}

/// Inclusive range of cell indices touched by `[lo, hi]` on one axis.
fn axis_span(lo: f64, hi: f64, min: f64, max: f64, step: f64) -> Option<(i64, i64)> {
    if hi < min || lo > max {
        return None;
    }
    // Clamp before converting so huge or infinite edges cannot overflow.
    let (lo, hi) = (lo.max(min), hi.min(max));
    // A lower edge exactly on a boundary also touches the cell before it.
    let first = (((lo - min) / step).ceil() as i64 - 1).clamp(0, LAST);
    let last = (((hi - min) / step).floor() as i64).clamp(0, LAST);
    (first <= last).then_some((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(x: i32, y: i32) -> TileXY {
        TileXY::new(x, y).unwrap()
    }

    #[test]
    fn test_tile_for_position_origin() {
        assert_eq!(tile_for_position(&GeoPoint::new(-90.0, -180.0)), tile(0, 0));
        assert_eq!(tile_for_position(&GeoPoint::new(0.0, 0.0)), tile(8, 8));
        assert_eq!(tile_for_position(&GeoPoint::new(-0.0001, -0.0001)), tile(7, 7));
    }

    #[test]
    fn test_tile_for_position_far_edges_fold() {
        assert_eq!(tile_for_position(&GeoPoint::new(90.0, 180.0)), tile(15, 15));
    }

    #[test]
    fn test_tile_for_position_shared_edge_goes_east() {
        // 22.5°W boundary between x=6 and x=7
        let edge = GeoPoint::new(5.0, -22.5);
        assert_eq!(tile_for_position(&edge).x(), 7);
    }

    #[test]
    fn test_tiles_overlapping_single_tile_interior() {
        let bbox = BoundingBox::new(1.0, 1.0, 2.0, 2.0).unwrap();
        assert_eq!(tiles_overlapping(&bbox), vec![tile(8, 8)]);
    }

    #[test]
    fn test_tiles_overlapping_includes_edge_neighbours() {
        // Exactly the footprint of (8, 8): all eight neighbours touch it.
        let bbox = tile(8, 8).bounds();
        let tiles = tiles_overlapping(&bbox);
        assert_eq!(tiles.len(), 9);
        assert!(tiles.contains(&tile(7, 7)));
        assert!(tiles.contains(&tile(9, 9)));
    }

    #[test]
    fn test_tiles_overlapping_world() {
        assert_eq!(tiles_overlapping(&BoundingBox::world()).len(), TILE_COUNT);
    }

    #[test]
    fn test_tiles_overlapping_outside_extent() {
        let bbox = BoundingBox::new(95.0, 0.0, 100.0, 10.0).unwrap();
        assert!(tiles_overlapping(&bbox).is_empty());
        let bbox = BoundingBox::new(0.0, -300.0, 10.0, -200.0).unwrap();
        assert!(tiles_overlapping(&bbox).is_empty());
    }

    #[test]
    fn test_tiles_overlapping_partially_outside_clamps() {
        let bbox = BoundingBox::new(80.0, 170.0, 120.0, 200.0).unwrap();
        assert_eq!(tiles_overlapping(&bbox), vec![tile(15, 15)]);
    }

    #[test]
    fn test_tiles_overlapping_huge_edges() {
        let bbox = BoundingBox::new(-1e300, -1e300, 10.0, 10.0).unwrap();
        let tiles = tiles_overlapping(&bbox);
        // x 0..=8, y 0..=8
        assert_eq!(tiles.len(), 81);
        assert_eq!(tiles.first(), Some(&tile(0, 0)));
        assert_eq!(tiles.last(), Some(&tile(8, 8)));

        let bbox = BoundingBox::new(f64::NEG_INFINITY, 170.0, 1e300, f64::INFINITY).unwrap();
        assert_eq!(tiles_overlapping(&bbox).len(), 16);
    }

    #[test]
    fn test_tiles_overlapping_is_sorted() {
        let bbox = BoundingBox::new(-30.0, -50.0, 30.0, 50.0).unwrap();
        let tiles = tiles_overlapping(&bbox);
        let mut sorted = tiles.clone();
        sorted.sort();
        assert_eq!(tiles, sorted);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_owning_tile_contains_point(
                lat in -90.0..=90.0_f64,
                lon in -180.0..=180.0_f64
            ) {
                let point = GeoPoint::new(lat, lon);
                let tile = tile_for_position(&point);
                prop_assert!(
                    tile.bounds().contains(&point),
                    "{:?} not inside footprint of {}", point, tile
                );
            }

            #[test]
            fn test_box_around_point_covers_owner(
                lat in -89.0..89.0_f64,
                lon in -179.0..179.0_f64,
                half in 0.0001..1.0_f64
            ) {
                let point = GeoPoint::new(lat, lon);
                let bbox = BoundingBox::new(lat - half, lon - half, lat + half, lon + half).unwrap();
                prop_assert!(tiles_overlapping(&bbox).contains(&tile_for_position(&point)));
            }

            #[test]
            fn test_overlapping_tiles_all_intersect(
                south in -1e6..1e6_f64,
                west in -1e6..1e6_f64,
                height in 0.001..2e6_f64,
                width in 0.001..2e6_f64
            ) {
                let bbox = BoundingBox::new(south, west, south + height, west + width).unwrap();
                let tiles = tiles_overlapping(&bbox);
                for tile in &tiles {
                    prop_assert!(tile.bounds().intersects(&bbox));
                }
                // and no intersecting tile was missed
                let expected = TileXY::all().filter(|t| t.bounds().intersects(&bbox)).count();
                prop_assert_eq!(tiles.len(), expected);
            }
        }
    }
}
