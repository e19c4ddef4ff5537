//! Tile grid value types: tile addresses, geographic points and boxes.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AcdbError, AcdbResult};

/// Number of tiles along each axis of the grid.
pub const GRID_SIZE: u8 = 16;

/// Total number of tiles in the grid.
pub const TILE_COUNT: usize = GRID_SIZE as usize * GRID_SIZE as usize;

/// Southern edge of the grid extent.
pub const MIN_LAT: f64 = -90.0;

/// Northern edge of the grid extent.
pub const MAX_LAT: f64 = 90.0;

/// Western edge of the grid extent.
pub const MIN_LON: f64 = -180.0;

/// Eastern edge of the grid extent.
pub const MAX_LON: f64 = 180.0;

/// Longitude span of one tile in degrees.
pub const TILE_WIDTH_DEG: f64 = (MAX_LON - MIN_LON) / GRID_SIZE as f64;

/// Latitude span of one tile in degrees.
pub const TILE_HEIGHT_DEG: f64 = (MAX_LAT - MIN_LAT) / GRID_SIZE as f64;

/// Address of one cell of the 16×16 tile grid.
///
/// `x` grows eastward from −180° and `y` grows northward from −90°. Both axes
/// are guaranteed to be in `0..16`; the only way to build a `TileXY` from
/// untrusted input is [`TileXY::new`], which rejects anything else.
///
/// Tiles order by their row-major index (`y`, then `x`). Code that needs to
/// lock several tiles at once relies on this ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileXY {
    x: u8,
    y: u8,
}

impl TileXY {
    /// Create a tile address, validating both axes.
    ///
    /// # Example
    ///
    /// ```
    /// use acdb::tile::TileXY;
    ///
    /// let tile = TileXY::new(3, 4).unwrap();
    /// assert_eq!((tile.x(), tile.y()), (3, 4));
    /// assert!(TileXY::new(16, 0).is_err());
    /// ```
    pub fn new(tile_x: i32, tile_y: i32) -> AcdbResult<Self> {
        let range = 0..GRID_SIZE as i32;
        if !range.contains(&tile_x) || !range.contains(&tile_y) {
            return Err(AcdbError::InvalidTileCoordinate { tile_x, tile_y });
        }
        Ok(Self {
            x: tile_x as u8,
            y: tile_y as u8,
        })
    }

    /// Build from a row-major index (`0..TILE_COUNT`).
    pub(crate) fn from_index(index: usize) -> Self {
        debug_assert!(index < TILE_COUNT);
        Self {
            x: (index % GRID_SIZE as usize) as u8,
            y: (index / GRID_SIZE as usize) as u8,
        }
    }

    /// Row-major index into a `TILE_COUNT` sized table.
    #[inline]
    pub fn index(&self) -> usize {
        self.y as usize * GRID_SIZE as usize + self.x as usize
    }

    #[inline]
    pub fn x(&self) -> u8 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> u8 {
        self.y
    }

    /// Iterate over every tile of the grid in index order.
    pub fn all() -> impl Iterator<Item = TileXY> {
        (0..TILE_COUNT).map(TileXY::from_index)
    }

    /// Geographic footprint of this tile (edges inclusive).
    pub fn bounds(&self) -> BoundingBox {
        let west = MIN_LON + self.x as f64 * TILE_WIDTH_DEG;
        let south = MIN_LAT + self.y as f64 * TILE_HEIGHT_DEG;
        BoundingBox {
            south,
            west,
            north: south + TILE_HEIGHT_DEG,
            east: west + TILE_WIDTH_DEG,
        }
    }
}

impl Ord for TileXY {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index().cmp(&other.index())
    }
}

impl PartialOrd for TileXY {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TileXY {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True if the point lies inside the grid extent.
    pub fn is_valid(&self) -> bool {
        (MIN_LAT..=MAX_LAT).contains(&self.latitude)
            && (MIN_LON..=MAX_LON).contains(&self.longitude)
    }
}

/// Geographic query box in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Create a bounding box, rejecting degenerate and inverted boxes.
    ///
    /// A box needs `south < north` and `west < east`; a zero-height or
    /// zero-width box is an error, as is any NaN edge. Boxes crossing the
    /// antimeridian must be split by the caller.
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> AcdbResult<Self> {
        // Negated comparisons so NaN edges are rejected too.
        if !(south < north) || !(west < east) {
            return Err(AcdbError::InvalidBoundingBox {
                south,
                west,
                north,
                east,
            });
        }
        Ok(Self {
            south,
            west,
            north,
            east,
        })
    }

    /// The whole grid extent.
    pub fn world() -> Self {
        Self {
            south: MIN_LAT,
            west: MIN_LON,
            north: MAX_LAT,
            east: MAX_LON,
        }
    }

    /// Inclusive containment: points on an edge are inside.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.south..=self.north).contains(&point.latitude)
            && (self.west..=self.east).contains(&point.longitude)
    }

    /// Inclusive intersection: boxes sharing only an edge intersect.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.south <= other.north
            && other.south <= self.north
            && self.west <= other.east
            && other.west <= self.east
    }
}
