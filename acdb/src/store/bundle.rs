//! Tile bundle files consumed by `install_tile`.
//!
//! A bundle is a JSON document, optionally gzip-compressed:
//!
//! ```json
//! {
//!   "version": "2.0.1.4",
//!   "tileX": 3, "tileY": 4,
//!   "markersLastModified": "2021-05-01T12:00:00Z",
//!   "reviewsLastModified": "2021-05-02T08:00:00Z",
//!   "pointsOfInterest": [ ... ],
//!   "reviews": [ ... ]
//! }
//! ```

use std::fs;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use serde::Deserialize;
use tracing::debug;

use crate::error::{AcdbError, AcdbResult};
use crate::model::{DatabaseVersion, LastUpdateInfo, Marker, Review};
use crate::tile::TileXY;
use crate::wire::{MarkerChange, MarkerRecord, ReviewChange, ReviewRecord};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBundle {
    version: String,
    tile_x: Option<i32>,
    tile_y: Option<i32>,
    markers_last_modified: Option<DateTime<Utc>>,
    reviews_last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    points_of_interest: Vec<MarkerRecord>,
    #[serde(default)]
    reviews: Vec<ReviewRecord>,
}

/// Validated bundle contents for one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileBundle {
    pub version: DatabaseVersion,
    pub markers: Vec<Marker>,
    pub reviews: Vec<Review>,
    pub last_update: LastUpdateInfo,
}

impl TileBundle {
    /// Read and validate the bundle at `path` for installation into `tile`.
    ///
    /// Every failure (I/O, decompression, JSON, field validation, a marker
    /// outside the target tile) is reported as `InstallFailure`.
    pub fn load(path: &Path, tile: TileXY) -> AcdbResult<Self> {
        let bytes = fs::read(path).map_err(|e| AcdbError::install(path, e.to_string()))?;
        Self::from_bytes(&bytes, tile).map_err(|reason| AcdbError::install(path, reason))
    }

    fn from_bytes(bytes: &[u8], tile: TileXY) -> Result<Self, String> {
        let json = decompress(bytes)?;
        let raw: RawBundle =
            serde_json::from_slice(&json).map_err(|e| format!("invalid bundle JSON: {}", e))?;

        if let (Some(x), Some(y)) = (raw.tile_x, raw.tile_y) {
            if (x, y) != (i32::from(tile.x()), i32::from(tile.y())) {
                return Err(format!("bundle is for tile ({}, {}), not {}", x, y, tile));
            }
        }

        let version: DatabaseVersion = raw.version.parse().map_err(|e| format!("{}", e))?;

        let mut markers = Vec::with_capacity(raw.points_of_interest.len());
        for record in raw.points_of_interest {
            match record.into_change().map_err(|e| e.to_string())? {
                MarkerChange::Upsert(marker) => {
                    if marker.tile() != tile {
                        return Err(format!(
                            "marker {} at ({}, {}) belongs to tile {}",
                            marker.id,
                            marker.position.latitude,
                            marker.position.longitude,
                            marker.tile()
                        ));
                    }
                    markers.push(marker);
                }
                MarkerChange::Delete { id, .. } => {
                    debug!(marker_id = id, "Skipping deleted marker in bundle");
                }
            }
        }

        let mut reviews = Vec::with_capacity(raw.reviews.len());
        for record in raw.reviews {
            match record.into_change().map_err(|e| e.to_string())? {
                ReviewChange::Upsert(review) => reviews.push(review),
                ReviewChange::Delete { id, .. } => {
                    debug!(review_id = id, "Skipping deleted review in bundle");
                }
            }
        }

        Ok(Self {
            version,
            markers,
            reviews,
            last_update: LastUpdateInfo {
                marker_last_update: raw.markers_last_modified,
                review_last_update: raw.reviews_last_modified,
            },
        })
    }
}

fn decompress(bytes: &[u8]) -> Result<Vec<u8>, String> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Ok(bytes.to_vec());
    }
    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|e| format!("gzip decode failed: {}", e))?;
    Ok(out)
}
