//! Marker (point of interest) records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tile::{tile_for_position, GeoPoint, TileXY};

/// Server-assigned marker id.
pub type MarkerId = u64;

/// Kind of point of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MarkerType {
    #[default]
    Unknown,
    Anchorage,
    BoatRamp,
    Bridge,
    Business,
    Dam,
    Ferry,
    Hazard,
    Inlet,
    Lock,
    Marina,
}

impl MarkerType {
    /// Parse the `poiType` string used by the service.
    ///
    /// Matching ignores case and separators (`BoatRamp`, `boat_ramp` and
    /// `Boat Ramp` are the same). Anything unrecognized is `Unknown`.
    pub fn from_wire(value: &str) -> Self {
        let normalized: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "anchorage" => Self::Anchorage,
            "boatramp" => Self::BoatRamp,
            "bridge" => Self::Bridge,
            "business" => Self::Business,
            "dam" => Self::Dam,
            "ferry" => Self::Ferry,
            "hazard" => Self::Hazard,
            "inlet" => Self::Inlet,
            "lock" => Self::Lock,
            "marina" => Self::Marina,
            _ => Self::Unknown,
        }
    }

    /// Get a human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Anchorage => "Anchorage",
            Self::BoatRamp => "Boat Ramp",
            Self::Bridge => "Bridge",
            Self::Business => "Business",
            Self::Dam => "Dam",
            Self::Ferry => "Ferry",
            Self::Hazard => "Hazard",
            Self::Inlet => "Inlet",
            Self::Lock => "Lock",
            Self::Marina => "Marina",
        }
    }
}

impl fmt::Display for MarkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Map icon class used when rendering a marker.
///
/// Sponsored anchorages, businesses and marinas get a distinct icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MapIcon {
    #[default]
    Unknown,
    Anchorage,
    Hazard,
    Marina,
    BoatRamp,
    Business,
    Inlet,
    Bridge,
    Lock,
    Dam,
    Ferry,
    AnchorageSponsor,
    BusinessSponsor,
    MarinaSponsor,
}

impl MapIcon {
    /// Icon for a marker of the given type.
    pub fn for_marker(marker_type: MarkerType, is_sponsor: bool) -> Self {
        match (marker_type, is_sponsor) {
            (MarkerType::Anchorage, true) => Self::AnchorageSponsor,
            (MarkerType::Business, true) => Self::BusinessSponsor,
            (MarkerType::Marina, true) => Self::MarinaSponsor,
            (MarkerType::Unknown, _) => Self::Unknown,
            (MarkerType::Anchorage, false) => Self::Anchorage,
            (MarkerType::BoatRamp, _) => Self::BoatRamp,
            (MarkerType::Bridge, _) => Self::Bridge,
            (MarkerType::Business, false) => Self::Business,
            (MarkerType::Dam, _) => Self::Dam,
            (MarkerType::Ferry, _) => Self::Ferry,
            (MarkerType::Hazard, _) => Self::Hazard,
            (MarkerType::Inlet, _) => Self::Inlet,
            (MarkerType::Lock, _) => Self::Lock,
            (MarkerType::Marina, false) => Self::Marina,
        }
    }

    /// Asset file name hosts load the icon image from.
    pub fn filename(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown.png",
            Self::Anchorage => "anchorage.png",
            Self::Hazard => "hazard.png",
            Self::Marina => "marina.png",
            Self::BoatRamp => "boat_ramp.png",
            Self::Business => "business.png",
            Self::Inlet => "inlet.png",
            Self::Bridge => "bridge.png",
            Self::Lock => "lock.png",
            Self::Dam => "dam.png",
            Self::Ferry => "ferry.png",
            Self::AnchorageSponsor => "anchorage_sponsor.png",
            Self::BusinessSponsor => "business_sponsor.png",
            Self::MarinaSponsor => "marina_sponsor.png",
        }
    }
}

/// A point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,
    pub marker_type: MarkerType,
    pub name: String,
    pub position: GeoPoint,
    pub map_icon: MapIcon,
    /// Free-form attributes (amenities, contact details, ...) as sent by the
    /// service. Ordered so that equal markers serialize identically.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub last_modified: DateTime<Utc>,
}

impl Marker {
    /// Tile that owns this marker.
    pub fn tile(&self) -> TileXY {
        tile_for_position(&self.position)
    }
}
