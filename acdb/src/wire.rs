//! JSON wire records shared by sync responses and tile bundles.
//!
//! Records deserialize with every field optional so that a missing field is
//! reported by [`MarkerRecord::into_change`] / [`ReviewRecord::into_change`]
//! with its name, rather than as a generic serde error. Conversion is the only
//! place payload shape is checked; everything downstream works on validated
//! [`Marker`] and [`Review`] values.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AcdbError, AcdbResult};
use crate::model::{MapIcon, Marker, MarkerId, MarkerType, Review, ReviewId, MAX_RATING};
use crate::tile::GeoPoint;

/// Deserialize a response body, reporting failures as `MalformedResponse`.
pub(crate) fn parse_json<T: DeserializeOwned>(json: &str, what: &str) -> AcdbResult<T> {
    serde_json::from_str(json)
        .map_err(|e| AcdbError::MalformedResponse(format!("{}: {}", what, e)))
}

pub(crate) fn require<T>(value: Option<T>, field: &str, what: &str) -> AcdbResult<T> {
    value.ok_or_else(|| AcdbError::MalformedResponse(format!("{} is missing '{}'", what, field)))
}

pub(crate) fn require_position(
    value: Option<GeoPoint>,
    field: &str,
    what: &str,
) -> AcdbResult<GeoPoint> {
    let point = require(value, field, what)?;
    if !point.is_valid() {
        return Err(AcdbError::MalformedResponse(format!(
            "{} has out-of-range '{}' ({}, {})",
            what, field, point.latitude, point.longitude
        )));
    }
    Ok(point)
}

/// Marker as sent by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerRecord {
    pub id: Option<MarkerId>,
    pub poi_type: Option<String>,
    pub name: Option<String>,
    pub map_location: Option<GeoPoint>,
    pub date_last_modified: Option<DateTime<Utc>>,
    pub is_sponsor: Option<bool>,
    #[serde(default)]
    pub is_deleted: bool,
    pub attributes: Option<BTreeMap<String, serde_json::Value>>,
}

/// Validated effect of one marker record.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerChange {
    Upsert(Marker),
    Delete {
        id: MarkerId,
        last_modified: DateTime<Utc>,
    },
}

impl MarkerChange {
    pub fn id(&self) -> MarkerId {
        match self {
            Self::Upsert(marker) => marker.id,
            Self::Delete { id, .. } => *id,
        }
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        match self {
            Self::Upsert(marker) => marker.last_modified,
            Self::Delete { last_modified, .. } => *last_modified,
        }
    }
}

impl MarkerRecord {
    /// Validate into a create/update or a delete.
    ///
    /// Deletions need only `id` and `dateLastModified`; everything else needs
    /// `poiType` and a valid `mapLocation` as well.
    pub fn into_change(self) -> AcdbResult<MarkerChange> {
        const WHAT: &str = "marker";
        let id = require(self.id, "id", WHAT)?;
        let last_modified = require(self.date_last_modified, "dateLastModified", WHAT)?;

        if self.is_deleted {
            return Ok(MarkerChange::Delete { id, last_modified });
        }

        let poi_type = require(self.poi_type, "poiType", WHAT)?;
        let position = require_position(self.map_location, "mapLocation", WHAT)?;
        let marker_type = MarkerType::from_wire(&poi_type);

        Ok(MarkerChange::Upsert(Marker {
            id,
            marker_type,
            name: self.name.unwrap_or_default(),
            position,
            map_icon: MapIcon::for_marker(marker_type, self.is_sponsor.unwrap_or(false)),
            attributes: self.attributes.unwrap_or_default(),
            last_modified,
        }))
    }

    /// Validate a record that must describe a live marker.
    pub fn into_marker(self) -> AcdbResult<Marker> {
        match self.into_change()? {
            MarkerChange::Upsert(marker) => Ok(marker),
            MarkerChange::Delete { id, .. } => Err(AcdbError::MalformedResponse(format!(
                "marker {} is flagged deleted",
                id
            ))),
        }
    }
}

/// Review as sent by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub id: Option<ReviewId>,
    pub poi_id: Option<MarkerId>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub rating: Option<u8>,
    pub captain_name: Option<String>,
    pub date_visited: Option<String>,
    pub date_last_modified: Option<DateTime<Utc>>,
    pub votes: Option<u32>,
    pub is_voted: Option<bool>,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Validated effect of one review record.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewChange {
    Upsert(Review),
    Delete {
        id: ReviewId,
        last_modified: DateTime<Utc>,
    },
}

impl ReviewChange {
    pub fn id(&self) -> ReviewId {
        match self {
            Self::Upsert(review) => review.id,
            Self::Delete { id, .. } => *id,
        }
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        match self {
            Self::Upsert(review) => review.last_modified,
            Self::Delete { last_modified, .. } => *last_modified,
        }
    }
}

impl ReviewRecord {
    /// Validate into a create/update or a delete.
    pub fn into_change(self) -> AcdbResult<ReviewChange> {
        const WHAT: &str = "review";
        let id = require(self.id, "id", WHAT)?;
        let last_modified = require(self.date_last_modified, "dateLastModified", WHAT)?;

        if self.is_deleted {
            return Ok(ReviewChange::Delete { id, last_modified });
        }

        let marker_id = require(self.poi_id, "poiId", WHAT)?;
        let rating = self.rating.unwrap_or(0);
        if rating > MAX_RATING {
            return Err(AcdbError::MalformedResponse(format!(
                "review {} has rating {} (max {})",
                id, rating, MAX_RATING
            )));
        }

        Ok(ReviewChange::Upsert(Review {
            id,
            marker_id,
            title: self.title.unwrap_or_default(),
            text: self.text.unwrap_or_default(),
            rating,
            captain_name: self.captain_name.unwrap_or_default(),
            date_visited: self.date_visited,
            votes: self.votes.unwrap_or(0),
            is_voted: self.is_voted.unwrap_or(false),
            last_modified,
        }))
    }

    /// Validate a record that must describe a live review.
    pub fn into_review(self) -> AcdbResult<Review> {
        match self.into_change()? {
            ReviewChange::Upsert(review) => Ok(review),
            ReviewChange::Delete { id, .. } => Err(AcdbError::MalformedResponse(format!(
                "review {} is flagged deleted",
                id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker_json(extra: &str) -> String {
        format!(
            r#"{{"id": 42, "poiType": "Marina", "name": "Harbor Point",
                "mapLocation": {{"latitude": 38.98, "longitude": -76.48}},
                "dateLastModified": "2021-05-01T12:00:00Z"{}}}"#,
            extra
        )
    }

    #[test]
    fn test_marker_record_upsert() {
        let record: MarkerRecord = parse_json(&marker_json(""), "marker").unwrap();
        let marker = record.into_marker().unwrap();
        assert_eq!(marker.id, 42);
        assert_eq!(marker.marker_type, MarkerType::Marina);
        assert_eq!(marker.map_icon, MapIcon::Marina);
        assert_eq!(marker.name, "Harbor Point");
    }

    #[test]
    fn test_marker_record_sponsor_icon() {
        let record: MarkerRecord =
            parse_json(&marker_json(r#", "isSponsor": true"#), "marker").unwrap();
        assert_eq!(record.into_marker().unwrap().map_icon, MapIcon::MarinaSponsor);
    }

    #[test]
    fn test_marker_record_missing_location() {
        let record: MarkerRecord = parse_json(
            r#"{"id": 1, "poiType": "Hazard", "dateLastModified": "2021-05-01T12:00:00Z"}"#,
            "marker",
        )
        .unwrap();
        let err = record.into_change().unwrap_err();
        assert!(matches!(err, AcdbError::MalformedResponse(ref m) if m.contains("mapLocation")));
    }

    #[test]
    fn test_marker_record_out_of_range_location() {
        let record: MarkerRecord = parse_json(
            r#"{"id": 1, "poiType": "Hazard", "dateLastModified": "2021-05-01T12:00:00Z",
                "mapLocation": {"latitude": 91.0, "longitude": 0.0}}"#,
            "marker",
        )
        .unwrap();
        assert!(record.into_change().is_err());
    }

    #[test]
    fn test_marker_record_delete_needs_only_id_and_date() {
        let record: MarkerRecord = parse_json(
            r#"{"id": 9, "isDeleted": true, "dateLastModified": "2021-05-01T12:00:00Z"}"#,
            "marker",
        )
        .unwrap();
        assert!(matches!(
            record.into_change().unwrap(),
            MarkerChange::Delete { id: 9, .. }
        ));
    }

    #[test]
    fn test_bad_timestamp_is_malformed() {
        let err = parse_json::<MarkerRecord>(
            r#"{"id": 9, "dateLastModified": "yesterday"}"#,
            "marker",
        )
        .unwrap_err();
        assert!(matches!(err, AcdbError::MalformedResponse(_)));
    }

    #[test]
    fn test_review_record_rating_bounds() {
        let record: ReviewRecord = parse_json(
            r#"{"id": 5, "poiId": 42, "rating": 6, "dateLastModified": "2021-05-01T12:00:00Z"}"#,
            "review",
        )
        .unwrap();
        assert!(record.into_change().is_err());
    }

    #[test]
    fn test_review_record_defaults() {
        let record: ReviewRecord = parse_json(
            r#"{"id": 5, "poiId": 42, "dateLastModified": "2021-05-01T12:00:00Z"}"#,
            "review",
        )
        .unwrap();
        let review = record.into_review().unwrap();
        assert_eq!(review.marker_id, 42);
        assert_eq!(review.votes, 0);
        assert!(!review.is_voted);
    }

    #[test]
    fn test_review_record_missing_marker() {
        let record: ReviewRecord =
            parse_json(r#"{"id": 5, "dateLastModified": "2021-05-01T12:00:00Z"}"#, "review")
                .unwrap();
        assert!(record.into_change().is_err());
    }
}
