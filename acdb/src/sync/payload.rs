//! Per-endpoint response payloads.
//!
//! Each type's `parse` deserializes a response body and validates it in one
//! step. The engine only ever sees the validated form.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{AcdbError, AcdbResult};
use crate::model::{Marker, MarkerId, MarkerType, Review, ReviewId};
use crate::tile::GeoPoint;
use crate::wire::{
    parse_json, require, require_position, MarkerChange, MarkerRecord, ReviewChange,
    ReviewRecord,
};

/// Response to a marker creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateMarkerResponse {
    pub marker: Marker,
}

impl CreateMarkerResponse {
    pub fn parse(json: &str) -> AcdbResult<Self> {
        let record: MarkerRecord = parse_json(json, "create marker response")?;
        Ok(Self {
            marker: record.into_marker()?,
        })
    }
}

/// Response to a marker move.
///
/// Only `id`, `mapLocation` and `dateLastModified` are required; other fields
/// are applied when present. An unrecognized `poiType` counts as absent so it
/// never overwrites a known type.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveMarkerResponse {
    pub id: MarkerId,
    pub position: GeoPoint,
    pub last_modified: DateTime<Utc>,
    pub name: Option<String>,
    pub marker_type: Option<MarkerType>,
    pub is_sponsor: Option<bool>,
}

impl MoveMarkerResponse {
    pub fn parse(json: &str) -> AcdbResult<Self> {
        const WHAT: &str = "move marker response";
        let record: MarkerRecord = parse_json(json, WHAT)?;
        Ok(Self {
            id: require(record.id, "id", WHAT)?,
            position: require_position(record.map_location, "mapLocation", WHAT)?,
            last_modified: require(record.date_last_modified, "dateLastModified", WHAT)?,
            name: record.name,
            marker_type: record
                .poi_type
                .as_deref()
                .map(MarkerType::from_wire)
                .filter(|t| *t != MarkerType::Unknown),
            is_sponsor: record.is_sponsor,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSyncMarkers {
    points_of_interest: Vec<MarkerRecord>,
}

/// One page of marker changes for a tile.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncMarkersResponse {
    pub changes: Vec<MarkerChange>,
}

impl SyncMarkersResponse {
    pub fn parse(json: &str) -> AcdbResult<Self> {
        let raw: RawSyncMarkers = parse_json(json, "sync markers response")?;
        let changes = raw
            .points_of_interest
            .into_iter()
            .map(MarkerRecord::into_change)
            .collect::<AcdbResult<_>>()?;
        Ok(Self { changes })
    }

    /// Version embedded in the batch: its newest modification time.
    pub fn version(&self) -> Option<DateTime<Utc>> {
        self.changes.iter().map(MarkerChange::last_modified).max()
    }
}

#[derive(Deserialize)]
struct RawSyncReviews {
    reviews: Vec<ReviewRecord>,
}

/// One page of review changes for a tile.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncReviewsResponse {
    pub changes: Vec<ReviewChange>,
}

impl SyncReviewsResponse {
    pub fn parse(json: &str) -> AcdbResult<Self> {
        let raw: RawSyncReviews = parse_json(json, "sync reviews response")?;
        let changes = raw
            .reviews
            .into_iter()
            .map(ReviewRecord::into_change)
            .collect::<AcdbResult<_>>()?;
        Ok(Self { changes })
    }

    pub fn version(&self) -> Option<DateTime<Utc>> {
        self.changes.iter().map(ReviewChange::last_modified).max()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVote {
    id: Option<ReviewId>,
    votes: Option<u32>,
    is_voted: Option<bool>,
}

/// Response to a helpful-vote on a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteForReviewResponse {
    pub review_id: ReviewId,
    pub votes: u32,
    pub is_voted: bool,
}

impl VoteForReviewResponse {
    pub fn parse(json: &str) -> AcdbResult<Self> {
        const WHAT: &str = "vote response";
        let raw: RawVote = parse_json(json, WHAT)?;
        Ok(Self {
            review_id: require(raw.id, "id", WHAT)?,
            votes: require(raw.votes, "votes", WHAT)?,
            is_voted: require(raw.is_voted, "isVoted", WHAT)?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWebView {
    result_type: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct RawId {
    id: Option<u64>,
}

/// Result posted back by an edit web view.
#[derive(Debug, Clone, PartialEq)]
pub enum WebViewResponse {
    /// `SUCCESS`: a marker was created or edited.
    MarkerSaved(Marker),
    /// `DELETE`: a marker was removed.
    MarkerDeleted(MarkerId),
    /// `REVIEWSUCCESS` / `REVIEWFLAGGED`: a review was written or flagged.
    ReviewSaved(Review),
    /// `REVIEWDELETE`: a review was removed.
    ReviewDeleted(ReviewId),
    /// Any other result type. Carries the type as sent.
    Unhandled(String),
}

impl WebViewResponse {
    pub fn parse(json: &str) -> AcdbResult<Self> {
        const WHAT: &str = "web view response";
        let raw: RawWebView = parse_json(json, WHAT)?;
        let kind = require(raw.result_type, "resultType", WHAT)?;

        let response = match kind.as_str() {
            "SUCCESS" => Self::MarkerSaved(data::<MarkerRecord>(raw.data)?.into_marker()?),
            "DELETE" => Self::MarkerDeleted(require(data::<RawId>(raw.data)?.id, "data.id", WHAT)?),
            "REVIEWSUCCESS" | "REVIEWFLAGGED" => {
                Self::ReviewSaved(data::<ReviewRecord>(raw.data)?.into_review()?)
            }
            "REVIEWDELETE" => {
                Self::ReviewDeleted(require(data::<RawId>(raw.data)?.id, "data.id", WHAT)?)
            }
            _ => Self::Unhandled(kind.clone()),
        };
        Ok(response)
    }

    /// Result type tag as used on the wire.
    pub fn kind(&self) -> &str {
        match self {
            Self::MarkerSaved(_) => "SUCCESS",
            Self::MarkerDeleted(_) => "DELETE",
            Self::ReviewSaved(_) => "REVIEWSUCCESS",
            Self::ReviewDeleted(_) => "REVIEWDELETE",
            Self::Unhandled(kind) => kind,
        }
    }
}

fn data<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> AcdbResult<T> {
    serde_json::from_value(value)
        .map_err(|e| AcdbError::MalformedResponse(format!("web view data: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_markers_version_is_newest_entry() {
        let response = SyncMarkersResponse::parse(
            r#"{"pointsOfInterest": [
                {"id": 1, "isDeleted": true, "dateLastModified": "2021-03-01T00:00:00Z"},
                {"id": 2, "poiType": "Hazard", "mapLocation": {"latitude": 1.0, "longitude": 1.0},
                 "dateLastModified": "2021-06-01T00:00:00Z"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(response.changes.len(), 2);
        assert_eq!(
            response.version().unwrap().to_rfc3339(),
            "2021-06-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_sync_markers_requires_list() {
        assert!(matches!(
            SyncMarkersResponse::parse(r#"{"reviews": []}"#),
            Err(AcdbError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_empty_batch_has_no_version() {
        let response = SyncReviewsResponse::parse(r#"{"reviews": []}"#).unwrap();
        assert!(response.version().is_none());
    }

    #[test]
    fn test_move_requires_location() {
        let err = MoveMarkerResponse::parse(
            r#"{"id": 3, "dateLastModified": "2021-06-01T00:00:00Z"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, AcdbError::MalformedResponse(ref m) if m.contains("mapLocation")));
    }

    #[test]
    fn test_move_optional_fields() {
        let response = MoveMarkerResponse::parse(
            r#"{"id": 3, "poiType": "Anchorage", "dateLastModified": "2021-06-01T00:00:00Z",
                "mapLocation": {"latitude": 10.0, "longitude": 20.0}}"#,
        )
        .unwrap();
        assert_eq!(response.marker_type, Some(MarkerType::Anchorage));
        assert_eq!(response.name, None);
    }

    #[test]
    fn test_move_unrecognized_type_is_absent() {
        let response = MoveMarkerResponse::parse(
            r#"{"id": 3, "poiType": "Lighthouse", "dateLastModified": "2021-06-01T00:00:00Z",
                "mapLocation": {"latitude": 10.0, "longitude": 20.0}}"#,
        )
        .unwrap();
        assert_eq!(response.marker_type, None);
    }

    #[test]
    fn test_vote_requires_all_fields() {
        assert!(VoteForReviewResponse::parse(r#"{"id": 1, "votes": 3}"#).is_err());
        let vote = VoteForReviewResponse::parse(r#"{"id": 1, "votes": 3, "isVoted": true}"#)
            .unwrap();
        assert_eq!(vote.votes, 3);
    }

    #[test]
    fn test_web_view_kinds() {
        let deleted =
            WebViewResponse::parse(r#"{"resultType": "DELETE", "data": {"id": 8}}"#).unwrap();
        assert_eq!(deleted, WebViewResponse::MarkerDeleted(8));

        let flagged = WebViewResponse::parse(
            r#"{"resultType": "REVIEWFLAGGED", "data":
                {"id": 4, "poiId": 8, "dateLastModified": "2021-06-01T00:00:00Z"}}"#,
        )
        .unwrap();
        assert!(matches!(flagged, WebViewResponse::ReviewSaved(ref r) if r.id == 4));

        let other = WebViewResponse::parse(r#"{"resultType": "EDITPROFILE"}"#).unwrap();
        assert_eq!(other, WebViewResponse::Unhandled("EDITPROFILE".to_string()));
        assert_eq!(other.kind(), "EDITPROFILE");
    }

    #[test]
    fn test_web_view_requires_result_type() {
        assert!(WebViewResponse::parse(r#"{"data": {}}"#).is_err());
    }
}
