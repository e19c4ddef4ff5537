//! Review records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::marker::MarkerId;

/// Server-assigned review id.
pub type ReviewId = u64;

/// Highest star rating a review may carry.
pub const MAX_RATING: u8 = 5;

/// A captain's review of a marker.
///
/// Reviews live in the tile their marker occupied when the review was
/// created; moving the marker later does not move its reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub marker_id: MarkerId,
    pub title: String,
    pub text: String,
    pub rating: u8,
    pub captain_name: String,
    pub date_visited: Option<String>,
    pub votes: u32,
    /// Whether the current captain has voted this review helpful.
    pub is_voted: bool,
    pub last_modified: DateTime<Utc>,
}
