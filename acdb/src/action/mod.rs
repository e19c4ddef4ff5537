//! Deep-link parsing for `acdb://` URLs embedded in rendered content.
//!
//! Recognized shapes:
//!
//! ```text
//! acdb://summary/{markerId}
//! acdb://photos/{markerId}
//! acdb://section/{markerId}/{sectionName}
//! acdb://reviews/{markerId}[?page=N]
//! acdb://edit/{markerId}[/{sectionName}]
//! acdb://reportReview/{reviewId}
//! acdb://voteReview/{reviewId}
//! ```
//!
//! Parsing is pure: no store access, and the same inputs always give the same
//! action.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{AcdbError, AcdbResult};
use crate::model::{MarkerId, ReviewId};

/// URL scheme handled by [`parse_acdb_url`].
pub const SCHEME: &str = "acdb";

/// What the host should do with a parsed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Render the marker summary.
    ShowSummary,
    /// Render the photo list.
    ShowPhotos,
    /// Render a full section or a review page.
    SeeAll,
    /// Open the edit web view.
    Edit,
    /// Open the report web view.
    ReportReview,
    /// Call the vote API.
    VoteReview,
}

impl ActionKind {
    /// True for kinds the host opens in a web view instead of rendering.
    pub fn opens_web_view(&self) -> bool {
        matches!(self, Self::Edit | Self::ReportReview)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ShowSummary => "show-summary",
            Self::ShowPhotos => "show-photos",
            Self::SeeAll => "see-all",
            Self::Edit => "edit",
            Self::ReportReview => "report-review",
            Self::VoteReview => "vote-review",
        };
        f.write_str(name)
    }
}

/// Parsed `acdb://` link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcdbUrlAction {
    Summary {
        marker_id: MarkerId,
    },
    PhotoList {
        marker_id: MarkerId,
    },
    SectionDetail {
        marker_id: MarkerId,
        section: String,
    },
    /// One page of a marker's reviews, rendered for `captain_name`.
    ReviewList {
        marker_id: MarkerId,
        page: u32,
        page_size: u32,
        captain_name: String,
    },
    Edit {
        marker_id: MarkerId,
        section: Option<String>,
    },
    ReportReview {
        review_id: ReviewId,
    },
    VoteReview {
        review_id: ReviewId,
    },
}

impl AcdbUrlAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Summary { .. } => ActionKind::ShowSummary,
            Self::PhotoList { .. } => ActionKind::ShowPhotos,
            Self::SectionDetail { .. } | Self::ReviewList { .. } => ActionKind::SeeAll,
            Self::Edit { .. } => ActionKind::Edit,
            Self::ReportReview { .. } => ActionKind::ReportReview,
            Self::VoteReview { .. } => ActionKind::VoteReview,
        }
    }

    /// Marker or review id the action targets.
    pub fn target_id(&self) -> u64 {
        match self {
            Self::Summary { marker_id }
            | Self::PhotoList { marker_id }
            | Self::SectionDetail { marker_id, .. }
            | Self::ReviewList { marker_id, .. }
            | Self::Edit { marker_id, .. } => *marker_id,
            Self::ReportReview { review_id } | Self::VoteReview { review_id } => *review_id,
        }
    }

    /// Path of the web view page for kinds that open one.
    pub fn webview_path(&self) -> Option<String> {
        match self {
            Self::Edit {
                marker_id,
                section: Some(section),
            } => Some(format!(
                "community/poi/{}/edit/{}",
                marker_id,
                urlencoding::encode(section)
            )),
            Self::Edit {
                marker_id,
                section: None,
            } => Some(format!("community/poi/{}/edit", marker_id)),
            Self::ReportReview { review_id } => {
                Some(format!("community/review/{}/report", review_id))
            }
            _ => None,
        }
    }
}

/// Regex for `acdb://{host}/{id}[/{extra}][?{query}]`.
///
/// - Group 1: host (letters)
/// - Group 2: id (digits)
/// - Group 3: optional extra path segment
/// - Group 4: optional query string
fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?i:acdb)://([A-Za-z]+)/(\d+)(?:/([^/?#]+))?/?(?:\?([^#]*))?$")
            .unwrap_or_else(|e| panic!("acdb URL pattern failed to compile: {}", e))
    })
}

/// Parse an `acdb://` URL.
///
/// `captain_name` and `page_size` are only used by review lists but must
/// always be supplied; a zero page size is treated as one. Anything that is
/// not one of the recognized shapes is `UnrecognizedUrl`.
pub fn parse_acdb_url(url: &str, captain_name: &str, page_size: u32) -> AcdbResult<AcdbUrlAction> {
    let unrecognized = || AcdbError::UnrecognizedUrl(url.to_string());

    let caps = url_pattern().captures(url.trim()).ok_or_else(unrecognized)?;
    let host = caps[1].to_ascii_lowercase();
    let id: u64 = caps[2].parse().map_err(|_| unrecognized())?;
    let extra = caps
        .get(3)
        .map(|m| decode_segment(m.as_str()))
        .transpose()
        .map_err(|_| unrecognized())?;
    let query = caps.get(4).map(|m| m.as_str());

    let action = match (host.as_str(), extra) {
        ("summary", None) => AcdbUrlAction::Summary { marker_id: id },
        ("photos", None) => AcdbUrlAction::PhotoList { marker_id: id },
        ("section", Some(section)) => AcdbUrlAction::SectionDetail {
            marker_id: id,
            section,
        },
        ("reviews", None) => AcdbUrlAction::ReviewList {
            marker_id: id,
            page: page_number(query).ok_or_else(unrecognized)?,
            page_size: page_size.max(1),
            captain_name: captain_name.to_string(),
        },
        ("edit", section) => AcdbUrlAction::Edit {
            marker_id: id,
            section,
        },
        ("reportreview", None) => AcdbUrlAction::ReportReview { review_id: id },
        ("votereview", None) => AcdbUrlAction::VoteReview { review_id: id },
        _ => return Err(unrecognized()),
    };
    Ok(action)
}

fn decode_segment(segment: &str) -> Result<String, std::string::FromUtf8Error> {
    urlencoding::decode(segment).map(|s| s.into_owned())
}

/// Page from a `page=N` query parameter; 1 when absent, `None` when invalid.
fn page_number(query: Option<&str>) -> Option<u32> {
    let Some(value) = query
        .into_iter()
        .flat_map(|q| q.split('&'))
        .find_map(|pair| pair.strip_prefix("page="))
    else {
        return Some(1);
    };
    value.parse::<u32>().ok().filter(|page| *page >= 1)
}
