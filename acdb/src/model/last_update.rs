//! Per-tile last-update bookkeeping and the store content version.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Most recent applied sync for one tile, tracked per entity class.
///
/// `None` is the "unset" sentinel: the tile has never received data of that
/// class (or it was deleted). Both timestamps only move forward through
/// [`LastUpdateInfo::advance_markers`] / [`LastUpdateInfo::advance_reviews`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LastUpdateInfo {
    pub marker_last_update: Option<DateTime<Utc>>,
    pub review_last_update: Option<DateTime<Utc>>,
}

impl LastUpdateInfo {
    /// Record with both timestamps unset.
    pub const UNSET: Self = Self {
        marker_last_update: None,
        review_last_update: None,
    };

    pub fn is_unset(&self) -> bool {
        self.marker_last_update.is_none() && self.review_last_update.is_none()
    }

    /// Move the marker timestamp forward. Returns false for stale values.
    pub fn advance_markers(&mut self, candidate: DateTime<Utc>) -> bool {
        advance(&mut self.marker_last_update, candidate)
    }

    /// Move the review timestamp forward. Returns false for stale values.
    pub fn advance_reviews(&mut self, candidate: DateTime<Utc>) -> bool {
        advance(&mut self.review_last_update, candidate)
    }

    /// Marker timestamp in the RFC 3339 form the sync API expects.
    pub fn marker_last_update_string(&self) -> Option<String> {
        self.marker_last_update.map(format_timestamp)
    }

    /// Review timestamp in the RFC 3339 form the sync API expects.
    pub fn review_last_update_string(&self) -> Option<String> {
        self.review_last_update.map(format_timestamp)
    }
}

fn advance(slot: &mut Option<DateTime<Utc>>, candidate: DateTime<Utc>) -> bool {
    if slot.is_some_and(|current| current >= candidate) {
        return false;
    }
    *slot = Some(candidate);
    true
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Four-part content version (`major.minor.patch.build`) of installed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DatabaseVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build: u32,
}

impl DatabaseVersion {
    /// Version reported before any data has been installed.
    pub const ZERO: Self = Self {
        major: 0,
        minor: 0,
        patch: 0,
        build: 0,
    };

    pub fn new(major: u32, minor: u32, patch: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for DatabaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.patch, self.build
        )
    }
}

/// Error parsing a [`DatabaseVersion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseVersionError(pub String);

impl fmt::Display for ParseVersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid database version '{}'", self.0)
    }
}

impl std::error::Error for ParseVersionError {}

impl FromStr for DatabaseVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u32> = s
            .trim()
            .split('.')
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|_| ParseVersionError(s.to_string()))?;

        match parts.as_slice() {
            [major, minor, patch, build] => Ok(Self::new(*major, *minor, *patch, *build)),
            _ => Err(ParseVersionError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 5, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_unset_default() {
        assert!(LastUpdateInfo::default().is_unset());
        assert_eq!(LastUpdateInfo::default(), LastUpdateInfo::UNSET);
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut info = LastUpdateInfo::UNSET;
        assert!(info.advance_markers(ts(2)));
        assert!(!info.advance_markers(ts(1)));
        assert!(!info.advance_markers(ts(2)));
        assert_eq!(info.marker_last_update, Some(ts(2)));
        assert!(info.review_last_update.is_none());

        assert!(info.advance_reviews(ts(3)));
        assert_eq!(info.review_last_update, Some(ts(3)));
    }

    #[test]
    fn test_timestamp_string() {
        let mut info = LastUpdateInfo::UNSET;
        info.advance_markers(ts(1));
        assert_eq!(
            info.marker_last_update_string().as_deref(),
            Some("2021-05-01T12:00:00Z")
        );
        assert_eq!(info.review_last_update_string(), None);
    }

    #[test]
    fn test_version_parse_and_display() {
        let version: DatabaseVersion = "2.0.1.4".parse().unwrap();
        assert_eq!(version, DatabaseVersion::new(2, 0, 1, 4));
        assert_eq!(version.to_string(), "2.0.1.4");
        assert_eq!(DatabaseVersion::ZERO.to_string(), "0.0.0.0");
    }

    #[test]
    fn test_version_parse_rejects_malformed() {
        for bad in ["", "2.0", "2.0.1.4.5", "a.b.c.d", "2.0.-1.4"] {
            assert!(bad.parse::<DatabaseVersion>().is_err(), "{bad}");
        }
    }

    #[test]
    fn test_version_ordering() {
        assert!(DatabaseVersion::new(2, 0, 1, 4) > DatabaseVersion::new(2, 0, 0, 9));
    }
}
