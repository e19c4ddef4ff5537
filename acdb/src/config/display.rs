//! Display settings recorded for the rendering layer.
//!
//! The store never consults these; they are carried so a host can hand one
//! consistent value to whatever renders markers and reviews.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AcdbError;

/// How coordinates are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoordinateFormat {
    DecimalDegrees,
    #[default]
    DegreesMinutes,
    DegreesMinutesSeconds,
}

/// How dates are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateFormat {
    /// `Jan 5, 2021`
    #[default]
    MonthAbbreviated,
    /// `05/01/2021`
    DmySlash,
    /// `01/05/2021`
    MdySlash,
    /// `05-01-2021`
    DmyDash,
    /// `01-05-2021`
    MdyDash,
}

/// Unit for depths, lengths and clearances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceUnit {
    #[default]
    Feet,
    Meters,
}

impl CoordinateFormat {
    pub const ALL: [Self; 3] = [
        Self::DecimalDegrees,
        Self::DegreesMinutes,
        Self::DegreesMinutesSeconds,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DecimalDegrees => "decimal-degrees",
            Self::DegreesMinutes => "degrees-minutes",
            Self::DegreesMinutesSeconds => "degrees-minutes-seconds",
        }
    }
}

impl DateFormat {
    pub const ALL: [Self; 5] = [
        Self::MonthAbbreviated,
        Self::DmySlash,
        Self::MdySlash,
        Self::DmyDash,
        Self::MdyDash,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MonthAbbreviated => "month-abbreviated",
            Self::DmySlash => "dmy-slash",
            Self::MdySlash => "mdy-slash",
            Self::DmyDash => "dmy-dash",
            Self::MdyDash => "mdy-dash",
        }
    }
}

impl DistanceUnit {
    pub const ALL: [Self; 2] = [Self::Feet, Self::Meters];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feet => "feet",
            Self::Meters => "meters",
        }
    }
}

fn parse_setting<T: Copy>(
    value: &str,
    all: &[T],
    as_str: fn(&T) -> &'static str,
    what: &str,
) -> Result<T, AcdbError> {
    let wanted = value.trim().to_ascii_lowercase().replace('_', "-");
    all.iter()
        .copied()
        .find(|candidate| as_str(candidate) == wanted)
        .ok_or_else(|| {
            let options: Vec<&str> = all.iter().map(as_str).collect();
            AcdbError::Config(format!(
                "invalid {} '{}' (expected one of: {})",
                what,
                value,
                options.join(", ")
            ))
        })
}

impl FromStr for CoordinateFormat {
    type Err = AcdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_setting(s, &Self::ALL, Self::as_str, "coordinate format")
    }
}

impl FromStr for DateFormat {
    type Err = AcdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_setting(s, &Self::ALL, Self::as_str, "date format")
    }
}

impl FromStr for DistanceUnit {
    type Err = AcdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_setting(s, &Self::ALL, Self::as_str, "distance unit")
    }
}

impl fmt::Display for CoordinateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display settings handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplaySettings {
    pub coordinate_format: CoordinateFormat,
    pub date_format: DateFormat,
    pub distance_unit: DistanceUnit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_underscores_and_case() {
        assert_eq!(
            "Degrees_Minutes_Seconds".parse::<CoordinateFormat>().unwrap(),
            CoordinateFormat::DegreesMinutesSeconds
        );
        assert_eq!("METERS".parse::<DistanceUnit>().unwrap(), DistanceUnit::Meters);
    }

    #[test]
    fn test_parse_error_lists_options() {
        let err = "fathoms".parse::<DistanceUnit>().unwrap_err();
        assert!(err.to_string().contains("feet, meters"));
    }

    #[test]
    fn test_display_round_trips() {
        for format in DateFormat::ALL {
            assert_eq!(format.to_string().parse::<DateFormat>().unwrap(), format);
        }
    }
}
