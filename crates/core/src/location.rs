use std::{fmt, str::FromStr};

use serde::Serialize;
use thiserror::Error;

/// Separator between the segments of a location code.
pub const DELIMITER: char = '-';

const MIN_SEGMENTS: usize = 4;

/// Errors produced when a location code cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseError {
    #[error("expected at least 4 segments, found {found}")]
    TooFewSegments { found: usize },
    #[error("rack segment {position} is empty")]
    EmptyRackSegment { position: usize },
    #[error("{field} segment '{value}' is not a non-negative integer")]
    InvalidNumber { field: &'static str, value: String },
}

/// Structured coordinate of a bin: `<rack_code>-<level>-<bin>`.
///
/// The rack code is made of the first two segments (`N1-09`), followed by
/// the level and bin numbers. Segments after the fourth are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationCode {
    pub rack_code: String,
    pub level: u32,
    pub bin: u32,
}

impl LocationCode {
    pub fn new(rack_code: impl Into<String>, level: u32, bin: u32) -> Self {
        Self {
            rack_code: rack_code.into(),
            level,
            bin,
        }
    }

    /// Parses a raw location code.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let segments: Vec<&str> = raw.trim().split(DELIMITER).map(str::trim).collect();
        if segments.len() < MIN_SEGMENTS {
            return Err(ParseError::TooFewSegments {
                found: segments.len(),
            });
        }

        if let Some(position) = segments[..2].iter().position(|segment| segment.is_empty()) {
            return Err(ParseError::EmptyRackSegment {
                position: position + 1,
            });
        }

        let level = parse_number("level", segments[2])?;
        let bin = parse_number("bin", segments[3])?;

        Ok(Self {
            rack_code: format!("{}{DELIMITER}{}", segments[0], segments[1]),
            level,
            bin,
        })
    }

    /// Canonical string for this coordinate.
    pub fn format(&self) -> String {
        format(&self.rack_code, self.level, self.bin)
    }
}

impl fmt::Display for LocationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{DELIMITER}{:02}{DELIMITER}{:02}",
            self.rack_code, self.level, self.bin
        )
    }
}

impl FromStr for LocationCode {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// Formats a coordinate, zero-padding level and bin to two digits.
pub fn format(rack_code: &str, level: u32, bin: u32) -> String {
    format!("{rack_code}{DELIMITER}{level:02}{DELIMITER}{bin:02}")
}

/// Returns the canonical form of a raw location code.
pub fn normalize(raw: &str) -> Result<String, ParseError> {
    LocationCode::parse(raw).map(|code| code.format())
}

/// Rack code addressed by a search prefix such as `N1-09` or `N1-09-02`.
///
/// Returns `None` when the prefix does not name a full rack.
pub fn rack_code_of(prefix: &str) -> Option<String> {
    let mut segments = prefix.trim().split(DELIMITER).map(str::trim);
    let aisle = segments.next().filter(|segment| !segment.is_empty())?;
    let rack = segments.next().filter(|segment| !segment.is_empty())?;
    Some(format!("{aisle}{DELIMITER}{rack}"))
}

fn parse_number(field: &'static str, value: &str) -> Result<u32, ParseError> {
    // u32::from_str accepts a leading '+', which is not a valid code.
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ParseError::InvalidNumber {
            field,
            value: value.to_string(),
        });
    }

    value.parse::<u32>().map_err(|_| ParseError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_code() {
        let code = LocationCode::parse("N1-09-02-15").expect("parse");
        assert_eq!(code, LocationCode::new("N1-09", 2, 15));
    }

    #[test]
    fn format_zero_pads_level_and_bin() {
        assert_eq!(format("N1-09", 2, 5), "N1-09-02-05");
        assert_eq!(format("N1-09", 12, 140), "N1-09-12-140");
        assert_eq!(LocationCode::new("N1-09", 3, 7).to_string(), "N1-09-03-07");
    }

    #[test]
    fn format_of_parse_is_normalized_form() {
        for (raw, expected) in [
            ("N1-09-02-15", "N1-09-02-15"),
            ("N1-09-2-5", "N1-09-02-05"),
            ("N1-09-002-0015", "N1-09-02-15"),
            ("  N1-09-02-15  ", "N1-09-02-15"),
            ("N1-09-02-15-X", "N1-09-02-15"),
        ] {
            let parsed = LocationCode::parse(raw).expect("parse");
            assert_eq!(parsed.format(), expected, "raw={raw}");
            assert_eq!(normalize(raw).as_deref(), Ok(expected));
        }
    }

    #[test]
    fn canonical_codes_round_trip() {
        let raw = "B4-01-10-03";
        assert_eq!(LocationCode::parse(raw).expect("parse").to_string(), raw);
    }

    #[test]
    fn three_segments_are_rejected() {
        assert_eq!(
            LocationCode::parse("N1-09-02"),
            Err(ParseError::TooFewSegments { found: 3 })
        );
        assert_eq!(
            LocationCode::parse("N1-09"),
            Err(ParseError::TooFewSegments { found: 2 })
        );
        assert_eq!(
            LocationCode::parse(""),
            Err(ParseError::TooFewSegments { found: 1 })
        );
    }

    #[test]
    fn non_numeric_level_or_bin_is_rejected() {
        assert!(matches!(
            LocationCode::parse("N1-09-XX-15"),
            Err(ParseError::InvalidNumber { field: "level", .. })
        ));
        assert!(matches!(
            LocationCode::parse("N1-09-02-1A"),
            Err(ParseError::InvalidNumber { field: "bin", .. })
        ));
        assert!(matches!(
            LocationCode::parse("N1-09-+2-15"),
            Err(ParseError::InvalidNumber { field: "level", .. })
        ));
        assert!(matches!(
            LocationCode::parse("N1-09-02-"),
            Err(ParseError::InvalidNumber { field: "bin", .. })
        ));
    }

    #[test]
    fn negative_numbers_split_into_extra_segments() {
        // "-1" turns into an empty level segment followed by "1".
        assert!(matches!(
            LocationCode::parse("N1-09--1-15"),
            Err(ParseError::InvalidNumber { field: "level", .. })
        ));
    }

    #[test]
    fn empty_rack_segments_are_rejected() {
        assert_eq!(
            LocationCode::parse("-09-02-15"),
            Err(ParseError::EmptyRackSegment { position: 1 })
        );
        assert_eq!(
            LocationCode::parse("N1--02-15"),
            Err(ParseError::EmptyRackSegment { position: 2 })
        );
    }

    #[test]
    fn rack_code_of_takes_first_two_segments() {
        assert_eq!(rack_code_of("N1-09").as_deref(), Some("N1-09"));
        assert_eq!(rack_code_of(" N1-09-02 ").as_deref(), Some("N1-09"));
        assert_eq!(rack_code_of("N1"), None);
        assert_eq!(rack_code_of("N1-"), None);
        assert_eq!(rack_code_of(""), None);
    }

    #[test]
    fn from_str_delegates_to_parse() {
        let code: LocationCode = "N1-09-01-01".parse().expect("parse");
        assert_eq!(code.level, 1);
        assert_eq!(code.bin, 1);
    }
}
