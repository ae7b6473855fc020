//! Moment path codec
//!
//! Every moment is addressed by an 8-segment path:
//!
//! ```text
//! /{year}/{month_name}/{day}/{time}/{country}/{region}/{city}/{slug}
//! ```
//!
//! BCE years keep a literal leading `-` fused to the year token, e.g.
//! `/-44/march/15/1100/italy/lazio/rome/assassination-of-julius-caesar`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

pub const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Field order of the path segments
pub const PATH_SEGMENTS: [&str; 8] = [
    "year", "month", "day", "time", "country", "region", "city", "slug",
];

static NON_SLUG_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").unwrap());
static SEPARATOR_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-\s]+").unwrap());

/// Why a path could not be decoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Invalid path '{path}': expected 8 segments, found {found}")]
    SegmentCount { path: String, found: usize },

    #[error("Invalid path '{path}': unrecognized month '{month}'")]
    UnknownMonth { path: String, month: String },

    #[error("Invalid path '{path}': year '{year}' is not an integer")]
    InvalidYear { path: String, year: String },

    #[error("Invalid path '{path}': day '{day}' is not an integer")]
    InvalidDay { path: String, day: String },
}

/// Month name for a 1-based month number
pub fn month_name(month_num: u32) -> Option<&'static str> {
    month_num
        .checked_sub(1)
        .and_then(|i| MONTHS.get(i as usize))
        .copied()
}

/// 1-based month number for a month name (case-insensitive)
pub fn month_number(name: &str) -> Option<u32> {
    let name = name.trim().to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == name)
        .map(|i| i as u32 + 1)
}

/// Reduce free text to a lowercase, hyphenated ASCII slug
///
/// Accented letters keep their base letter ("Zürich" -> "zurich"); any other
/// non-ASCII character is dropped.
pub fn slugify(text: &str) -> String {
    let ascii: String = text.nfkd().filter(|c| c.is_ascii()).collect();
    let lowered = ascii.to_lowercase();
    let stripped = NON_SLUG_CHARS.replace_all(lowered.trim(), "");
    let hyphenated = SEPARATOR_RUNS.replace_all(&stripped, "-");
    hyphenated.trim_matches('-').to_string()
}

/// Inputs for [`encode`] (avoids a long positional argument list)
#[derive(Debug, Clone, Copy)]
pub struct PathParts<'a> {
    pub year: i64,
    pub month_num: u32,
    pub day: u32,
    pub time: &'a str,
    pub country: &'a str,
    pub region: &'a str,
    pub city: &'a str,
    pub slug: &'a str,
}

/// Build the canonical path; free-text components pass through [`slugify`]
///
/// An out-of-range month number yields an empty month segment, which
/// [`decode`] will later reject.
pub fn encode(parts: PathParts<'_>) -> String {
    format!(
        "/{}/{}/{}/{}/{}/{}/{}/{}",
        parts.year,
        month_name(parts.month_num).unwrap_or(""),
        parts.day,
        parts.time,
        slugify(parts.country),
        slugify(parts.region),
        slugify(parts.city),
        slugify(parts.slug),
    )
}

/// Fully decoded path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathCoordinate {
    pub year: i64,
    pub month_num: u32,
    pub month_name: String,
    pub day: u32,
    pub time: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub slug: String,
}

impl PathCoordinate {
    pub fn parts(&self) -> PathParts<'_> {
        PathParts {
            year: self.year,
            month_num: self.month_num,
            day: self.day,
            time: &self.time,
            country: &self.country,
            region: &self.region,
            city: &self.city,
            slug: &self.slug,
        }
    }
}

/// Parse a full 8-segment path
pub fn decode(path: &str) -> Result<PathCoordinate, PathError> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    if segments.len() != PATH_SEGMENTS.len() {
        return Err(PathError::SegmentCount {
            path: path.to_string(),
            found: segments.len(),
        });
    }

    let year = segments[0]
        .parse::<i64>()
        .map_err(|_| PathError::InvalidYear {
            path: path.to_string(),
            year: segments[0].to_string(),
        })?;

    let month_name = segments[1].to_lowercase();
    let month_num = month_number(&month_name).ok_or_else(|| PathError::UnknownMonth {
        path: path.to_string(),
        month: segments[1].to_string(),
    })?;

    let day = segments[2]
        .parse::<u32>()
        .map_err(|_| PathError::InvalidDay {
            path: path.to_string(),
            day: segments[2].to_string(),
        })?;

    Ok(PathCoordinate {
        year,
        month_num,
        month_name,
        day,
        time: segments[3].to_string(),
        country: segments[4].to_string(),
        region: segments[5].to_string(),
        city: segments[6].to_string(),
        slug: segments[7].to_string(),
    })
}

/// A year or day segment that may not be numeric during prefix browsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SegmentValue {
    Number(i64),
    Raw(String),
}

impl SegmentValue {
    fn parse(segment: &str) -> Self {
        segment
            .parse::<i64>()
            .map(SegmentValue::Number)
            .unwrap_or_else(|_| SegmentValue::Raw(segment.to_string()))
    }
}

/// Positional decode of a path prefix (0 to 8 segments)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialCoordinate {
    pub year: Option<SegmentValue>,
    pub month: Option<String>,
    /// Set only when `month` resolves to a known month name
    pub month_num: Option<u32>,
    pub day: Option<SegmentValue>,
    pub time: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub slug: Option<String>,
}

/// Decode a browse prefix without failing; extra segments are ignored
pub fn decode_partial(path: &str) -> PartialCoordinate {
    let trimmed = path.trim_matches('/');
    let mut partial = PartialCoordinate::default();
    if trimmed.is_empty() {
        return partial;
    }

    for (index, segment) in trimmed.split('/').take(PATH_SEGMENTS.len()).enumerate() {
        match index {
            0 => partial.year = Some(SegmentValue::parse(segment)),
            1 => {
                let month = segment.to_lowercase();
                partial.month_num = month_number(&month);
                partial.month = Some(month);
            }
            2 => partial.day = Some(SegmentValue::parse(segment)),
            3 => partial.time = Some(segment.to_string()),
            4 => partial.country = Some(segment.to_string()),
            5 => partial.region = Some(segment.to_string()),
            6 => partial.city = Some(segment.to_string()),
            _ => partial.slug = Some(segment.to_string()),
        }
    }
    partial
}
