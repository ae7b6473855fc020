//! Moment Data Structures
//!
//! A `Moment` is a single dated, located event in the graph. Its primary key is
//! the hierarchical path produced by [`crate::utils::path_codec::encode`].
//!
//! # Architecture
//!
//! - **Typed record**: every known attribute is an explicit field
//! - **Forward compatible**: unknown keys survive in `extra`
//! - **Legacy tolerant**: `month` (name) and `month_num` are both stored, since
//!   older records may carry only one of them
//!
//! # Examples
//!
//! ```rust
//! use clockchain_core::models::{Moment, Visibility};
//!
//! let mut moment = Moment::new("/1969/july/20/2056/usa/florida/cape-canaveral/apollo-11");
//! moment.name = "Apollo 11 Moon Landing".to_string();
//! moment.year = Some(1969);
//! moment.visibility = Visibility::Public;
//! ```

use crate::utils::lenient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Who may see a moment in browse/search listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Public => "public",
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Visibility::Public)
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "private" => Ok(Visibility::Private),
            "public" => Ok(Visibility::Public),
            other => Err(format!("unknown visibility: {}", other)),
        }
    }
}

/// A dated, located event stored in the graph.
///
/// # Fields
///
/// - `path`: Primary key, immutable once created (`id` is accepted on input)
/// - `year`: Signed year, negative for BCE
/// - `month` / `month_num`: Month name and number (1-12, 0 when unknown)
/// - `day`: Day of month (0 when unknown)
/// - `time`: 4-digit 24h string such as `"1400"`
/// - `country` / `region` / `city`: Stored pre-slugified
/// - `layer`: Importance tier (0 seed, 1 expanded, 2 generated)
/// - `tdf_hash`: Content fingerprint, always present once stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Moment {
    #[serde(alias = "id")]
    pub path: String,

    #[serde(rename = "type")]
    pub node_type: String,

    pub name: String,
    #[serde(deserialize_with = "lenient::year")]
    pub year: Option<i64>,
    #[serde(deserialize_with = "deserialize_month")]
    pub month: String,
    #[serde(deserialize_with = "lenient::u32_or_zero")]
    pub month_num: u32,
    #[serde(deserialize_with = "lenient::u32_or_zero")]
    pub day: u32,
    pub time: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub slug: String,
    #[serde(deserialize_with = "lenient::u32_or_zero")]
    pub layer: u32,
    pub visibility: Visibility,
    pub created_by: String,

    /// Order-insignificant tag set
    #[serde(deserialize_with = "lenient::string_list")]
    pub tags: BTreeSet<String>,

    pub one_liner: String,

    /// Ordered list of historical figures
    #[serde(deserialize_with = "lenient::string_list")]
    pub figures: Vec<String>,

    // Provenance
    pub source_type: String,
    pub confidence: Option<f64>,
    pub source_run_id: Option<String>,

    // External generation references (opaque here)
    pub flash_timepoint_id: Option<String>,
    pub flash_slug: String,
    pub flash_share_url: String,

    pub era: String,
    #[serde(deserialize_with = "deserialize_created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub published_at: Option<DateTime<Utc>>,

    /// SHA-256 content fingerprint (64 lowercase hex chars)
    pub tdf_hash: String,

    /// Unknown attributes carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Legacy records may carry the month as a number; normalise to its name
fn deserialize_month<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s.to_lowercase(),
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .and_then(crate::utils::path_codec::month_name)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    })
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| raw.parse::<DateTime<Utc>>())
        .ok()
}

/// Missing or unreadable timestamps become `None`
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_timestamp(&value))
}

/// Unreadable creation times fall back to now
fn deserialize_created_at<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_timestamp(&value).unwrap_or_else(Utc::now))
}

impl Default for Moment {
    fn default() -> Self {
        Self {
            path: String::new(),
            node_type: "event".to_string(),
            name: String::new(),
            year: None,
            month: String::new(),
            month_num: 0,
            day: 0,
            time: String::new(),
            country: String::new(),
            region: String::new(),
            city: String::new(),
            slug: String::new(),
            layer: 0,
            visibility: Visibility::Private,
            created_by: "system".to_string(),
            tags: BTreeSet::new(),
            one_liner: String::new(),
            figures: Vec::new(),
            source_type: "historical".to_string(),
            confidence: None,
            source_run_id: None,
            flash_timepoint_id: None,
            flash_slug: String::new(),
            flash_share_url: String::new(),
            era: String::new(),
            created_at: Utc::now(),
            published_at: None,
            tdf_hash: String::new(),
            extra: Map::new(),
        }
    }
}

impl Moment {
    /// Create an empty moment addressed by `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Build a moment from a loosely-typed attribute map
    ///
    /// Missing or null keys take their defaults; unknown keys land in `extra`.
    /// Any `id`/`path` key in the map is ignored in favour of `path`.
    pub fn from_attrs(path: impl Into<String>, mut attrs: Map<String, Value>) -> serde_json::Result<Self> {
        attrs.retain(|key, value| !value.is_null() && key != "id" && key != "path");
        let mut moment: Moment = serde_json::from_value(Value::Object(attrs))?;
        moment.path = path.into();
        Ok(moment)
    }

    pub fn is_public(&self) -> bool {
        self.visibility.is_public()
    }

    /// Canonical attribute view consumed by the content fingerprint
    pub fn canonical_attrs(&self) -> Map<String, Value> {
        let mut attrs = Map::new();
        attrs.insert(
            "year".to_string(),
            self.year.map(Value::from).unwrap_or(Value::Null),
        );
        attrs.insert("month".to_string(), Value::from(self.month.clone()));
        attrs.insert("day".to_string(), Value::from(self.day));
        attrs.insert("time".to_string(), Value::from(self.time.clone()));
        attrs.insert("country".to_string(), Value::from(self.country.clone()));
        attrs.insert("region".to_string(), Value::from(self.region.clone()));
        attrs.insert("city".to_string(), Value::from(self.city.clone()));
        attrs.insert("slug".to_string(), Value::from(self.slug.clone()));
        attrs.insert("name".to_string(), Value::from(self.name.clone()));
        attrs.insert("one_liner".to_string(), Value::from(self.one_liner.clone()));
        attrs
    }

    /// True when the moment falls on the given calendar day
    ///
    /// Matches on the month name or the month number, whichever the record carries.
    pub fn falls_on(&self, month_num: u32, month_name: &str, day: u32) -> bool {
        if self.day != day {
            return false;
        }
        let by_name = !month_name.is_empty() && self.month.eq_ignore_ascii_case(month_name);
        let by_num = month_num != 0 && self.month_num == month_num;
        by_name || by_num
    }

    /// Apply a sparse patch in place
    pub fn apply(&mut self, patch: MomentPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(one_liner) = patch.one_liner {
            self.one_liner = one_liner;
        }
        if let Some(visibility) = patch.visibility {
            self.visibility = visibility;
        }
        if let Some(published_at) = patch.published_at {
            self.published_at = Some(published_at);
        }
        if let Some(layer) = patch.layer {
            self.layer = layer;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(figures) = patch.figures {
            self.figures = figures;
        }
        if let Some(era) = patch.era {
            self.era = era;
        }
        if let Some(source_type) = patch.source_type {
            self.source_type = source_type;
        }
        if let Some(confidence) = patch.confidence {
            self.confidence = Some(confidence);
        }
        if let Some(tdf_hash) = patch.tdf_hash {
            self.tdf_hash = tdf_hash;
        }
    }
}

/// Sparse update for an existing moment (only provided fields change)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MomentPatch {
    pub name: Option<String>,
    pub one_liner: Option<String>,
    pub visibility: Option<Visibility>,
    pub published_at: Option<DateTime<Utc>>,
    pub layer: Option<u32>,
    pub tags: Option<BTreeSet<String>>,
    pub figures: Option<Vec<String>>,
    pub era: Option<String>,
    pub source_type: Option<String>,
    pub confidence: Option<f64>,
    /// Explicit fingerprint re-stamp
    pub tdf_hash: Option<String>,
}

impl MomentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    pub fn with_tdf_hash(mut self, tdf_hash: String) -> Self {
        self.tdf_hash = Some(tdf_hash);
        self
    }

    /// Check if the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.one_liner.is_none()
            && self.visibility.is_none()
            && self.published_at.is_none()
            && self.layer.is_none()
            && self.tags.is_none()
            && self.figures.is_none()
            && self.era.is_none()
            && self.source_type.is_none()
            && self.confidence.is_none()
            && self.tdf_hash.is_none()
    }
}

/// Storage-side selection used by backends for listing moments
#[derive(Debug, Clone, Default)]
pub struct MomentFilter {
    pub visibility: Option<Visibility>,
    pub min_layer: Option<u32>,
    /// `(month_num, day)` calendar match
    pub calendar_day: Option<(u32, u32)>,
}

impl MomentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn public() -> Self {
        Self {
            visibility: Some(Visibility::Public),
            ..Default::default()
        }
    }

    pub fn with_min_layer(mut self, min_layer: u32) -> Self {
        self.min_layer = Some(min_layer);
        self
    }

    pub fn with_calendar_day(mut self, month_num: u32, day: u32) -> Self {
        self.calendar_day = Some((month_num, day));
        self
    }

    pub fn matches(&self, moment: &Moment) -> bool {
        if let Some(visibility) = self.visibility {
            if moment.visibility != visibility {
                return false;
            }
        }
        if let Some(min_layer) = self.min_layer {
            if moment.layer < min_layer {
                return false;
            }
        }
        if let Some((month_num, day)) = self.calendar_day {
            let month_name = crate::utils::path_codec::month_name(month_num).unwrap_or("");
            if !moment.falls_on(month_num, month_name, day) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_seed_record_with_id_alias() {
        let moment: Moment = serde_json::from_value(json!({
            "id": "/-44/march/15/1100/italy/lazio/rome/assassination-of-julius-caesar",
            "name": "Assassination of Julius Caesar",
            "year": -44,
            "month": "march",
            "day": 15,
            "tags": ["rome", "politics"],
            "visibility": "public",
            "wikipedia": "https://en.wikipedia.org/wiki/Assassination_of_Julius_Caesar"
        }))
        .unwrap();

        assert!(moment.path.starts_with("/-44/march"));
        assert_eq!(moment.year, Some(-44));
        assert_eq!(moment.node_type, "event");
        assert_eq!(moment.created_by, "system");
        assert!(moment.is_public());
        assert!(moment.tags.contains("rome"));
        assert_eq!(
            moment.extra.get("wikipedia").and_then(|v| v.as_str()),
            Some("https://en.wikipedia.org/wiki/Assassination_of_Julius_Caesar")
        );
    }

    #[test]
    fn test_falls_on_accepts_either_month_representation() {
        let mut by_name = Moment::new("/a");
        by_name.month = "July".to_string();
        by_name.day = 20;
        assert!(by_name.falls_on(7, "july", 20));
        assert!(!by_name.falls_on(7, "july", 21));

        let mut by_num = Moment::new("/b");
        by_num.month_num = 7;
        by_num.day = 20;
        assert!(by_num.falls_on(7, "july", 20));
        assert!(!by_num.falls_on(8, "august", 20));
    }

    #[test]
    fn test_from_attrs_tolerates_legacy_values() {
        let attrs = match json!({
            "id": "/ignored",
            "name": "Trinity Test",
            "year": "1945",
            "month": 7,
            "day": "16",
            "flash_slug": null,
            "tags": "not-a-list",
            "created_at": "2024-03-01 12:00:00+00:00",
            "published_at": "soon"
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        let moment = Moment::from_attrs("/1945/july/16/0529/usa/new-mexico/socorro/trinity-test", attrs).unwrap();
        assert_eq!(moment.path, "/1945/july/16/0529/usa/new-mexico/socorro/trinity-test");
        assert_eq!(moment.year, Some(1945));
        assert_eq!(moment.month, "july");
        assert_eq!(moment.day, 16);
        assert!(moment.flash_slug.is_empty());
        assert!(moment.tags.is_empty());
        assert_eq!(moment.created_at.to_rfc3339(), "2024-03-01T12:00:00+00:00");
        assert!(moment.published_at.is_none());
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(MomentPatch::new().is_empty());
        assert!(!MomentPatch::new()
            .with_visibility(Visibility::Public)
            .is_empty());
    }
}
