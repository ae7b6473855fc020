//! Content fingerprint (TDF hash)
//!
//! A SHA-256 digest over a moment's canonical fields, used for dedup and
//! integrity checks. The digest is independent of the moment's path.
//!
//! Canonical encoding: each field value is coerced to a lowercased, trimmed
//! string, then the map is written as compact JSON with sorted keys and every
//! non-ASCII character escaped as `\uXXXX`. Digests already stored by earlier
//! deployments depend on this exact byte layout.

use crate::models::Moment;
use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Fields covered by the fingerprint
pub const FINGERPRINT_FIELDS: [&str; 10] = [
    "year",
    "month",
    "day",
    "time",
    "country",
    "region",
    "city",
    "slug",
    "name",
    "one_liner",
];

/// Compact JSON formatter that escapes everything outside printable ASCII
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        let mut start = 0;
        for (index, ch) in fragment.char_indices() {
            if (ch as u32) < 0x7f {
                continue;
            }
            writer.write_all(fragment[start..index].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units).iter() {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = index + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Coerce one attribute value to its canonical string
///
/// Null, false, zero and empty values count as unset.
fn coerce(value: Option<&Value>) -> String {
    let raw = match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => String::new(),
        Some(Value::Bool(true)) => "true".to_string(),
        Some(Value::Number(n)) => {
            if n.as_f64() == Some(0.0) {
                String::new()
            } else {
                n.to_string()
            }
        }
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) if items.is_empty() => String::new(),
        Some(Value::Object(map)) if map.is_empty() => String::new(),
        Some(other) => other.to_string(),
    };
    raw.to_lowercase().trim().to_string()
}

/// Fingerprint a loosely-typed attribute map
///
/// Keys outside [`FINGERPRINT_FIELDS`] are ignored and missing keys count as
/// empty, so the digest never depends on which optional fields were supplied.
pub fn fingerprint_attrs(attrs: &Map<String, Value>) -> String {
    let canonical: BTreeMap<&str, String> = FINGERPRINT_FIELDS
        .iter()
        .map(|field| (*field, coerce(attrs.get(*field))))
        .collect();

    let mut encoded = Vec::with_capacity(256);
    let mut serializer = Serializer::with_formatter(&mut encoded, AsciiFormatter);
    // A map of strings into a Vec cannot fail to serialize
    canonical.serialize(&mut serializer).ok();

    format!("{:x}", Sha256::digest(&encoded))
}

/// Fingerprint a moment's canonical fields
pub fn fingerprint(moment: &Moment) -> String {
    fingerprint_attrs(&moment.canonical_attrs())
}

/// True when `hash` looks like a stored fingerprint (64 lowercase hex chars)
pub fn is_fingerprint(hash: &str) -> bool {
    hash.len() == 64 && hash.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn caesar() -> Map<String, Value> {
        attrs(json!({
            "year": -44,
            "month": "march",
            "day": 15,
            "time": "1100",
            "country": "italy",
            "region": "lazio",
            "city": "rome",
            "slug": "assassination-of-julius-caesar",
            "name": "Assassination of Julius Caesar",
            "one_liner": "Senators stab the dictator at the Theatre of Pompey."
        }))
    }

    #[test]
    fn test_deterministic_and_well_formed() {
        let first = fingerprint_attrs(&caesar());
        let second = fingerprint_attrs(&caesar());
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(is_fingerprint(&first));
    }

    #[test]
    fn test_key_order_insensitive() {
        let forward = caesar();
        let mut reversed = Map::new();
        for (key, value) in forward.iter().rev() {
            reversed.insert(key.clone(), value.clone());
        }
        assert_eq!(fingerprint_attrs(&forward), fingerprint_attrs(&reversed));
    }

    #[test]
    fn test_ignores_non_canonical_fields() {
        let mut with_extras = caesar();
        with_extras.insert("tags".to_string(), json!(["rome"]));
        with_extras.insert("visibility".to_string(), json!("public"));
        with_extras.insert("layer".to_string(), json!(2));
        assert_eq!(fingerprint_attrs(&caesar()), fingerprint_attrs(&with_extras));
    }

    #[test]
    fn test_missing_equals_empty() {
        let mut sparse = caesar();
        sparse.remove("one_liner");
        sparse.remove("time");

        let mut explicit = caesar();
        explicit.insert("one_liner".to_string(), Value::Null);
        explicit.insert("time".to_string(), json!("   "));

        assert_eq!(fingerprint_attrs(&sparse), fingerprint_attrs(&explicit));
        assert_ne!(fingerprint_attrs(&sparse), fingerprint_attrs(&caesar()));
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let mut shouted = caesar();
        shouted.insert(
            "name".to_string(),
            json!("  ASSASSINATION OF JULIUS CAESAR "),
        );
        assert_eq!(fingerprint_attrs(&caesar()), fingerprint_attrs(&shouted));
    }

    #[test]
    fn test_every_canonical_field_matters() {
        let base = fingerprint_attrs(&caesar());
        for field in FINGERPRINT_FIELDS {
            let mut changed = caesar();
            changed.insert(field.to_string(), json!("something else"));
            assert_ne!(base, fingerprint_attrs(&changed), "field {field}");
        }
    }

    #[test]
    fn test_zero_counts_as_unset() {
        let mut zero_day = caesar();
        zero_day.insert("day".to_string(), json!(0));
        let mut no_day = caesar();
        no_day.remove("day");
        assert_eq!(fingerprint_attrs(&zero_day), fingerprint_attrs(&no_day));
    }

    #[test]
    fn test_matches_stored_digests() {
        assert_eq!(
            fingerprint_attrs(&caesar()),
            "0ab54d846a77bf5a282e6ca39068f1e4e32d8655e631212d2fec30981b1f4abf"
        );

        let mut accented = caesar();
        accented.insert("city".to_string(), json!("Zürich"));
        assert_eq!(
            fingerprint_attrs(&accented),
            "8156aa65ad5b933d62818aeb5731291665ad9a8cfad5e8bdd663ab17f5fb0abe"
        );
    }

    #[test]
    fn test_empty_map_digest() {
        let digest = fingerprint_attrs(&Map::new());
        assert!(is_fingerprint(&digest));
        assert_eq!(digest, fingerprint_attrs(&attrs(json!({"year": null}))));
    }

    #[test]
    fn test_non_ascii_is_escaped() {
        let mut encoded = Vec::new();
        let mut serializer = Serializer::with_formatter(&mut encoded, AsciiFormatter);
        "Zürich 🏛".serialize(&mut serializer).unwrap();
        assert_eq!(
            String::from_utf8(encoded).unwrap(),
            r#""Z\u00fcrich \ud83c\udfdb""#
        );
    }

    #[test]
    fn test_moment_fingerprint_matches_attrs() {
        let mut moment = Moment::new("/-44/march/15/1100/italy/lazio/rome/assassination-of-julius-caesar");
        moment.year = Some(-44);
        moment.month = "march".to_string();
        moment.day = 15;
        moment.time = "1100".to_string();
        moment.country = "italy".to_string();
        moment.region = "lazio".to_string();
        moment.city = "rome".to_string();
        moment.slug = "assassination-of-julius-caesar".to_string();
        moment.name = "Assassination of Julius Caesar".to_string();
        moment.one_liner = "Senators stab the dictator at the Theatre of Pompey.".to_string();
        assert_eq!(fingerprint(&moment), fingerprint_attrs(&caesar()));
    }
}
