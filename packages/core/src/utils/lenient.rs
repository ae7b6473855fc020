//! Forgiving serde field deserializers
//!
//! Stored moments and renderer responses both arrive with loosely typed
//! fields. These helpers read a `serde_json::Value` and coerce it, so one
//! off-type field degrades to its default instead of failing the record.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accept null, numbers and numeric strings; anything else becomes 0
pub fn u32_or_zero<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_u32(&value).unwrap_or(0))
}

/// Numbers and numeric strings; anything else is absent
pub fn optional_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_u32(&value))
}

/// Integer years, numeric strings and whole floats; anything else is unknown
pub fn year<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// JSON integers only
pub fn strict_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_i64())
}

/// Strings only; null, numbers and containers are absent
pub fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Keep the string entries of a list; a non-list value becomes empty
pub fn string_list<'de, D, C>(deserializer: D) -> Result<C, D::Error>
where
    D: Deserializer<'de>,
    C: FromIterator<String>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => std::iter::empty().collect(),
    })
}

/// Keep the list entries that deserialize as `T`; a non-list value becomes empty
pub fn list_of<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Parse as `T`, or fall back to absent when the shape is wrong
pub fn optional_or_absent<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Loose {
        #[serde(deserialize_with = "optional_u32")]
        day: Option<u32>,
        #[serde(deserialize_with = "strict_integer")]
        verified: Option<i64>,
        #[serde(deserialize_with = "string_list")]
        tags: Vec<String>,
        #[serde(deserialize_with = "optional_string")]
        name: Option<String>,
    }

    #[test]
    fn test_coercions() {
        let loose: Loose = serde_json::from_value(json!({
            "day": " 20 ",
            "verified": "480 BC",
            "tags": ["war", 7, null, "greece"],
            "name": 42
        }))
        .unwrap();

        assert_eq!(loose.day, Some(20));
        assert_eq!(loose.verified, None);
        assert_eq!(loose.tags, vec!["war", "greece"]);
        assert_eq!(loose.name, None);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let loose: Loose = serde_json::from_value(json!({"tags": "war"})).unwrap();
        assert!(loose.day.is_none());
        assert!(loose.tags.is_empty());
    }
}
