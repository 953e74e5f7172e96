//! Lenient field decoders for rows coming back from the store.
//!
//! Nested selects and SQLite's type affinity both produce values that do not
//! line up with the Rust types one-to-one (`0/1` for booleans, `null` for an
//! empty embed, numeric strings). Anything that cannot be read falls back to
//! the type's default instead of failing the whole row.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  Ok(value_as_flag(&value))
}

pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  Ok(value_as_number(&value).unwrap_or(0.0))
}

pub fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  Ok(
    value_as_number(&value)
      .filter(|n| *n >= 0.0)
      .map(|n| n.min(u32::MAX as f64) as u32)
      .unwrap_or(0),
  )
}

pub fn optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  Ok(value_as_number(&value))
}

pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  Ok(match value {
    Value::String(s) => s,
    Value::Null => String::new(),
    other => other.to_string(),
  })
}

/// Calendar day from either `YYYY-MM-DD` or a full timestamp
pub fn date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  Ok(
    value
      .as_str()
      .and_then(parse_day)
      .unwrap_or_default(),
  )
}

/// RFC 3339, or SQLite's `YYYY-MM-DD HH:MM:SS` read as UTC
pub fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  Ok(value.as_str().and_then(|s| {
    DateTime::parse_from_rfc3339(s)
      .map(|dt| dt.with_timezone(&Utc))
      .ok()
      .or_else(|| {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
          .ok()
          .map(|dt| dt.and_utc())
      })
  }))
}

/// Embedded collection; `null`, a missing key or a malformed element list
/// decode as empty. SQLite stores plain lists as JSON text.
pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned,
{
  let value = Value::deserialize(deserializer)?;
  let value = match value {
    Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::Null),
    other => other,
  };
  Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Any other field type: unknown or `null` values become `T::default()`
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned + Default,
{
  let value = Value::deserialize(deserializer)?;
  Ok(serde_json::from_value(value).unwrap_or_default())
}

pub fn value_as_flag(value: &Value) -> bool {
  match value {
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
    Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "t" | "1"),
    _ => false,
  }
}

pub fn value_as_number(value: &Value) -> Option<f64> {
  let n = match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse::<f64>().ok(),
    _ => None,
  }?;
  n.is_finite().then_some(n)
}

fn parse_day(s: &str) -> Option<NaiveDate> {
  let day = s.get(..10)?;
  NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
