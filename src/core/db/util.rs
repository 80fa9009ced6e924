use serde::{Deserialize, Deserializer, Serializer, de::DeserializeOwned};
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::warn;
use uuid::Uuid;

/// Fresh opaque identifier for a newly created entity.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

fn parse_instant(value: &Value) -> Option<OffsetDateTime> {
    match value {
        Value::String(text) => OffsetDateTime::parse(text.trim(), &Rfc3339).ok(),
        // epoch milliseconds, as written by some older exports
        Value::Number(number) => number
            .as_i64()
            .and_then(|ms| OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).ok()),
        _ => None,
    }
}

/// RFC 3339 timestamps that fall back to "now" when absent or unreadable.
pub(crate) mod timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        let text = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.as_ref().and_then(parse_instant).unwrap_or_else(now))
    }

    /// Optional dates: unreadable values load as `None`.
    pub mod option {
        use super::super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<OffsetDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(instant) => super::serialize(instant, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<OffsetDateTime>, D::Error> {
            let raw = Option::<Value>::deserialize(deserializer)?;
            Ok(raw.as_ref().and_then(parse_instant))
        }
    }
}

/// Flow values: null, missing or non-numeric input reads as 0.
pub(crate) fn lenient_flow<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    let flow = match raw {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => text.trim().replace(',', ".").parse().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(if flow.is_finite() { flow } else { 0.0 })
}

/// Keep every element of a JSON list that parses as `T`; the others are
/// skipped with a warning. Anything but a list reads as empty.
pub(crate) fn records_from_value<T: DeserializeOwned>(raw: Option<Value>, what: &str) -> Vec<T> {
    match raw {
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(what, index, error = %e, "Skipping malformed record");
                    None
                }
            })
            .collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(_) => {
            warn!(what, "Expected a list of records");
            Vec::new()
        }
    }
}

/// Child lists inside a stored record, parsed record by record.
pub(crate) fn lenient_records<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(records_from_value(raw, std::any::type_name::<T>()))
}

/// Lowercased whitespace tokens of a search query.
pub(crate) fn tokenize(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

/// True when every token occurs in at least one of the fields.
pub(crate) fn matches_all_tokens<'a>(
    tokens: &[String],
    fields: impl IntoIterator<Item = Option<&'a str>>,
) -> bool {
    let fields: Vec<String> = fields.into_iter().flatten().map(str::to_lowercase).collect();
    !tokens.is_empty()
        && tokens
            .iter()
            .all(|token| fields.iter().any(|field| field.contains(token.as_str())))
}
