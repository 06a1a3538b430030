//! Wire timestamp format shared by response fields and the
//! `If-Modified-Since` header: `%Y-%m-%d %H:%M:%S`, UTC, no offset suffix.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

pub const UTC_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a wire timestamp as UTC.
pub fn decode_utc(timestamp: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(timestamp, UTC_FORMAT).map(|naive| naive.and_utc())
}

/// Renders a UTC instant in wire format.
pub fn encode_utc(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(UTC_FORMAT).to_string()
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    decode_utc(&raw).map_err(serde::de::Error::custom)
}

pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&encode_utc(timestamp))
}

/// `#[serde(with = "timestamp::option")]` for fields that may be absent.
pub mod option {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| decode_utc(&s).map_err(serde::de::Error::custom))
            .transpose()
    }

    pub fn serialize<S>(timestamp: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match timestamp {
            Some(ts) => serializer.serialize_str(&encode_utc(ts)),
            None => serializer.serialize_none(),
        }
    }
}
