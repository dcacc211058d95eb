//! Serde converter for chrono::DateTime <-> mongodb::bson::DateTime, so stored
//! timestamps are BSON dates and sort chronologically.

use chrono::{DateTime, Utc};
use mongodb::bson;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    bson::DateTime::from_millis(date.timestamp_millis()).serialize(serializer)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let bson_dt = bson::DateTime::deserialize(deserializer)?;
    to_chrono(bson_dt).map_err(D::Error::custom)
}

fn to_chrono(bson_dt: bson::DateTime) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp_millis(bson_dt.timestamp_millis())
        .ok_or_else(|| format!("timestamp out of range: {}", bson_dt.timestamp_millis()))
}

/// Same conversion for optional fields; `None` is stored as null.
pub mod option {
    use super::*;

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(date) => super::serialize(date, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<bson::DateTime>::deserialize(deserializer)?
            .map(to_chrono)
            .transpose()
            .map_err(D::Error::custom)
    }
}
