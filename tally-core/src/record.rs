use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Input timestamp layout, e.g. `2024-01-01 00:00:01.500000`. The fraction is optional.
pub const EVENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
/// Output layout for the minute bucket, e.g. `2024-01-01 00:00:00`.
pub const MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single timestamped duration read from the input stream.
///
/// Extra fields on the input record are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(with = "event_time")]
    pub timestamp: NaiveDateTime,
    pub duration: f64,
}

impl Event {
    pub fn new(timestamp: NaiveDateTime, duration: f64) -> Self {
        Self { timestamp, duration }
    }

    /// The event's timestamp with seconds and sub-seconds zeroed.
    pub fn minute(&self) -> NaiveDateTime {
        truncate_to_minute(self.timestamp)
    }
}

/// One output record: the minute an event fell in and the windowed average after it was added.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Average {
    #[serde(rename = "date", with = "minute_time")]
    pub minute: NaiveDateTime,
    #[serde(rename = "average_delivery_time")]
    pub average: f64,
}

impl Average {
    pub fn new(minute: NaiveDateTime, average: f64) -> Self {
        Self { minute, average }
    }

    /// Builds the output record for `event`, truncating its timestamp to the minute.
    pub fn for_event(event: &Event, average: f64) -> Self {
        Self::new(event.minute(), average)
    }
}

pub fn truncate_to_minute(ts: NaiveDateTime) -> NaiveDateTime {
    ts - Duration::seconds(i64::from(ts.second()))
        - Duration::nanoseconds(i64::from(ts.nanosecond()))
}

pub fn parse_event_time(s: &str) -> chrono::ParseResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), EVENT_TIME_FORMAT)
}

mod event_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format("%Y-%m-%d %H:%M:%S%.6f"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_event_time(&raw)
            .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
    }
}

mod minute_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(super::MINUTE_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, super::MINUTE_FORMAT)
            .map_err(|e| serde::de::Error::custom(format!("invalid date {raw:?}: {e}")))
    }
}
