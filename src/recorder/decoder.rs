//! AIS Envelope Decoder
//!
//! Turns one raw stream message into a [`PositionRecord`]. Only the
//! `MetaData` object of the envelope is consumed:
//!
//! ```json
//! {"MessageType": "PositionReport",
//!  "MetaData": {"MMSI": 259000420, "ShipName": "NORDKAPP",
//!               "latitude": 59.91, "longitude": 10.74,
//!               "time_utc": "2024-01-15 10:59:58.123456789 +0000 UTC"},
//!  "Message": {...}}
//! ```
//!
//! # Timestamp normalization
//!
//! `time_utc` must be exactly four space-separated tokens. The last three
//! characters of the time token are dropped before the tokens are reparsed,
//! so a nanosecond fraction is cut down to microseconds and a microsecond
//! fraction to milliseconds. What remains must carry between one and six
//! fractional digits.

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::fmt;

use crate::models::{Mmsi, PositionRecord};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %z";
const MAX_FRACTION_DIGITS: usize = 6;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "MetaData")]
    meta_data: MetaData,
}

#[derive(Debug, Deserialize)]
struct MetaData {
    #[serde(rename = "MMSI")]
    mmsi: Mmsi,
    #[serde(rename = "ShipName")]
    ship_name: String,
    #[serde(deserialize_with = "coerce_f64")]
    latitude: f64,
    #[serde(deserialize_with = "coerce_f64")]
    longitude: f64,
    time_utc: String,
}

/// Decode a message using the current wall clock as `ingested_at`.
pub fn decode(bytes: &[u8]) -> Result<PositionRecord, DecodeError> {
    decode_at(bytes, Utc::now())
}

/// Decode a message with an explicit ingestion instant.
pub fn decode_at(bytes: &[u8], ingested_at: DateTime<Utc>) -> Result<PositionRecord, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(DecodeError::InvalidUtf8)?;

    let envelope: Envelope = serde_json::from_str(text).map_err(DecodeError::from_json)?;
    let MetaData {
        mmsi,
        ship_name,
        latitude,
        longitude,
        time_utc,
    } = envelope.meta_data;

    let timestamp = normalize_timestamp(&time_utc)?;

    Ok(PositionRecord::new(
        mmsi,
        ship_name,
        latitude,
        longitude,
        timestamp,
        ingested_at,
    ))
}

/// Parse `"<date> <time.fraction> <±offset> UTC"` after dropping the last three
/// characters of the time token.
pub fn normalize_timestamp(raw: &str) -> Result<DateTime<Utc>, DecodeError> {
    let invalid = |reason: &'static str| DecodeError::InvalidTimestamp {
        raw: raw.to_string(),
        reason,
    };

    let tokens: Vec<&str> = raw.split(' ').collect();
    let [date, time, offset, marker] = tokens.as_slice() else {
        return Err(invalid("expected four space-separated tokens"));
    };
    if *marker != "UTC" {
        return Err(invalid("missing trailing UTC marker"));
    }

    let cut = time
        .char_indices()
        .rev()
        .nth(2)
        .map(|(idx, _)| idx)
        .ok_or_else(|| invalid("time token too short"))?;
    let truncated = &time[..cut];

    let (_, fraction) = truncated
        .split_once('.')
        .ok_or_else(|| invalid("time token has no fractional seconds"))?;
    if fraction.is_empty()
        || fraction.len() > MAX_FRACTION_DIGITS
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid("fractional seconds must be 1 to 6 digits after truncation"));
    }

    let reassembled = format!("{} {} {}", date, truncated, offset);
    DateTime::parse_from_str(&reassembled, TIMESTAMP_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| invalid("does not match YYYY-MM-DD HH:MM:SS.ffffff +ZZZZ UTC"))
}

/// Accept a JSON number, a numeric string or a boolean as `f64`.
fn coerce_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Number(f64),
        Text(String),
        Flag(bool),
    }

    match Scalar::deserialize(deserializer)? {
        Scalar::Number(v) => Ok(v),
        Scalar::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("could not convert string to float: {s:?}"))),
        Scalar::Flag(b) => Ok(if b { 1.0 } else { 0.0 }),
    }
}

/// Errors from decoding a single stream message.
#[derive(Debug)]
pub enum DecodeError {
    InvalidUtf8(std::str::Utf8Error),
    /// Not parseable as JSON at all (syntax error or truncated input).
    MalformedJson(serde_json::Error),
    /// Valid JSON, but `MetaData` or one of its fields is missing or mistyped.
    InvalidEnvelope(serde_json::Error),
    InvalidTimestamp { raw: String, reason: &'static str },
}

impl DecodeError {
    fn from_json(e: serde_json::Error) -> Self {
        match e.classify() {
            serde_json::error::Category::Data => Self::InvalidEnvelope(e),
            _ => Self::MalformedJson(e),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUtf8(e) => write!(f, "message is not valid UTF-8: {}", e),
            Self::MalformedJson(e) => write!(f, "malformed JSON message: {}", e),
            Self::InvalidEnvelope(e) => write!(f, "invalid position envelope: {}", e),
            Self::InvalidTimestamp { raw, reason } => {
                write!(f, "invalid time_utc {:?}: {}", raw, reason)
            }
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidUtf8(e) => Some(e),
            Self::MalformedJson(e) | Self::InvalidEnvelope(e) => Some(e),
            Self::InvalidTimestamp { .. } => None,
        }
    }
}
