use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::recorder::fingerprint::{self, Fingerprint};

/// Maritime Mobile Service Identity, kept as the decimal text the provider sent.
///
/// The upstream feed delivers it either as a JSON integer or as a numeric
/// string. No checksum or range validation is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Mmsi(String);

impl Mmsi {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for Mmsi {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Mmsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Mmsi {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawMmsi {
            Unsigned(u64),
            Signed(i64),
            Text(String),
        }

        Ok(match RawMmsi::deserialize(deserializer)? {
            RawMmsi::Unsigned(v) => Self(v.to_string()),
            RawMmsi::Signed(v) => Self(v.to_string()),
            RawMmsi::Text(v) => Self(v),
        })
    }
}

/// Hour-granularity storage key: one artifact per bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bucket {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
}

impl Bucket {
    pub fn of(timestamp: &DateTime<Utc>) -> Self {
        Self {
            year: timestamp.year(),
            month: timestamp.month(),
            day: timestamp.day(),
            hour: timestamp.hour(),
        }
    }

    /// `<year>/<month>/<day>`, components unpadded.
    pub fn relative_dir(&self) -> PathBuf {
        PathBuf::from(self.year.to_string())
            .join(self.month.to_string())
            .join(self.day.to_string())
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:02}-{:02} {:02}:00",
            self.year, self.month, self.day, self.hour
        )
    }
}

/// A single decoded vessel position report.
///
/// Both fingerprints are derived in [`PositionRecord::new`] and the fields are
/// only readable afterwards, so a record can never disagree with its hashes.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRecord {
    mmsi: Mmsi,
    ship_name: String,
    latitude: f64,
    longitude: f64,
    timestamp: DateTime<Utc>,
    ifl_hash: Fingerprint,
    dup_hash: Fingerprint,
    ingested_at: DateTime<Utc>,
}

impl PositionRecord {
    pub fn new(
        mmsi: Mmsi,
        ship_name: String,
        latitude: f64,
        longitude: f64,
        timestamp: DateTime<Utc>,
        ingested_at: DateTime<Utc>,
    ) -> Self {
        let ifl_hash = fingerprint::ifl_hash(&mmsi, latitude, longitude, &timestamp);
        let dup_hash = fingerprint::dup_hash(&mmsi, latitude, longitude, &timestamp);

        Self {
            mmsi,
            ship_name,
            latitude,
            longitude,
            timestamp,
            ifl_hash,
            dup_hash,
            ingested_at,
        }
    }

    pub fn mmsi(&self) -> &Mmsi {
        &self.mmsi
    }

    pub fn ship_name(&self) -> &str {
        &self.ship_name
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn ifl_hash(&self) -> Fingerprint {
        self.ifl_hash
    }

    pub fn dup_hash(&self) -> Fingerprint {
        self.dup_hash
    }

    pub fn ingested_at(&self) -> DateTime<Utc> {
        self.ingested_at
    }

    pub fn bucket(&self) -> Bucket {
        Bucket::of(&self.timestamp)
    }
}

/// Per-record status line.
impl fmt::Display for PositionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ship Name: {} | Latitude: {:.6} | Longitude: {:.6} | Timestamp: {}",
            self.ship_name,
            self.latitude,
            self.longitude,
            self.timestamp.format("%Y-%m-%d %H:%M %z")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_mmsi_accepts_integer_and_string() {
        let from_int: Mmsi = serde_json::from_str("259000420").unwrap();
        let from_str: Mmsi = serde_json::from_str("\"259000420\"").unwrap();

        assert_eq!(from_int, from_str);
        assert_eq!(from_int.as_str(), "259000420");
    }

    #[test]
    fn test_mmsi_string_is_kept_verbatim() {
        let mmsi: Mmsi = serde_json::from_str("\"002570001\"").unwrap();
        assert_eq!(mmsi.to_string(), "002570001");
    }

    #[test]
    fn test_bucket_dir_is_unpadded() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 5, 7, 30, 0).unwrap();
        let bucket = Bucket::of(&ts);

        assert_eq!(
            bucket,
            Bucket {
                year: 2024,
                month: 1,
                day: 5,
                hour: 7
            }
        );
        assert_eq!(bucket.relative_dir(), PathBuf::from("2024").join("1").join("5"));
    }

    #[test]
    fn test_bucket_compares_date_and_hour() {
        let a = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 16, 10, 0, 0).unwrap();

        assert_ne!(Bucket::of(&a), Bucket::of(&b));
    }

    #[test]
    fn test_status_line() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 59, 58).unwrap();
        let record = PositionRecord::new(
            Mmsi::from(123456789),
            "NORDKAPP".to_string(),
            59.1234567,
            10.7654321,
            ts,
            ts,
        );

        assert_eq!(
            record.to_string(),
            "Ship Name: NORDKAPP | Latitude: 59.123457 | Longitude: 10.765432 | Timestamp: 2024-01-15 10:59 +0000"
        );
    }
}
