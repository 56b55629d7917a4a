//! Position Report Fingerprints
//!
//! Two content hashes per record, both XXH3-128 over a canonical text key:
//!
//! ```text
//! ifl_hash = H(mmsi || lat:.4 || lon:.4 || "YYYY-MM-DD HH:MM")
//! dup_hash = H(mmsi || lat    || lon    || "YYYY-MM-DD HH:MM:SS.ffffff")
//! ```
//!
//! `ifl_hash` collides for reports from the same vessel within the same minute
//! and roughly 0.00005 degrees of each other. `dup_hash` collides only for
//! value-identical reports. XXH3 is seedless here, so both values are stable
//! across processes and machines.

use chrono::{DateTime, Utc};
use std::fmt;
use xxhash_rust::xxh3::xxh3_128;

use crate::models::Mmsi;

/// 128-bit content fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u128);

impl Fingerprint {
    pub fn of(key: &str) -> Self {
        Self(xxh3_128(key.as_bytes()))
    }

    pub fn as_u128(&self) -> u128 {
        self.0
    }
}

/// 32 lowercase hex digits, big-endian.
impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.to_be_bytes()))
    }
}

pub fn ifl_hash(mmsi: &Mmsi, latitude: f64, longitude: f64, timestamp: &DateTime<Utc>) -> Fingerprint {
    Fingerprint::of(&ifl_key(mmsi, latitude, longitude, timestamp))
}

pub fn dup_hash(mmsi: &Mmsi, latitude: f64, longitude: f64, timestamp: &DateTime<Utc>) -> Fingerprint {
    Fingerprint::of(&dup_key(mmsi, latitude, longitude, timestamp))
}

fn ifl_key(mmsi: &Mmsi, latitude: f64, longitude: f64, timestamp: &DateTime<Utc>) -> String {
    format!(
        "{}{:.4}{:.4}{}",
        mmsi,
        latitude,
        longitude,
        timestamp.format("%Y-%m-%d %H:%M")
    )
}

fn dup_key(mmsi: &Mmsi, latitude: f64, longitude: f64, timestamp: &DateTime<Utc>) -> String {
    // Debug keeps the shortest round-trip digits and always a fractional part.
    format!(
        "{}{:?}{:?}{}",
        mmsi,
        latitude,
        longitude,
        timestamp.format("%Y-%m-%d %H:%M:%S%.6f")
    )
}
