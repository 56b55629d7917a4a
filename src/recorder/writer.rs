//! Hour-Partitioned Artifact Writer
//!
//! Batches land in `<root>/<year>/<month>/<day>/<hour>.csv.gz` (components
//! unpadded). Every flush appends one complete gzip member holding a header
//! row plus the batch, so an hour that is flushed twice yields a file with two
//! header rows. Multi-member gzip is read back as one stream by standard
//! tools and by `flate2::read::MultiGzDecoder`.
//!
//! The member is encoded in memory first and appended with a single write, so
//! a failure while encoding never touches the file.

use chrono::{DateTime, Utc};
use flate2::{write::GzEncoder, Compression};
use serde::Serialize;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::{Bucket, PositionRecord};

pub const DEFAULT_DATA_DIR: &str = "data";
pub const ARTIFACT_EXTENSION: &str = "csv.gz";
pub const COLUMNS: [&str; 8] = [
    "mmsi",
    "ship_name",
    "latitude",
    "longitude",
    "timestamp",
    "ifl_hash",
    "dup_hash",
    "ingested_at",
];

const ROW_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f%:z";

/// Destination for full-hour batches.
pub trait BatchWriter {
    /// Persist `records` under `bucket`, returning the artifact path.
    fn flush(&self, records: &[PositionRecord], bucket: Bucket) -> Result<PathBuf, FilesystemError>;
}

#[derive(Serialize)]
struct CsvRow<'a> {
    mmsi: &'a str,
    ship_name: &'a str,
    latitude: String,
    longitude: String,
    timestamp: String,
    ifl_hash: String,
    dup_hash: String,
    ingested_at: String,
}

impl<'a> CsvRow<'a> {
    fn from_record(record: &'a PositionRecord) -> Self {
        Self {
            mmsi: record.mmsi().as_str(),
            ship_name: record.ship_name(),
            latitude: format!("{:?}", record.latitude()),
            longitude: format!("{:?}", record.longitude()),
            timestamp: format_time(&record.timestamp()),
            ifl_hash: record.ifl_hash().to_string(),
            dup_hash: record.dup_hash().to_string(),
            ingested_at: format_time(&record.ingested_at()),
        }
    }
}

fn format_time(ts: &DateTime<Utc>) -> String {
    ts.format(ROW_TIME_FORMAT).to_string()
}

/// Writes gzip-compressed CSV artifacts under a root directory.
#[derive(Debug, Clone)]
pub struct PartitionedWriter {
    root: PathBuf,
}

impl Default for PartitionedWriter {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

impl PartitionedWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_path(&self, bucket: &Bucket) -> PathBuf {
        self.root
            .join(bucket.relative_dir())
            .join(format!("{}.{}", bucket.hour, ARTIFACT_EXTENSION))
    }

    fn encode_member(records: &[PositionRecord]) -> Result<Vec<u8>, EncodeError> {
        let encoder = GzEncoder::new(Vec::with_capacity(4096), Compression::default());
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(encoder);

        csv_writer.write_record(COLUMNS)?;
        for record in records {
            csv_writer.serialize(CsvRow::from_record(record))?;
        }

        let encoder = csv_writer
            .into_inner()
            .map_err(|e| EncodeError::Io(e.into_error()))?;
        Ok(encoder.finish()?)
    }
}

impl BatchWriter for PartitionedWriter {
    fn flush(&self, records: &[PositionRecord], bucket: Bucket) -> Result<PathBuf, FilesystemError> {
        let path = self.artifact_path(&bucket);

        let member = Self::encode_member(records).map_err(|source| FilesystemError::Encode {
            path: path.clone(),
            source,
        })?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| FilesystemError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| FilesystemError::Open {
                path: path.clone(),
                source,
            })?;

        file.write_all(&member)
            .and_then(|_| file.flush())
            .map_err(|source| FilesystemError::Write {
                path: path.clone(),
                source,
            })?;

        debug!(
            path = %path.display(),
            rows = records.len(),
            bytes = member.len(),
            "Appended gzip member"
        );

        Ok(path)
    }
}

/// Failure while turning a batch into CSV/gzip bytes.
#[derive(Debug)]
pub enum EncodeError {
    Csv(csv::Error),
    Io(io::Error),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv(e) => write!(f, "CSV encoding error: {}", e),
            Self::Io(e) => write!(f, "compression error: {}", e),
        }
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Csv(e) => Some(e),
            Self::Io(e) => Some(e),
        }
    }
}

impl From<csv::Error> for EncodeError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

impl From<io::Error> for EncodeError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Errors from flushing a batch to disk.
#[derive(Debug)]
pub enum FilesystemError {
    CreateDir { path: PathBuf, source: io::Error },
    Open { path: PathBuf, source: io::Error },
    Encode { path: PathBuf, source: EncodeError },
    Write { path: PathBuf, source: io::Error },
}

impl FilesystemError {
    pub fn path(&self) -> &Path {
        match self {
            Self::CreateDir { path, .. }
            | Self::Open { path, .. }
            | Self::Encode { path, .. }
            | Self::Write { path, .. } => path,
        }
    }
}

impl fmt::Display for FilesystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateDir { path, source } => {
                write!(f, "failed to create directory {}: {}", path.display(), source)
            }
            Self::Open { path, source } => {
                write!(f, "failed to open artifact {}: {}", path.display(), source)
            }
            Self::Encode { path, source } => {
                write!(f, "failed to encode batch for {}: {}", path.display(), source)
            }
            Self::Write { path, source } => {
                write!(f, "failed to append to {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for FilesystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } | Self::Open { source, .. } | Self::Write { source, .. } => {
                Some(source)
            }
            Self::Encode { source, .. } => Some(source),
        }
    }
}
