//! Hour-Bucketed Stream Buffer
//!
//! Accumulates records for the current hour bucket and decides when a batch
//! is handed to a [`BatchWriter`].
//!
//! ```text
//! UNSET --add(r)--> ACCUMULATING(bucket_of(r))
//! ACCUMULATING(b) --add(r), bucket_of(r) == b--> ACCUMULATING(b)
//! ACCUMULATING(b) --add(r), bucket_of(r) != b--> push r, flush all under b,
//!                                               clear, ACCUMULATING(bucket_of(r))
//! ```
//!
//! The record that crosses the boundary is pushed *before* the flush, so it is
//! written into the outgoing hour's artifact and the new bucket starts empty.

use std::path::PathBuf;

use crate::models::{Bucket, PositionRecord};
use crate::recorder::writer::{BatchWriter, FilesystemError};

/// Outcome of an `add` that crossed a bucket boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    /// Bucket the batch was written under (the outgoing one).
    pub bucket: Bucket,
    pub rows: usize,
    pub path: PathBuf,
}

#[derive(Debug, Default)]
pub struct StreamBuffer {
    bucket: Option<Bucket>,
    records: Vec<PositionRecord>,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the first record arrives.
    pub fn bucket(&self) -> Option<Bucket> {
        self.bucket
    }

    pub fn records(&self) -> &[PositionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append `record`, flushing through `writer` when its hour differs from
    /// the current bucket.
    ///
    /// On a failed flush the buffer keeps every record (the new one included)
    /// and the old bucket.
    pub fn add<W>(
        &mut self,
        record: PositionRecord,
        writer: &W,
    ) -> Result<Option<FlushReport>, FilesystemError>
    where
        W: BatchWriter + ?Sized,
    {
        let incoming = record.bucket();
        self.records.push(record);

        let current = match self.bucket {
            None => {
                self.bucket = Some(incoming);
                return Ok(None);
            }
            Some(current) if current == incoming => return Ok(None),
            Some(current) => current,
        };

        let path = writer.flush(&self.records, current)?;
        let rows = self.records.len();

        self.records.clear();
        self.bucket = Some(incoming);

        Ok(Some(FlushReport {
            bucket: current,
            rows,
            path,
        }))
    }
}
