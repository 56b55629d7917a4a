//! Position report recording pipeline.
//!
//! - `decoder`: raw envelope → [`PositionRecord`](crate::models::PositionRecord)
//! - `fingerprint`: coarse and exact content hashes
//! - `buffer`: hour-bucketed accumulator and rollover decision
//! - `writer`: gzip CSV artifacts partitioned by year/month/day/hour
//! - `ingest`: the loop tying a message source to the above

pub mod buffer;
pub mod decoder;
pub mod fingerprint;
pub mod ingest;
pub mod writer;

pub use buffer::{FlushReport, StreamBuffer};
pub use decoder::{decode, decode_at, DecodeError};
pub use fingerprint::Fingerprint;
pub use ingest::{IngestError, IngestSummary, Ingestor, MessageSource};
pub use writer::{BatchWriter, FilesystemError, PartitionedWriter};
