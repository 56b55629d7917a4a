//! Ingestion loop: source → decoder → buffer → writer.
//!
//! Each message is decoded and applied to the buffer before the next one is
//! requested; the only await point is the source. Any error ends the run and
//! whatever is still buffered is dropped.

use async_trait::async_trait;
use std::fmt;
use tracing::{error, info, warn};

use crate::recorder::buffer::{FlushReport, StreamBuffer};
use crate::recorder::decoder::{self, DecodeError};
use crate::recorder::writer::{BatchWriter, FilesystemError};
use crate::scrapers::aisstream_ws::ConnectionError;

/// Pull-based message transport.
#[async_trait]
pub trait MessageSource: Send {
    /// Next raw payload, or `None` once the stream has closed cleanly.
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>, ConnectionError>;
}

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub records: u64,
    pub flushes: u64,
    /// Records still buffered when the run ended, never written.
    pub discarded: usize,
}

pub struct Ingestor<W> {
    buffer: StreamBuffer,
    writer: W,
    records: u64,
    flushes: u64,
}

impl<W: BatchWriter> Ingestor<W> {
    pub fn new(writer: W) -> Self {
        Self {
            buffer: StreamBuffer::new(),
            writer,
            records: 0,
            flushes: 0,
        }
    }

    pub fn buffer(&self) -> &StreamBuffer {
        &self.buffer
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Decode one payload and add it to the buffer.
    pub fn ingest(&mut self, payload: &[u8]) -> Result<Option<FlushReport>, IngestError> {
        let record = decoder::decode(payload)?;

        if tracing::enabled!(tracing::Level::INFO) {
            info!(mmsi = %record.mmsi(), "📍 {}", record);
        }

        let report = self.buffer.add(record, &self.writer)?;
        self.records += 1;

        if let Some(report) = &report {
            self.flushes += 1;
            info!(
                bucket = %report.bucket,
                rows = report.rows,
                path = %report.path.display(),
                "💾 Flushed hour bucket"
            );
        }

        Ok(report)
    }

    /// Drive the buffer from `source` until it closes or fails.
    pub async fn run<S>(&mut self, source: &mut S) -> Result<IngestSummary, IngestError>
    where
        S: MessageSource + ?Sized,
    {
        let result = self.run_inner(source).await;

        let discarded = self.buffer.len();
        if discarded > 0 {
            warn!(
                discarded,
                bucket = ?self.buffer.bucket(),
                "Ingestion ended with unflushed records; they are not persisted"
            );
        }

        match result {
            Ok(()) => {
                info!(
                    records = self.records,
                    flushes = self.flushes,
                    "AIS stream closed"
                );
                Ok(IngestSummary {
                    records: self.records,
                    flushes: self.flushes,
                    discarded,
                })
            }
            Err(e) => {
                error!("Ingestion failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run_inner<S>(&mut self, source: &mut S) -> Result<(), IngestError>
    where
        S: MessageSource + ?Sized,
    {
        while let Some(payload) = source.next_message().await? {
            self.ingest(&payload)?;
        }
        Ok(())
    }
}

/// Anything that terminates an ingestion run.
#[derive(Debug)]
pub enum IngestError {
    Decode(DecodeError),
    Connection(ConnectionError),
    Filesystem(FilesystemError),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "decode error: {}", e),
            Self::Connection(e) => write!(f, "connection error: {}", e),
            Self::Filesystem(e) => write!(f, "filesystem error: {}", e),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(e) => Some(e),
            Self::Connection(e) => Some(e),
            Self::Filesystem(e) => Some(e),
        }
    }
}

impl From<DecodeError> for IngestError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<ConnectionError> for IngestError {
    fn from(e: ConnectionError) -> Self {
        Self::Connection(e)
    }
}

impl From<FilesystemError> for IngestError {
    fn from(e: FilesystemError) -> Self {
        Self::Filesystem(e)
    }
}
