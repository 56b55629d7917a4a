//! End-to-end tests for the ingestion pipeline
//!
//! Drives `Ingestor` with an in-memory message source and a real
//! `PartitionedWriter` rooted in a temp directory, then reads the gzip CSV
//! artifacts back.

use ais_recorder::models::Bucket;
use ais_recorder::recorder::{
    Ingestor, MessageSource, PartitionedWriter, StreamBuffer,
};
use ais_recorder::scrapers::ConnectionError;
use async_trait::async_trait;
use flate2::read::MultiGzDecoder;
use std::collections::VecDeque;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tempfile::tempdir;

struct InMemorySource {
    messages: VecDeque<Vec<u8>>,
}

impl InMemorySource {
    fn new(messages: Vec<String>) -> Self {
        Self {
            messages: messages.into_iter().map(String::into_bytes).collect(),
        }
    }
}

#[async_trait]
impl MessageSource for InMemorySource {
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>, ConnectionError> {
        Ok(self.messages.pop_front())
    }
}

fn envelope(mmsi: u64, time_utc: &str) -> String {
    format!(
        r#"{{"Message": {{"PositionReport": {{}}}}, "MessageType": "PositionReport",
            "MetaData": {{"MMSI": {mmsi}, "ShipName": "BOUNDARY TEST", "latitude": 59.9138,
            "longitude": 10.7387, "time_utc": "{time_utc}"}}}}"#
    )
}

fn read_rows(path: &Path) -> Vec<Vec<String>> {
    let mut text = String::new();
    MultiGzDecoder::new(File::open(path).unwrap())
        .read_to_string(&mut text)
        .unwrap();

    csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(text.as_bytes())
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

fn count_files(dir: &Path) -> usize {
    if !dir.exists() {
        return 0;
    }
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}

#[tokio::test]
async fn test_hour_boundary_flushes_all_three_records_into_outgoing_hour() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().join("data");

    let mut source = InMemorySource::new(vec![
        envelope(123456789, "2024-01-15 10:59:58.000000000 +0000 UTC"),
        envelope(123456789, "2024-01-15 10:59:59.500000000 +0000 UTC"),
        envelope(123456789, "2024-01-15 11:00:01.000000000 +0000 UTC"),
    ]);
    let mut ingestor = Ingestor::new(PartitionedWriter::new(&data_dir));

    let summary = ingestor.run(&mut source).await.unwrap();

    assert_eq!(summary.records, 3);
    assert_eq!(summary.flushes, 1);
    assert_eq!(summary.discarded, 0);
    assert!(ingestor.buffer().is_empty());
    assert_eq!(
        ingestor.buffer().bucket(),
        Some(Bucket {
            year: 2024,
            month: 1,
            day: 15,
            hour: 11
        })
    );

    let artifact = data_dir.join("2024").join("1").join("15").join("10.csv.gz");
    let rows = read_rows(&artifact);
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0][0], "mmsi");
    assert_eq!(rows[1][4], "2024-01-15 10:59:58.000000+00:00");
    assert_eq!(rows[2][4], "2024-01-15 10:59:59.500000+00:00");
    assert_eq!(rows[3][4], "2024-01-15 11:00:01.000000+00:00");
    assert!(rows[1..].iter().all(|row| row[0] == "123456789"));

    assert!(!data_dir.join("2024/1/15/11.csv.gz").exists());
    assert_eq!(count_files(&data_dir), 1);
}

#[tokio::test]
async fn test_zero_records_create_no_artifacts() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().join("data");

    let mut source = InMemorySource::new(vec![]);
    let mut ingestor = Ingestor::new(PartitionedWriter::new(&data_dir));

    let summary = ingestor.run(&mut source).await.unwrap();

    assert_eq!(summary.records, 0);
    assert!(!data_dir.exists());
}

#[tokio::test]
async fn test_single_hour_stream_writes_nothing() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().join("data");

    let mut source = InMemorySource::new(vec![
        envelope(1, "2024-01-15 10:00:00.000000000 +0000 UTC"),
        envelope(2, "2024-01-15 10:30:00.000000000 +0000 UTC"),
    ]);
    let mut ingestor = Ingestor::new(PartitionedWriter::new(&data_dir));

    let summary = ingestor.run(&mut source).await.unwrap();

    assert_eq!(summary.discarded, 2);
    assert!(!data_dir.exists());
}

#[tokio::test]
async fn test_restart_appends_to_existing_hour_artifact() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().join("data");

    for mmsi in [111111111u64, 222222222] {
        let mut source = InMemorySource::new(vec![
            envelope(mmsi, "2024-01-15 10:15:00.000000000 +0000 UTC"),
            envelope(mmsi, "2024-01-15 11:15:00.000000000 +0000 UTC"),
        ]);
        let mut ingestor = Ingestor::new(PartitionedWriter::new(&data_dir));
        ingestor.run(&mut source).await.unwrap();
    }

    let rows = read_rows(&data_dir.join("2024/1/15/10.csv.gz"));
    let mmsis: Vec<&str> = rows.iter().map(|row| row[0].as_str()).collect();

    assert_eq!(
        mmsis,
        vec!["mmsi", "111111111", "111111111", "mmsi", "222222222", "222222222"]
    );
}

#[test]
fn test_buffer_and_writer_compose_without_ingestor() {
    let dir = tempdir().unwrap();
    let writer = PartitionedWriter::new(dir.path());
    let mut buffer = StreamBuffer::new();

    let first = ais_recorder::recorder::decode(
        envelope(5, "2024-02-29 23:59:59.999999999 +0000 UTC").as_bytes(),
    )
    .unwrap();
    let second = ais_recorder::recorder::decode(
        envelope(5, "2024-03-01 00:00:00.000000000 +0000 UTC").as_bytes(),
    )
    .unwrap();

    assert!(buffer.add(first, &writer).unwrap().is_none());
    let report = buffer.add(second, &writer).unwrap().unwrap();

    assert_eq!(report.path, dir.path().join("2024/2/29/23.csv.gz"));
    assert_eq!(report.rows, 2);
    assert_eq!(writer.artifact_path(&report.bucket), report.path);
}
