//! AIS Stream Recorder Library
//!
//! Decodes vessel position reports from a streaming feed, fingerprints them
//! and writes hourly gzip CSV artifacts. The binary in `main.rs` wires the
//! aisstream.io transport to the ingestion loop.

pub mod config;
pub mod models;
pub mod recorder;
pub mod scrapers;
