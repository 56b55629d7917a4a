use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;

use crate::recorder::writer::DEFAULT_DATA_DIR;
use crate::scrapers::aisstream_ws::AISSTREAM_WS_URL;

/// Runtime configuration, read from the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub stream_url: String,
    pub data_dir: PathBuf,
}

impl Config {
    /// Expects `.env` files to have been loaded already.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let Some(api_key) = non_empty("AIS_STREAM_KEY") else {
            bail!("AIS_STREAM_KEY is not set");
        };

        let stream_url = non_empty("AIS_STREAM_URL").unwrap_or_else(|| AISSTREAM_WS_URL.to_string());

        let data_dir = non_empty("AIS_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        Ok(Self {
            api_key,
            stream_url,
            data_dir,
        })
    }
}
