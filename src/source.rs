//! HTTP client for the data site.

use std::io::{self, Read, Seek, Write};

use anyhow::{Context, Result};
use pcr_ics_core::schedule::ScheduleFeed;
use reqwest::Client;
use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::debug;

const USER_AGENT: &str = concat!("pcr-ics/", env!("CARGO_PKG_VERSION"));

/// Buffer size handed to the brotli decoder
const DECOMPRESS_BUFFER_SIZE: usize = 8192;

/// `last_version_cn.json`
#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "TruthVersion")]
    truth_version: String,
}

pub struct FeedClient {
    http: Client,
    version_url: String,
    database_url: String,
}

impl FeedClient {
    pub fn new(version_url: &str, database_url: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(FeedClient {
            http,
            version_url: version_url.to_string(),
            database_url: database_url.to_string(),
        })
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Current database version published by the data site
    pub async fn latest_version(&self) -> Result<String> {
        let info: VersionInfo = self
            .http
            .get(&self.version_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to fetch data version from {}", self.version_url))?
            .json::<VersionInfo>()
            .await
            .with_context(|| format!("Invalid version document at {}", self.version_url))?;

        Ok(info.truth_version)
    }

    /// Download the brotli-compressed master database into a temporary file.
    ///
    /// The file is deleted when the returned handle is dropped.
    pub async fn download_database(&self) -> Result<NamedTempFile> {
        let mut response = self
            .http
            .get(&self.database_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to fetch database from {}", self.database_url))?;

        let mut compressed = tempfile::tempfile().context("Failed to create temporary file")?;
        let mut downloaded = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("Failed to download database from {}", self.database_url))?
        {
            compressed
                .write_all(&chunk)
                .context("Failed to buffer database download")?;
            downloaded += chunk.len();
        }
        compressed.rewind().context("Failed to buffer database download")?;
        debug!("downloaded {} compressed bytes", downloaded);

        let mut database = NamedTempFile::new().context("Failed to create temporary file")?;
        let size = decompress(compressed, database.as_file_mut())
            .with_context(|| format!("Database at {} is not valid brotli", self.database_url))?;
        debug!("decompressed database to {} bytes", size);

        Ok(database)
    }

    /// Download the master database and read its schedule tables
    pub async fn fetch_schedule(&self, truth_version: &str) -> Result<ScheduleFeed> {
        let database = self.download_database().await?;

        ScheduleFeed::from_database(database.path(), truth_version)
            .with_context(|| format!("Failed to read schedule tables from {}", self.database_url))
    }
}

/// Stream brotli-compressed bytes from `compressed` into `target`
fn decompress(compressed: impl Read, target: &mut impl Write) -> io::Result<u64> {
    let mut decoder = brotli::Decompressor::new(compressed, DECOMPRESS_BUFFER_SIZE);
    let size = io::copy(&mut decoder, target)?;
    target.flush()?;
    Ok(size)
}

/// GET a URL as UTF-8 text, treating HTTP error statuses as failures
pub async fn fetch_text(http: &Client, url: &str) -> Result<String> {
    http.get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("Request to {} failed", url))?
        .text()
        .await
        .with_context(|| format!("Failed to read response body from {}", url))
}
