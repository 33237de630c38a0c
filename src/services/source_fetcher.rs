//! Playlist source retrieval
//!
//! Remote sources are fetched over HTTP with retry; every successful body is
//! kept on disk so a later failed fetch can fall back to the last good copy.
//! Anything that is not an http(s) URL is read as a local file.

use anyhow::Context;
use futures::future::try_join_all;
use futures::StreamExt;
use reqwest::Client;
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;

use crate::config::Config;
use crate::error::SourceError;

/// Generate SHA1 hash of URL for cache key
pub fn hash_url(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)
}

fn is_remote(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Decode a document body as UTF-8, dropping a leading BOM
fn decode(location: &str, bytes: Vec<u8>) -> Result<String, SourceError> {
    let text = String::from_utf8(bytes).map_err(|_| SourceError::InvalidUtf8 {
        location: location.to_string(),
    })?;

    Ok(match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}

/// Exponential retry delay: 500ms doubling per attempt, capped at 10s
fn backoff_ms(attempt: u32) -> u64 {
    1u64.checked_shl(attempt)
        .unwrap_or(u64::MAX)
        .saturating_mul(500)
        .min(10_000)
}

/// Fetches the raw text of playlist sources
pub struct SourceFetcher {
    client: Client,
    cache_dir: PathBuf,
    max_retries: u32,
    max_m3u_size_mb: usize,
}

impl SourceFetcher {
    pub fn new(
        user_agent: &str,
        timeout_ms: u64,
        max_retries: u32,
        max_m3u_size_mb: usize,
        cache_dir: impl Into<PathBuf>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_millis(timeout_ms))
            .gzip(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            cache_dir: cache_dir.into(),
            max_retries,
            max_m3u_size_mb,
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(
            &config.user_agent,
            config.fetch_timeout_ms,
            config.max_retries,
            config.max_m3u_size_mb,
            &config.source_cache_dir,
        )
    }

    /// Fetch all locations concurrently. Output order follows `locations`.
    /// Any unreadable source fails the whole batch.
    pub async fn fetch_all(&self, locations: &[String]) -> Result<Vec<String>, SourceError> {
        try_join_all(locations.iter().map(|location| self.fetch(location))).await
    }

    pub async fn fetch(&self, location: &str) -> Result<String, SourceError> {
        if !is_remote(location) {
            let path = location.strip_prefix("file://").unwrap_or(location);
            return read_local(path).await;
        }

        match self.fetch_with_retry(location).await {
            Ok(text) => {
                self.store_cached(location, &text).await;
                Ok(text)
            }
            Err(err) => match self.read_cached(location).await {
                Some(text) => {
                    tracing::warn!("Using cached copy of {}: {}", location, err);
                    Ok(text)
                }
                None => Err(SourceError::Unavailable {
                    location: location.to_string(),
                    reason: err.to_string(),
                }),
            },
        }
    }

    async fn fetch_with_retry(&self, location: &str) -> Result<String, SourceError> {
        let mut attempt = 0u32;

        loop {
            match self.fetch_once(location).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    let delay_ms = backoff_ms(attempt);
                    tracing::warn!(
                        "fetch_retry" = attempt + 1,
                        reason = %err,
                        "backoff_ms" = delay_ms
                    );
                    sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn fetch_once(&self, location: &str) -> Result<String, SourceError> {
        let network = |e: reqwest::Error| SourceError::Network {
            location: location.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(location).send().await.map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                location: location.to_string(),
                status: status.as_u16(),
            });
        }

        let max_bytes = (self.max_m3u_size_mb as u64) * 1024 * 1024;
        let too_large = |len: u64| SourceError::TooLarge {
            location: location.to_string(),
            size_mb: len as f64 / 1024f64 / 1024f64,
            limit_mb: self.max_m3u_size_mb,
        };

        if let Some(len) = response.content_length() {
            if len > max_bytes {
                return Err(too_large(len));
            }
            tracing::info!("Playlist size: {:.2} MB ({})", len as f64 / 1024.0 / 1024.0, location);
        }

        let mut body = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(network)?;
            if (body.len() + chunk.len()) as u64 > max_bytes {
                return Err(too_large((body.len() + chunk.len()) as u64));
            }
            body.extend_from_slice(&chunk);
        }

        decode(location, body)
    }

    fn cache_path(&self, location: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.m3u", hash_url(location)))
    }

    async fn store_cached(&self, location: &str, text: &str) {
        let path = self.cache_path(location);
        let result = async {
            fs::create_dir_all(&self.cache_dir).await?;
            let tmp = path.with_extension("tmp");
            fs::write(&tmp, text).await?;
            fs::rename(&tmp, &path).await
        }
        .await;

        if let Err(e) = result {
            tracing::warn!("Failed to cache {} at {}: {}", location, path.display(), e);
        }
    }

    async fn read_cached(&self, location: &str) -> Option<String> {
        let bytes = fs::read(self.cache_path(location)).await.ok()?;
        decode(location, bytes).ok()
    }
}

async fn read_local(path: &str) -> Result<String, SourceError> {
    let bytes = fs::read(Path::new(path)).await.map_err(|source| SourceError::Io {
        location: path.to_string(),
        source,
    })?;
    decode(path, bytes)
}
