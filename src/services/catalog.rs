//! Catalog refresh service
//!
//! Each refresh is one full transformation run: reload remap rules, fetch
//! every source, aggregate, then swap the published catalog. A failed run
//! leaves the previously published catalog in place.

use anyhow::{Context, Result};
use sha1::{Digest, Sha1};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time;

use crate::config::Config;
use crate::models::{CatalogSnapshot, PublishedCatalog};
use crate::services::aggregator::aggregate;
use crate::services::metrics;
use crate::services::remap::RuleSet;
use crate::services::source_fetcher::SourceFetcher;

/// SHA1 of the serialized snapshot, stable across identical runs
pub fn snapshot_revision(snapshot: &CatalogSnapshot) -> Result<String> {
    let bytes = serde_json::to_vec(snapshot).context("Failed to serialize catalog")?;
    let mut hasher = Sha1::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub struct CatalogService {
    sources: Vec<String>,
    remap_file: PathBuf,
    epg_url: Option<String>,
    fetcher: SourceFetcher,
    published: RwLock<Option<Arc<PublishedCatalog>>>,
    /// Serializes refresh runs
    refresh_lock: Mutex<()>,
}

impl CatalogService {
    pub fn new(
        sources: Vec<String>,
        remap_file: impl Into<PathBuf>,
        epg_url: Option<String>,
        fetcher: SourceFetcher,
    ) -> Self {
        Self {
            sources,
            remap_file: remap_file.into(),
            epg_url,
            fetcher,
            published: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = SourceFetcher::from_config(config)?;
        Ok(Self::new(
            config.playlist_sources.clone(),
            &config.remap_file,
            config.epg_url.clone(),
            fetcher,
        ))
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Currently published catalog, if any run has succeeded
    pub async fn current(&self) -> Option<Arc<PublishedCatalog>> {
        self.published.read().await.clone()
    }

    /// Run one transformation and publish the result
    pub async fn refresh(&self) -> Result<Arc<PublishedCatalog>> {
        let _guard = self.refresh_lock.lock().await;

        let rules = RuleSet::load(&self.remap_file).await;
        if rules.is_empty() {
            tracing::debug!("No remap rules in effect");
        }

        let documents = match self.fetcher.fetch_all(&self.sources).await {
            Ok(documents) => documents,
            Err(e) => {
                metrics::REFRESH_FAILURES.inc();
                return Err(e).context("Failed to fetch playlist sources");
            }
        };

        let run = aggregate(documents.as_slice(), &rules);
        if run.conflicts > 0 {
            tracing::warn!("{} remap conflicts in this run", run.conflicts);
        }
        let snapshot = run.snapshot.with_fallback_guide_url(self.epg_url.as_deref());
        let revision = snapshot_revision(&snapshot)?;

        tracing::info!(
            "Catalog built: {} channels, {} streams, {} genres from {} sources (revision {})",
            snapshot.channels.len(),
            snapshot.stream_count(),
            snapshot.genres.len(),
            documents.len(),
            revision
        );
        if let Some(ref guide_url) = snapshot.guide_url {
            tracing::info!("Guide data: {}", guide_url);
        }

        let published = Arc::new(PublishedCatalog {
            snapshot,
            revision,
            refreshed_at: chrono::Utc::now().timestamp_millis(),
            source_count: documents.len(),
            remap_rules: rules.len(),
        });

        *self.published.write().await = Some(published.clone());

        metrics::REFRESH_TOTAL.inc();
        metrics::CHANNELS.set(published.snapshot.channels.len() as i64);

        Ok(published)
    }
}

/// Start the background refresh task
///
/// Runs immediately on startup, then periodically at the configured interval.
/// This should be spawned as a background task using `tokio::spawn`.
pub async fn start_refresh_task(service: Arc<CatalogService>, interval_secs: u64) {
    tracing::info!(
        "Starting refresh task (interval: {}s, sources: {})",
        interval_secs,
        service.source_count()
    );

    // First tick completes immediately
    let mut interval = time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        interval.tick().await;

        if let Err(e) = service.refresh().await {
            tracing::error!("Catalog refresh failed, keeping previous catalog: {:#}", e);
        }
    }
}
