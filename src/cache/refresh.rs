//! Refresh orchestration
//!
//! Drives one refresh cycle for a feed: load the cached document, work out
//! which parts are stale, fetch only those through the source, merge, and
//! persist once if anything changed. Refreshes for the same identity are
//! serialized so concurrent requests for a hot feed cannot duplicate
//! quota-spending fetches or clobber each other's save.

use crate::cache::freshness::{FreshnessEngine, Part};
use crate::cache::merge::Merger;
use crate::cache::store::{CacheStore, StoreError};
use crate::config::CacheConfig;
use crate::data::{CacheDocument, FeedIdentity, Source, SourceError};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Errors that can abort a refresh cycle
///
/// Any upstream failure aborts the whole refresh: the engine never serves a
/// document built from only some of the intended parts when a fetch
/// genuinely failed. Parts merged before the failure stay in memory but are
/// not persisted.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// An upstream fetch failed
    #[error("source fetch failed: {0}")]
    Source(#[from] SourceError),

    /// An upstream fetch exceeded the configured time bound
    #[error("source fetch timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The merged document could not be persisted
    #[error("cache persist failed: {0}")]
    Store(#[from] StoreError),
}

/// Orchestrates load → freshness check → fetch → merge → save
///
/// One coordinator serves all feeds; per-identity locks live in an internal
/// registry keyed by cache key. Already-fresh documents are returned on a
/// lock-free fast path.
pub struct RefreshCoordinator {
    store: Arc<dyn CacheStore>,
    source: Arc<dyn Source>,
    config: CacheConfig,
    freshness: FreshnessEngine,
    merger: Merger,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RefreshCoordinator {
    /// Creates a coordinator over the given store and source
    pub fn new(store: Arc<dyn CacheStore>, source: Arc<dyn Source>, config: CacheConfig) -> Self {
        Self {
            store,
            source,
            freshness: FreshnessEngine::new(config.clone()),
            merger: Merger::new(config.clone()),
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Brings the cached document for an identity up to date and returns it
    ///
    /// Fetches only the stale parts. When every part is still fresh this
    /// performs zero source calls and zero saves. Stale documents are
    /// refreshed under a per-identity lock, with the staleness check
    /// repeated after acquisition so the loser of a race reuses the
    /// winner's work instead of refetching.
    pub async fn refresh(&self, identity: &FeedIdentity) -> Result<CacheDocument, RefreshError> {
        // Fast path: a fully fresh document needs no lock and no fetches.
        if let Some(document) = self.store.load(identity).await {
            if self
                .freshness
                .stale_parts(Some(&document), self.config.cache_disabled)
                .is_empty()
            {
                debug!(feed = %identity, "document fully fresh, serving from cache");
                return Ok(document);
            }
        }

        let lock = self.lock_for(identity).await;
        let _guard = lock.lock().await;

        let mut document = self
            .store
            .load(identity)
            .await
            .unwrap_or_else(CacheDocument::empty);

        let dirty = self.refresh_parts(identity, &mut document).await?;

        if dirty {
            self.store.save(identity, &document).await?;
        } else {
            debug!(feed = %identity, "nothing changed, skipping save");
        }

        Ok(document)
    }

    /// Fetches and merges every stale part; returns whether anything changed
    ///
    /// Part order is load-bearing: the feed list is merged (and pruned)
    /// before video staleness is computed, because pruning changes which
    /// IDs are still relevant.
    async fn refresh_parts(
        &self,
        identity: &FeedIdentity,
        document: &mut CacheDocument,
    ) -> Result<bool, RefreshError> {
        let parts = self
            .freshness
            .stale_parts(Some(document), self.config.cache_disabled);
        debug!(feed = %identity, ?parts, "refreshing stale parts");

        let mut dirty = false;

        if parts.contains(&Part::FeedList) {
            let ids = self
                .bounded(self.source.fetch_feed_list(identity))
                .await?;
            self.merger.merge_feed_list(document, ids);
            dirty = true;
        }

        if parts.contains(&Part::Details) {
            let token = document
                .details
                .as_ref()
                .and_then(|d| d.conditional_token.clone());
            let result = self
                .bounded(self.source.fetch_details(identity, token.as_deref()))
                .await?;
            if result.not_modified {
                debug!(feed = %identity, "details unchanged upstream, extending TTL");
            }
            self.merger.merge_details(document, identity, result);
            // A TTL extension counts as a mutation worth persisting,
            // otherwise the very next request re-checks upstream.
            dirty = true;
        }

        let stale_ids = self
            .freshness
            .stale_video_ids(document, self.config.cache_disabled);
        if !stale_ids.is_empty() {
            debug!(feed = %identity, count = stale_ids.len(), "fetching stale videos in one batch");
            let fresh = self.bounded(self.source.fetch_videos(&stale_ids)).await?;
            if fresh.len() < stale_ids.len() {
                warn!(
                    feed = %identity,
                    requested = stale_ids.len(),
                    received = fresh.len(),
                    "video batch came back short"
                );
            }
            self.merger.merge_videos(document, fresh);
            dirty = true;
        }

        Ok(dirty)
    }

    /// Bounds a source call with the configured timeout
    ///
    /// An elapsed timeout behaves exactly like a fetch error: it aborts the
    /// refresh and nothing merged so far is persisted.
    async fn bounded<T>(
        &self,
        fetch: impl Future<Output = Result<T, SourceError>>,
    ) -> Result<T, RefreshError> {
        match tokio::time::timeout(self.config.source_timeout, fetch).await {
            Ok(result) => result.map_err(RefreshError::Source),
            Err(_) => Err(RefreshError::Timeout(self.config.source_timeout)),
        }
    }

    /// Returns the lock serializing refreshes for an identity
    async fn lock_for(&self, identity: &FeedIdentity) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(identity.cache_key())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
