//! Staleness decisions
//!
//! Determines which parts of a cached document need refetching. Details and
//! the feed list age as whole parts; videos age individually, so their
//! staleness is reported as an ordered ID list rather than a single flag.

use crate::config::CacheConfig;
use crate::data::CacheDocument;
use chrono::Utc;
use std::collections::BTreeSet;

/// One of the three independently-aged sections of a cached document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Part {
    Details,
    FeedList,
    Videos,
}

/// Decides which cached parts have expired
#[derive(Debug, Clone)]
pub struct FreshnessEngine {
    config: CacheConfig,
}

impl FreshnessEngine {
    /// Creates an engine with the given TTL configuration
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    /// Returns the set of parts that must be refetched
    ///
    /// A missing document means everything is stale. With `cache_disabled`
    /// all three parts are returned unconditionally (full refetch on every
    /// call). `Part::Videos` is present whenever at least one individual
    /// video is stale; callers that need the exact IDs use
    /// [`stale_video_ids`](Self::stale_video_ids).
    pub fn stale_parts(
        &self,
        document: Option<&CacheDocument>,
        cache_disabled: bool,
    ) -> BTreeSet<Part> {
        let mut parts = BTreeSet::new();

        let document = match document {
            Some(document) if !cache_disabled && !self.config.cache_disabled => document,
            _ => {
                parts.insert(Part::Details);
                parts.insert(Part::FeedList);
                parts.insert(Part::Videos);
                return parts;
            }
        };

        let now = Utc::now();

        match &document.details {
            Some(details) if now < details.expires_at => {}
            _ => {
                parts.insert(Part::Details);
            }
        }

        match &document.feed_list {
            Some(list) if now < list.expires_at => {}
            _ => {
                parts.insert(Part::FeedList);
            }
        }

        if !self.stale_video_ids(document, cache_disabled).is_empty() {
            parts.insert(Part::Videos);
        }

        parts
    }

    /// Returns the video IDs that must be refetched, in feed order
    ///
    /// Walks the advertised ID list and keeps every ID with no cached
    /// record, or whose record has expired. With `cache_disabled` the full
    /// advertised list is returned. An empty result means the caller must
    /// skip the video fetch round-trip entirely.
    pub fn stale_video_ids(&self, document: &CacheDocument, cache_disabled: bool) -> Vec<String> {
        let ids = document.feed_video_ids();

        if cache_disabled || self.config.cache_disabled {
            return ids.to_vec();
        }

        let now = Utc::now();
        ids.iter()
            .filter(|id| match document.video(id) {
                Some(video) => video.expires_at <= now,
                None => true,
            })
            .cloned()
            .collect()
    }
}
