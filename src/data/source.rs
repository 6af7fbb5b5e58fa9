//! Upstream source boundary
//!
//! This module defines the `Source` trait that the cache engine fetches
//! through, along with the typed results each fetch returns. Implementations
//! own all transport concerns (HTTP, URL construction, response parsing,
//! retries); the engine only sees validated data or a typed error.

use crate::data::{FeedIdentity, LiveStreamState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors an upstream fetch can surface to the engine
///
/// Anything transient (network failure, upstream 5xx) is reported as
/// `Transient`; the engine propagates it unchanged and leaves retry policy
/// to the caller. A missing upstream entity is terminal for the request and
/// is never retried by the engine.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The channel or playlist does not exist upstream
    #[error("no upstream entity found for {id}")]
    NotFound {
        /// The ID that failed to resolve
        id: String,
    },

    /// Network failure, timeout, or upstream server error
    #[error("transient upstream failure: {0}")]
    Transient(String),
}

/// Fresh channel/playlist metadata as returned by a details fetch
#[derive(Debug, Clone, PartialEq)]
pub struct DetailsData {
    /// Display title
    pub title: String,
    /// Description text
    pub description: String,
    /// Avatar or cover thumbnail URL
    pub thumbnail_url: String,
    /// Canonical upstream URL
    pub canonical_url: String,
}

/// Result of a conditional details fetch
///
/// When the replayed conditional token still matches upstream state, the
/// source reports `not_modified` and omits the body; the engine then
/// extends the cached record's TTL without re-parsing anything.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailsFetchResult {
    /// True when upstream reported the cached state as still current
    pub not_modified: bool,
    /// Fetched metadata; always absent when `not_modified` is true
    pub details: Option<DetailsData>,
    /// Replacement conditional token to replay on the next fetch
    pub new_token: Option<String>,
}

impl DetailsFetchResult {
    /// Builds a "still current" result, optionally rotating the token
    pub fn not_modified(new_token: Option<String>) -> Self {
        Self {
            not_modified: true,
            details: None,
            new_token,
        }
    }

    /// Builds a result carrying freshly fetched metadata
    pub fn fresh(details: DetailsData, new_token: Option<String>) -> Self {
        Self {
            not_modified: false,
            details: Some(details),
            new_token,
        }
    }
}

/// Fresh per-video metadata as returned by a batched video fetch
#[derive(Debug, Clone, PartialEq)]
pub struct VideoData {
    /// Upstream video ID
    pub id: String,
    /// Watch page URL
    pub url: String,
    /// Video title
    pub title: String,
    /// Video description
    pub description: String,
    /// Uploader display name
    pub author: String,
    /// Publication time
    pub published_at: DateTime<Utc>,
    /// Tags in upstream order
    pub tags: Vec<String>,
    /// Duration in seconds; absent for streams that have not started
    pub duration_seconds: Option<u32>,
    /// Thumbnail image URL
    pub thumbnail_url: String,
    /// Live-broadcast state
    pub live_stream_state: LiveStreamState,
    /// Scheduled start for upcoming broadcasts
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Upstream fetch operations the refresh cycle depends on
///
/// One implementation per upstream API. All methods are quota-relevant:
/// the engine calls each at most once per refresh, and `fetch_videos` is
/// always a single batched call no matter how many IDs are stale.
#[async_trait]
pub trait Source: Send + Sync {
    /// Fetches channel/playlist metadata, replaying the conditional token
    /// from the previous fetch when one is cached
    async fn fetch_details(
        &self,
        identity: &FeedIdentity,
        conditional_token: Option<&str>,
    ) -> Result<DetailsFetchResult, SourceError>;

    /// Fetches the lightweight feed: the ordered list of currently
    /// advertised video IDs, deduplicated, in upstream order
    async fn fetch_feed_list(&self, identity: &FeedIdentity) -> Result<Vec<String>, SourceError>;

    /// Fetches metadata for every requested video in one batched call
    ///
    /// IDs the upstream no longer knows about may simply be missing from
    /// the result; the engine never interprets omission as deletion.
    async fn fetch_videos(&self, ids: &[String]) -> Result<Vec<VideoData>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_modified_result_carries_no_details() {
        let result = DetailsFetchResult::not_modified(Some("etag-2".to_string()));

        assert!(result.not_modified);
        assert!(result.details.is_none());
        assert_eq!(result.new_token.as_deref(), Some("etag-2"));
    }

    #[test]
    fn test_fresh_result_carries_details() {
        let details = DetailsData {
            title: "Channel".to_string(),
            description: String::new(),
            thumbnail_url: "https://example.com/t.jpg".to_string(),
            canonical_url: "https://www.youtube.com/channel/UC1".to_string(),
        };
        let result = DetailsFetchResult::fresh(details.clone(), None);

        assert!(!result.not_modified);
        assert_eq!(result.details, Some(details));
        assert!(result.new_token.is_none());
    }

    #[test]
    fn test_source_error_messages_name_the_identity() {
        let err = SourceError::NotFound {
            id: "UCmissing".to_string(),
        };
        assert!(err.to_string().contains("UCmissing"));

        let err = SourceError::Transient("connection reset".to_string());
        assert!(err.to_string().contains("connection reset"));
    }
}
