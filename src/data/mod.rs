//! Core data model for the feed cache engine
//!
//! This module contains the types that make up one cached feed document:
//! the identity of the tracked channel or playlist, the three
//! independently-aged parts (details, feed list, videos), and the aggregate
//! document that is persisted as a single JSON object.

pub mod source;

pub use source::{DetailsData, DetailsFetchResult, Source, SourceError, VideoData};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a feed tracks a channel's uploads or a curated playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedKind {
    Channel,
    Playlist,
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedKind::Channel => write!(f, "channel"),
            FeedKind::Playlist => write!(f, "playlist"),
        }
    }
}

/// Identifies one tracked feed: a channel or playlist ID plus its kind
///
/// Immutable once a document has been created for it. The identity
/// determines both the cache key and which upstream endpoints the source
/// implementation talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedIdentity {
    /// Upstream channel or playlist ID
    pub id: String,
    /// Whether the ID names a channel or a playlist
    pub kind: FeedKind,
}

impl FeedIdentity {
    /// Creates an identity for a channel ID
    pub fn channel(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: FeedKind::Channel,
        }
    }

    /// Creates an identity for a playlist ID
    pub fn playlist(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: FeedKind::Playlist,
        }
    }

    /// Returns the storage key for this identity
    ///
    /// The key is the hex blake3 digest of `"{kind}:{id}"`. The kind
    /// participates in the hash so a channel and a playlist that happen to
    /// share an ID can never collide in the store.
    pub fn cache_key(&self) -> String {
        let input = format!("{}:{}", self.kind, self.id);
        blake3::hash(input.as_bytes()).to_hex().to_string()
    }
}

impl fmt::Display for FeedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Channel or playlist metadata with its own expiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailsRecord {
    /// Upstream ID this record describes
    pub id: String,
    /// Kind of the described entity
    pub kind: FeedKind,
    /// Display title of the channel or playlist
    pub title: String,
    /// Description text
    pub description: String,
    /// URL of the avatar or cover thumbnail
    pub thumbnail_url: String,
    /// Canonical upstream URL of the channel or playlist
    pub canonical_url: String,
    /// Opaque token from the last fetch, replayed so the upstream can
    /// answer "unchanged" without a body
    pub conditional_token: Option<String>,
    /// When this record was fetched or last revalidated
    pub fetched_at: DateTime<Utc>,
    /// When this record stops being fresh
    pub expires_at: DateTime<Utc>,
}

/// The ordered video ID list advertised by the lightweight feed
///
/// This list is the source of truth for membership and order: videos absent
/// from it are pruned from the document, and the video collection is kept
/// in exactly this order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedListRecord {
    /// Video IDs in upstream order, without duplicates
    pub video_ids: Vec<String>,
    /// When the list was fetched
    pub fetched_at: DateTime<Utc>,
    /// When the list stops being fresh
    pub expires_at: DateTime<Utc>,
}

/// Live-broadcast state of a video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiveStreamState {
    /// Regular uploaded video
    None,
    /// Premiere or stream announced but not started
    Upcoming,
    /// Currently live
    Live,
    /// Stream finished, archive available
    Ended,
}

/// Metadata for a single video, aged independently of the other parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
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
    /// When the video was published
    pub published_at: DateTime<Utc>,
    /// Video tags in upstream order
    pub tags: Vec<String>,
    /// Duration in seconds; absent for streams that have not started
    pub duration_seconds: Option<u32>,
    /// Thumbnail image URL
    pub thumbnail_url: String,
    /// Live-broadcast state
    pub live_stream_state: LiveStreamState,
    /// Scheduled start time for upcoming broadcasts
    pub scheduled_at: Option<DateTime<Utc>>,
    /// When this record was fetched
    pub fetched_at: DateTime<Utc>,
    /// When this record stops being fresh
    pub expires_at: DateTime<Utc>,
}

/// The unit of persistence for one feed identity
///
/// Created empty on the first request for an identity, filled in
/// incrementally over one or more refresh cycles, and persisted whenever
/// any part changed. `schema_version` is stamped by the store on save and
/// checked on load; a mismatch invalidates the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheDocument {
    /// On-disk schema version, written by the cache store
    #[serde(default)]
    pub schema_version: u32,
    /// Channel/playlist metadata, absent until first fetched
    pub details: Option<DetailsRecord>,
    /// Advertised video ID list, absent until first fetched
    pub feed_list: Option<FeedListRecord>,
    /// Video metadata in feed-list order
    pub videos: Vec<VideoRecord>,
    /// Timestamp of the most recent successful merge
    pub updated_at: Option<DateTime<Utc>>,
}

impl CacheDocument {
    /// Creates an empty document for a feed that has never been fetched
    pub fn empty() -> Self {
        Self {
            schema_version: 0,
            details: None,
            feed_list: None,
            videos: Vec::new(),
            updated_at: None,
        }
    }

    /// Looks up a cached video record by ID
    pub fn video(&self, id: &str) -> Option<&VideoRecord> {
        self.videos.iter().find(|v| v.id == id)
    }

    /// Returns the video IDs currently advertised by the feed list
    ///
    /// Empty when the feed list has never been fetched.
    pub fn feed_video_ids(&self) -> &[String] {
        self.feed_list
            .as_ref()
            .map(|list| list.video_ids.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for CacheDocument {
    fn default() -> Self {
        Self::empty()
    }
}
