//! Partial-result merging
//!
//! Folds freshly fetched data into the in-memory document. Details and the
//! feed list are overwrite-merged as whole parts; the video collection is
//! reconciled by ID against the feed list, which alone governs membership
//! and order.

use crate::config::CacheConfig;
use crate::data::{
    CacheDocument, DetailsFetchResult, DetailsRecord, FeedIdentity, FeedListRecord, VideoData,
    VideoRecord,
};
use chrono::Utc;
use std::collections::HashSet;
use tracing::warn;

/// Applies fetched data to a cached document
#[derive(Debug, Clone)]
pub struct Merger {
    config: CacheConfig,
}

impl Merger {
    /// Creates a merger with the given TTL configuration
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    /// Merges a details fetch result into the document
    ///
    /// Fresh data overwrites every detail field and stamps new timestamps.
    /// A not-modified result keeps the existing field values but still
    /// refreshes `fetched_at`/`expires_at`, extending the TTL without
    /// re-parsing a body; without that extension an unchanged upstream
    /// would be re-checked on every single request for the next month.
    pub fn merge_details(
        &self,
        document: &mut CacheDocument,
        identity: &FeedIdentity,
        result: DetailsFetchResult,
    ) {
        let now = Utc::now();

        if result.not_modified {
            match document.details.as_mut() {
                Some(details) => {
                    details.fetched_at = now;
                    details.expires_at = now + self.config.details_ttl;
                    if let Some(token) = result.new_token {
                        details.conditional_token = Some(token);
                    }
                    document.updated_at = Some(now);
                }
                None => {
                    // Only a misbehaving source reports "not modified"
                    // when we sent no token; there is nothing to extend.
                    warn!(feed = %identity, "not-modified response with no cached details");
                }
            }
            return;
        }

        let Some(data) = result.details else {
            warn!(feed = %identity, "details response carried no body, keeping cached record");
            return;
        };

        document.details = Some(DetailsRecord {
            id: identity.id.clone(),
            kind: identity.kind,
            title: data.title,
            description: data.description,
            thumbnail_url: data.thumbnail_url,
            canonical_url: data.canonical_url,
            conditional_token: result.new_token,
            fetched_at: now,
            expires_at: now + self.config.details_ttl,
        });
        document.updated_at = Some(now);
    }

    /// Replaces the advertised video ID list and prunes the collection
    ///
    /// The incoming list is de-duplicated defensively while preserving
    /// first-occurrence order. Pruning runs immediately afterwards because
    /// the new list changes which cached videos are still relevant.
    pub fn merge_feed_list(&self, document: &mut CacheDocument, video_ids: Vec<String>) {
        let now = Utc::now();

        let mut seen = HashSet::with_capacity(video_ids.len());
        let video_ids: Vec<String> = video_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        document.feed_list = Some(FeedListRecord {
            video_ids,
            fetched_at: now,
            expires_at: now + self.config.feed_list_ttl,
        });
        document.updated_at = Some(now);

        self.prune_orphans(document);
    }

    /// Upserts freshly fetched video records by ID
    ///
    /// Existing records are updated in place, unknown IDs are appended, and
    /// the collection is then re-aligned to feed-list order so batch
    /// response order never leaks into presentation order. Records missing
    /// from the batch are never dropped here: omission from a fetch is not
    /// a removal signal, feed-list membership is.
    pub fn merge_videos(&self, document: &mut CacheDocument, fresh: Vec<VideoData>) {
        let now = Utc::now();
        let expires_at = now + self.config.video_ttl;

        for data in fresh {
            let record = VideoRecord {
                id: data.id,
                url: data.url,
                title: data.title,
                description: data.description,
                author: data.author,
                published_at: data.published_at,
                tags: data.tags,
                duration_seconds: data.duration_seconds,
                thumbnail_url: data.thumbnail_url,
                live_stream_state: data.live_stream_state,
                scheduled_at: data.scheduled_at,
                fetched_at: now,
                expires_at,
            };

            match document.videos.iter_mut().find(|v| v.id == record.id) {
                Some(existing) => *existing = record,
                None => document.videos.push(record),
            }
        }

        document.updated_at = Some(now);
        Self::align_to_feed_order(document);
    }

    /// Removes videos no longer advertised by the feed list, then reorders
    /// the survivors to exactly match the list
    ///
    /// Presentation order must track the upstream feed's order, not fetch
    /// or insertion order.
    pub fn prune_orphans(&self, document: &mut CacheDocument) {
        let ids: HashSet<String> = document.feed_video_ids().iter().cloned().collect();
        document.videos.retain(|video| ids.contains(&video.id));
        Self::align_to_feed_order(document);
    }

    /// Reorders `videos` to feed-list order
    ///
    /// Records without a feed-list entry keep their relative order at the
    /// tail; only pruning is allowed to drop them.
    fn align_to_feed_order(document: &mut CacheDocument) {
        let ids = document.feed_video_ids().to_vec();
        let id_set: HashSet<&str> = ids.iter().map(|id| id.as_str()).collect();

        let mut members = Vec::with_capacity(document.videos.len());
        let mut extras = Vec::new();
        for video in document.videos.drain(..) {
            if id_set.contains(video.id.as_str()) {
                members.push(video);
            } else {
                extras.push(video);
            }
        }

        let mut aligned = Vec::with_capacity(members.len() + extras.len());
        for id in &ids {
            if let Some(pos) = members.iter().position(|v| &v.id == id) {
                aligned.push(members.swap_remove(pos));
            }
        }
        aligned.extend(extras);
        document.videos = aligned;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DetailsData, LiveStreamState};
    use chrono::Duration;

    fn merger() -> Merger {
        Merger::new(CacheConfig::default())
    }

    fn identity() -> FeedIdentity {
        FeedIdentity::channel("UCtest")
    }

    fn details_data(title: &str) -> DetailsData {
        DetailsData {
            title: title.to_string(),
            description: "About".to_string(),
            thumbnail_url: "https://example.com/t.jpg".to_string(),
            canonical_url: "https://www.youtube.com/channel/UCtest".to_string(),
        }
    }

    fn video_data(id: &str, title: &str) -> VideoData {
        VideoData {
            id: id.to_string(),
            url: format!("https://www.youtube.com/watch?v={}", id),
            title: title.to_string(),
            description: String::new(),
            author: "Author".to_string(),
            published_at: Utc::now(),
            tags: vec!["news".to_string()],
            duration_seconds: Some(120),
            thumbnail_url: String::new(),
            live_stream_state: LiveStreamState::None,
            scheduled_at: None,
        }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn video_ids_of(document: &CacheDocument) -> Vec<&str> {
        document.videos.iter().map(|v| v.id.as_str()).collect()
    }

    #[test]
    fn test_merge_details_overwrites_fields_and_stamps_expiry() {
        let mut document = CacheDocument::empty();
        let before = Utc::now();

        merger().merge_details(
            &mut document,
            &identity(),
            DetailsFetchResult::fresh(details_data("My Channel"), Some("etag-1".to_string())),
        );

        let details = document.details.as_ref().expect("details merged");
        assert_eq!(details.title, "My Channel");
        assert_eq!(details.id, "UCtest");
        assert_eq!(details.conditional_token.as_deref(), Some("etag-1"));
        assert!(details.fetched_at >= before);
        assert!(details.expires_at > before + Duration::days(29));
        assert!(document.updated_at.is_some());
    }

    #[test]
    fn test_not_modified_keeps_data_and_extends_expiry() {
        let mut document = CacheDocument::empty();
        merger().merge_details(
            &mut document,
            &identity(),
            DetailsFetchResult::fresh(details_data("X"), Some("etag-1".to_string())),
        );

        // Simulate an old record nearing expiry
        let stale_expiry = Utc::now() + Duration::minutes(5);
        document.details.as_mut().expect("details").expires_at = stale_expiry;

        merger().merge_details(&mut document, &identity(), DetailsFetchResult::not_modified(None));

        let details = document.details.as_ref().expect("details kept");
        assert_eq!(details.title, "X", "not-modified must not lose data");
        assert_eq!(details.conditional_token.as_deref(), Some("etag-1"));
        assert!(
            details.expires_at > stale_expiry,
            "expiry must move strictly forward"
        );
    }

    #[test]
    fn test_not_modified_adopts_rotated_token() {
        let mut document = CacheDocument::empty();
        merger().merge_details(
            &mut document,
            &identity(),
            DetailsFetchResult::fresh(details_data("X"), Some("etag-1".to_string())),
        );

        merger().merge_details(
            &mut document,
            &identity(),
            DetailsFetchResult::not_modified(Some("etag-2".to_string())),
        );

        let details = document.details.as_ref().expect("details kept");
        assert_eq!(details.conditional_token.as_deref(), Some("etag-2"));
    }

    #[test]
    fn test_not_modified_without_cached_details_is_a_no_op() {
        let mut document = CacheDocument::empty();

        merger().merge_details(&mut document, &identity(), DetailsFetchResult::not_modified(None));

        assert!(document.details.is_none());
        assert!(document.updated_at.is_none());
    }

    #[test]
    fn test_merge_details_is_idempotent_on_content() {
        let mut document = CacheDocument::empty();
        let result = DetailsFetchResult::fresh(details_data("Same"), Some("etag".to_string()));

        merger().merge_details(&mut document, &identity(), result.clone());
        let first = document.details.clone().expect("details");

        merger().merge_details(&mut document, &identity(), result);
        let second = document.details.clone().expect("details");

        assert_eq!(first.title, second.title);
        assert_eq!(first.description, second.description);
        assert_eq!(first.conditional_token, second.conditional_token);
        assert!(second.fetched_at >= first.fetched_at, "only timestamps advance");
    }

    #[test]
    fn test_merge_feed_list_deduplicates_preserving_order() {
        let mut document = CacheDocument::empty();

        merger().merge_feed_list(&mut document, ids(&["a", "b", "a", "c", "b"]));

        assert_eq!(document.feed_video_ids(), &ids(&["a", "b", "c"])[..]);
    }

    #[test]
    fn test_merge_feed_list_prunes_dropped_videos() {
        let mut document = CacheDocument::empty();
        merger().merge_feed_list(&mut document, ids(&["a", "b", "c"]));
        merger().merge_videos(
            &mut document,
            vec![
                video_data("a", "A"),
                video_data("b", "B"),
                video_data("c", "C"),
            ],
        );

        merger().merge_feed_list(&mut document, ids(&["b", "c", "d"]));

        assert_eq!(video_ids_of(&document), vec!["b", "c"]);
        assert!(document.video("a").is_none(), "dropped ID must be pruned");
    }

    #[test]
    fn test_merge_videos_upserts_in_place() {
        let mut document = CacheDocument::empty();
        merger().merge_feed_list(&mut document, ids(&["a", "b"]));
        merger().merge_videos(
            &mut document,
            vec![video_data("a", "Old title"), video_data("b", "B")],
        );

        merger().merge_videos(&mut document, vec![video_data("a", "New title")]);

        assert_eq!(document.videos.len(), 2, "update must not duplicate");
        assert_eq!(
            document.video("a").map(|v| v.title.as_str()),
            Some("New title")
        );
        assert_eq!(document.video("b").map(|v| v.title.as_str()), Some("B"));
    }

    #[test]
    fn test_merge_videos_never_drops_omitted_records() {
        let mut document = CacheDocument::empty();
        merger().merge_feed_list(&mut document, ids(&["a", "b"]));
        merger().merge_videos(
            &mut document,
            vec![video_data("a", "A"), video_data("b", "B")],
        );

        // A batch refreshing only "b" must leave "a" alone.
        merger().merge_videos(&mut document, vec![video_data("b", "B2")]);

        assert_eq!(video_ids_of(&document), vec!["a", "b"]);
    }

    #[test]
    fn test_merge_videos_is_idempotent_on_content() {
        let mut document = CacheDocument::empty();
        merger().merge_feed_list(&mut document, ids(&["a", "b"]));
        let batch = vec![video_data("a", "A"), video_data("b", "B")];

        merger().merge_videos(&mut document, batch.clone());
        let first: Vec<String> = document.videos.iter().map(|v| v.title.clone()).collect();

        merger().merge_videos(&mut document, batch);
        let second: Vec<String> = document.videos.iter().map(|v| v.title.clone()).collect();

        assert_eq!(first, second);
        assert_eq!(document.videos.len(), 2);
    }

    #[test]
    fn test_merge_videos_aligns_to_feed_order() {
        let mut document = CacheDocument::empty();
        merger().merge_feed_list(&mut document, ids(&["a", "b", "c"]));

        // Batch arrives in a different order than the feed advertises.
        merger().merge_videos(
            &mut document,
            vec![
                video_data("c", "C"),
                video_data("a", "A"),
                video_data("b", "B"),
            ],
        );

        assert_eq!(video_ids_of(&document), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_prune_reorders_to_exact_feed_order() {
        let mut document = CacheDocument::empty();
        merger().merge_feed_list(&mut document, ids(&["a", "b", "c"]));
        merger().merge_videos(
            &mut document,
            vec![
                video_data("a", "A"),
                video_data("b", "B"),
                video_data("c", "C"),
            ],
        );

        // Upstream reorders the feed; the collection must follow.
        merger().merge_feed_list(&mut document, ids(&["c", "a", "b"]));

        assert_eq!(video_ids_of(&document), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_pruning_invariant_holds_after_any_feed_list_merge() {
        let mut document = CacheDocument::empty();
        merger().merge_feed_list(&mut document, ids(&["a", "b", "c", "d"]));
        merger().merge_videos(
            &mut document,
            vec![
                video_data("a", "A"),
                video_data("b", "B"),
                video_data("c", "C"),
                video_data("d", "D"),
            ],
        );

        for new_list in [
            ids(&["d", "b"]),
            ids(&["b"]),
            ids(&[]),
        ] {
            merger().merge_feed_list(&mut document, new_list.clone());

            let member_ids: Vec<&str> = new_list.iter().map(|s| s.as_str()).collect();
            assert_eq!(
                video_ids_of(&document),
                member_ids,
                "videos must exactly track feed-list membership and order"
            );
        }
    }

    #[test]
    fn test_empty_feed_list_clears_all_videos() {
        let mut document = CacheDocument::empty();
        merger().merge_feed_list(&mut document, ids(&["a"]));
        merger().merge_videos(&mut document, vec![video_data("a", "A")]);

        merger().merge_feed_list(&mut document, Vec::new());

        assert!(document.videos.is_empty());
        assert!(document.feed_video_ids().is_empty());
    }

    #[test]
    fn test_video_timestamps_are_stamped_per_merge() {
        let mut document = CacheDocument::empty();
        merger().merge_feed_list(&mut document, ids(&["a"]));
        let before = Utc::now();

        merger().merge_videos(&mut document, vec![video_data("a", "A")]);

        let video = document.video("a").expect("video merged");
        assert!(video.fetched_at >= before);
        assert!(video.expires_at >= before + Duration::minutes(59));
        assert!(video.expires_at <= Utc::now() + Duration::hours(1));
    }
}
