//! Engine configuration
//!
//! Provides the `CacheConfig` value object that carries TTLs and refresh
//! behavior into the cache components. Configuration is passed explicitly at
//! construction time; the engine reads no globals or environment variables.

use chrono::Duration;

/// Configuration for cache TTLs and refresh behavior
///
/// One value is shared by the freshness engine, the merger, and the refresh
/// coordinator so that all three agree on expiry arithmetic. The defaults
/// reflect how quickly each part of a feed actually changes: channel and
/// playlist metadata is nearly static, the "what's new" video list must be
/// near-real-time, and per-video metadata rarely changes once published.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long fetched channel/playlist details stay fresh
    pub details_ttl: Duration,
    /// How long the lightweight feed (video ID list) stays fresh
    pub feed_list_ttl: Duration,
    /// How long an individual video's metadata stays fresh
    pub video_ttl: Duration,
    /// When true, every part is treated as stale on every refresh
    /// (unconditional full refetch, intended for debugging and testing)
    pub cache_disabled: bool,
    /// Upper bound on each upstream fetch; an elapsed timeout aborts the
    /// refresh the same way a fetch error does
    pub source_timeout: std::time::Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            details_ttl: Duration::days(30),
            feed_list_ttl: Duration::minutes(10),
            video_ttl: Duration::hours(1),
            cache_disabled: false,
            source_timeout: std::time::Duration::from_secs(30),
        }
    }
}

impl CacheConfig {
    /// Returns a configuration with all parts forced stale
    ///
    /// Convenience for debug endpoints that need to bypass the cache for a
    /// single request without rebuilding the rest of the configuration.
    pub fn without_caching(mut self) -> Self {
        self.cache_disabled = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttls_match_part_volatility() {
        let config = CacheConfig::default();
        assert_eq!(config.details_ttl, Duration::days(30));
        assert_eq!(config.feed_list_ttl, Duration::minutes(10));
        assert_eq!(config.video_ttl, Duration::hours(1));
        assert!(!config.cache_disabled);
    }

    #[test]
    fn test_without_caching_sets_flag_only() {
        let config = CacheConfig::default().without_caching();
        assert!(config.cache_disabled);
        assert_eq!(config.details_ttl, Duration::days(30));
        assert_eq!(config.video_ttl, Duration::hours(1));
    }

    #[test]
    fn test_feed_list_expires_before_videos() {
        // The membership list must always be at least as fresh as the
        // records it governs, otherwise pruning lags behind reality.
        let config = CacheConfig::default();
        assert!(config.feed_list_ttl < config.video_ttl);
        assert!(config.video_ttl < config.details_ttl);
    }
}
