//! ytfeed cache engine
//!
//! Turns a YouTube channel or playlist into the cached aggregate document a
//! syndication-feed frontend renders from, while minimizing calls to the
//! quota-limited upstream API. Each feed document has three
//! independently-aged parts (details, feed list, videos); a refresh fetches
//! only the stale ones, merges them in, and persists once if anything
//! changed.
//!
//! Transport, response parsing, and output rendering live outside this
//! crate behind the [`Source`](data::Source) and
//! [`CacheStore`](cache::CacheStore) traits.

pub mod cache;
pub mod config;
pub mod data;
