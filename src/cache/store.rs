//! Durable document storage
//!
//! Provides the `CacheStore` trait used by the refresh coordinator and the
//! filesystem implementation that persists one JSON document per feed. Loads
//! are fail-open: a missing, unreadable, or out-of-date document reads as
//! "nothing cached yet" so a corrupt cache can never block a feed from being
//! served.

use crate::data::{CacheDocument, FeedIdentity};
use async_trait::async_trait;
use directories::ProjectDirs;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

/// Version stamped into every saved document
///
/// Bumped whenever the persisted shape changes incompatibly; documents
/// carrying any other version are discarded on load, forcing a full
/// refetch instead of a parse error against a stale shape.
pub const SCHEMA_VERSION: u32 = 3;

/// Errors that can occur when persisting a document
///
/// Only saves error: a failed persist must be visible to the caller, while
/// load failures are deliberately downgraded to a cache miss.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem write or rename failed
    #[error("cache write failed: {0}")]
    Io(#[from] io::Error),

    /// Document could not be serialized
    #[error("cache serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key/value persistence for feed documents
///
/// Addressed by the identity's cache key. Any backend satisfying the
/// load/save semantics works here: the bundled implementation uses the
/// filesystem, but a KV database or blob store slots in behind the same
/// trait.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Loads the document for an identity
    ///
    /// Returns `None` when no document exists, when the stored bytes fail
    /// to parse, or when the stored `schema_version` does not match
    /// [`SCHEMA_VERSION`]. None of these raise: every failure mode reads
    /// as an empty cache and forces a full refresh.
    async fn load(&self, identity: &FeedIdentity) -> Option<CacheDocument>;

    /// Persists the document for an identity, overwriting any previous one
    ///
    /// The caller is expected to skip this entirely when nothing changed;
    /// the store itself performs no dirty checking.
    async fn save(&self, identity: &FeedIdentity, document: &CacheDocument)
        -> Result<(), StoreError>;
}

/// Filesystem-backed cache store
///
/// Stores each feed as a pretty-printed JSON file named by the identity's
/// blake3 cache key inside an XDG-compliant cache directory
/// (`~/.cache/ytfeed/` on Linux). Writes go to a sibling temp file first
/// and are renamed into place, so concurrent readers only ever observe a
/// complete document.
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    /// Directory where feed documents are stored
    cache_dir: PathBuf,
}

impl FsCacheStore {
    /// Creates a store using the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no
    /// home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "ytfeed")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a store rooted at a custom directory
    ///
    /// Useful for testing or when a specific cache location is needed.
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Returns the document path for the given identity
    fn document_path(&self, identity: &FeedIdentity) -> PathBuf {
        self.cache_dir.join(format!("{}.json", identity.cache_key()))
    }

    /// Ensures the cache directory exists
    fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.cache_dir)
    }

    /// Writes `json` to the target path through a temp file + rename
    ///
    /// The temp file lives in the same directory as the target so the
    /// rename stays within one filesystem and replaces atomically.
    fn write_atomic(&self, path: &PathBuf, json: &str) -> io::Result<()> {
        let mut tmp_path = path.clone();
        tmp_path.set_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, path)
    }
}

#[async_trait]
impl CacheStore for FsCacheStore {
    async fn load(&self, identity: &FeedIdentity) -> Option<CacheDocument> {
        let path = self.document_path(identity);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(feed = %identity, "no cached document");
                return None;
            }
            Err(e) => {
                warn!(feed = %identity, error = %e, "cached document unreadable, treating as empty");
                return None;
            }
        };

        let document: CacheDocument = match serde_json::from_str(&content) {
            Ok(document) => document,
            Err(e) => {
                warn!(feed = %identity, error = %e, "cached document corrupt, treating as empty");
                return None;
            }
        };

        if document.schema_version != SCHEMA_VERSION {
            warn!(
                feed = %identity,
                found = document.schema_version,
                expected = SCHEMA_VERSION,
                "cached document schema mismatch, treating as empty"
            );
            return None;
        }

        Some(document)
    }

    async fn save(
        &self,
        identity: &FeedIdentity,
        document: &CacheDocument,
    ) -> Result<(), StoreError> {
        self.ensure_dir()?;

        let mut stamped = document.clone();
        stamped.schema_version = SCHEMA_VERSION;

        let json = serde_json::to_string_pretty(&stamped)?;
        let path = self.document_path(identity);
        self.write_atomic(&path, &json)?;

        debug!(feed = %identity, path = %path.display(), "cached document saved");
        Ok(())
    }
}
