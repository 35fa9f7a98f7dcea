//! Content-addressed cache of generated and repaired file trees.

use forge_protocol::FileTree;
use lru::LruCache;
use sha2::Digest;
use sha2::Sha256;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_CACHE_CAPACITY: usize = 256;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct CacheEntry {
    tree: FileTree,
    expires_at: Instant,
}

/// Bounded LRU map from a SHA-256 key to a [`FileTree`].
///
/// Expired entries are dropped lazily when they are read.
#[derive(Debug)]
pub struct ArtifactCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    default_ttl: Duration,
}

impl Default for ArtifactCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }
}

impl ArtifactCache {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            default_ttl,
        }
    }

    pub async fn get(&self, key: &str) -> Option<FileTree> {
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.tree.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
            tracing::debug!(key, "cache entry expired");
        }
        None
    }

    pub async fn put(&self, key: String, tree: FileTree, ttl: Duration) {
        let entry = CacheEntry {
            tree,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().await.put(key, entry);
    }

    /// Stores `tree` with the cache's default TTL.
    pub async fn insert(&self, key: String, tree: FileTree) {
        self.put(key, tree, self.default_ttl).await;
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Key for a generation request: the trimmed prompt.
pub fn generation_key(prompt: &str) -> String {
    sha256_hex(prompt.trim().as_bytes())
}

/// Key for a repair request: the error text followed by the sorted paths of
/// the files sent, one per line.
pub fn fix_key(error_text: &str, tree: &FileTree) -> String {
    let mut input = error_text.to_string();
    input.push('\n');
    input.push_str(&tree.sorted_paths().join("\n"));
    sha256_hex(input.as_bytes())
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
