//! Public key cache
//!
//! Maps a ledger address to its discovered X25519 public key for a bounded
//! time. Failed lookups are never cached, so a transient error is retried on
//! the next call.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::ledger::{LedgerClient, LedgerError};

#[derive(Debug, Clone, Copy)]
struct CachedKey {
    key: [u8; 32],
    cached_at: Instant,
}

/// TTL-bounded cache in front of [`LedgerClient::discover_public_key`]
#[derive(Debug)]
pub struct PublicKeyCache {
    ledger: Arc<dyn LedgerClient>,
    ttl: Duration,
    entries: Mutex<LruCache<String, CachedKey>>,
}

impl PublicKeyCache {
    /// Create a cache holding at most `capacity` keys for `ttl` each
    pub fn new(ledger: Arc<dyn LedgerClient>, ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            ledger,
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Public key for `address`, discovering it if absent or expired
    pub async fn get_public_key(&self, address: &str) -> Result<[u8; 32], LedgerError> {
        if let Some(key) = self.cached(address) {
            return Ok(key);
        }

        // The lock is not held across the remote call
        let key = self.ledger.discover_public_key(address).await?;
        tracing::debug!(address = %address, "Discovered public key");

        self.entries.lock().put(
            address.to_string(),
            CachedKey {
                key,
                cached_at: Instant::now(),
            },
        );
        Ok(key)
    }

    /// Fresh cached key, evicting it if the TTL has passed
    fn cached(&self, address: &str) -> Option<[u8; 32]> {
        let mut entries = self.entries.lock();
        let entry = *entries.get(address)?;
        if entry.cached_at.elapsed() < self.ttl {
            return Some(entry.key);
        }
        entries.pop(address);
        None
    }

    /// Drop any cached key for `address`
    pub fn invalidate(&self, address: &str) {
        self.entries.lock().pop(address);
    }

    /// Number of cached entries, expired or not
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
