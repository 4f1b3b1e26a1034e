//! ArtistCache trait definition.

use super::models::{Artist, CacheStats, CachedArtist};
use anyhow::Result;
use chrono::Duration;

/// Persistent store of enriched artists with per-record expiry.
///
/// The TTL is chosen by the caller on every `put`, so success and failure
/// expiry policies live with whoever decides what a result means.
pub trait ArtistCache: Send + Sync {
    /// Look up a record by cache key.
    ///
    /// `fresh` is false when the record's expiry has passed. Rows that cannot
    /// be decoded are reported as absent.
    fn get(&self, key: &str) -> Result<Option<CachedArtist>>;

    /// Insert or replace the record stored under `key`.
    ///
    /// `last_updated` is set to the current time and `cache_expiry` to
    /// `last_updated + ttl`; the stamped record is returned.
    fn put(&self, key: &str, artist: &Artist, ttl: Duration) -> Result<Artist>;

    /// Row counts, for maintenance output.
    fn stats(&self) -> Result<CacheStats>;
}
