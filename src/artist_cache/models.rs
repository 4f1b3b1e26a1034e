//! Data models for the artist cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// An artist enriched with metadata from external catalogs.
///
/// A record with an empty `verified_sources` set is a negative entry: no
/// catalog could confirm the artist exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub verified_sources: BTreeSet<String>,
    pub album_count: u32,
    pub years_active: String,
    pub description: String,
    pub country: String,
    pub image_url: String,
    pub genres: Vec<String>,
    pub external_urls: BTreeMap<String, String>,
    pub last_updated: DateTime<Utc>,
    pub cache_expiry: DateTime<Utc>,
    /// Set when the record is past its expiry and could not be refreshed.
    /// Never persisted.
    #[serde(default)]
    pub stale: bool,
}

impl Artist {
    /// Minimal record for a candidate no catalog confirmed.
    pub fn negative(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            verified_sources: BTreeSet::new(),
            album_count: 0,
            years_active: String::new(),
            description: String::new(),
            country: String::new(),
            image_url: String::new(),
            genres: Vec::new(),
            external_urls: BTreeMap::new(),
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
            cache_expiry: DateTime::<Utc>::UNIX_EPOCH,
            stale: false,
        }
    }

    pub fn is_verified(&self) -> bool {
        !self.verified_sources.is_empty()
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.cache_expiry > now
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedArtist {
    pub artist: Artist,
    pub fresh: bool,
}

/// Row counts of the artist cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total: usize,
    pub fresh: usize,
    pub negative: usize,
}
