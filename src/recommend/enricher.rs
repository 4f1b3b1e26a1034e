//! Metadata enrichment of candidate artists.
//!
//! ## Flow per candidate
//!
//! ```text
//! normalized name → artist cache ─ fresh ─→ cached record (or cached rejection)
//!                        │
//!                  miss / stale
//!                        ↓
//!        catalog sources, in priority order → merge → cache (success TTL)
//!                        │
//!                 nobody confirmed
//!                        ↓
//!              negative record (failure TTL)
//! ```

use super::candidates::Candidate;
use super::normalize::cache_key;
use super::stats::StatsAccumulator;
use crate::artist_cache::{Artist, ArtistCache, CachedArtist};
use crate::catalog::{ArtistFragment, CatalogSource};
use chrono::Duration;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Cache lifetimes for enrichment results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentPolicy {
    /// Lifetime of a record confirmed by at least one catalog.
    pub success_ttl: Duration,
    /// Lifetime of a negative record.
    pub failure_ttl: Duration,
}

impl Default for EnrichmentPolicy {
    fn default() -> Self {
        Self {
            success_ttl: Duration::days(30),
            failure_ttl: Duration::days(1),
        }
    }
}

/// A single candidate could not be enriched. Never fatal to a run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnrichmentFailure {
    #[error("{name}: not found in any catalog")]
    Unverified { name: String },

    #[error("{name}: not found in any catalog (cached)")]
    NegativelyCached { name: String },

    #[error("{name}: no catalog could be reached ({})", .reasons.join("; "))]
    SourcesUnavailable { name: String, reasons: Vec<String> },
}

pub struct MetadataEnricher {
    cache: Arc<dyn ArtistCache>,
    sources: Vec<Arc<dyn CatalogSource>>,
    policy: EnrichmentPolicy,
}

impl MetadataEnricher {
    /// `sources` are queried in the given order, which is also the merge
    /// priority.
    pub fn new(
        cache: Arc<dyn ArtistCache>,
        sources: Vec<Arc<dyn CatalogSource>>,
        policy: EnrichmentPolicy,
    ) -> Self {
        Self {
            cache,
            sources,
            policy,
        }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub async fn enrich(
        &self,
        candidate: &Candidate,
        stats: &StatsAccumulator,
    ) -> Result<Artist, EnrichmentFailure> {
        let key = cache_key(&candidate.name);

        let stale = match self.cached(&key) {
            Some(CachedArtist { artist, fresh: true }) => {
                stats.record_cache_hit();
                debug!(candidate = %candidate.name, "Artist cache hit");
                return if artist.is_verified() {
                    Ok(artist)
                } else {
                    Err(EnrichmentFailure::NegativelyCached {
                        name: candidate.name.clone(),
                    })
                };
            }
            Some(CachedArtist { artist, fresh: false }) => Some(artist),
            None => None,
        };

        stats.record_cache_miss();

        let mut fragments = Vec::new();
        let mut reasons = Vec::new();
        let mut answered = false;
        for source in &self.sources {
            stats.record_api_call();
            match source.lookup(&candidate.name).await {
                Ok(Some(fragment)) => {
                    answered = true;
                    fragments.push(fragment);
                }
                Ok(None) => {
                    answered = true;
                    debug!(candidate = %candidate.name, source = source.name(), "Not found");
                }
                Err(e) => {
                    warn!(candidate = %candidate.name, source = source.name(), "Catalog lookup failed: {}", e);
                    reasons.push(format!("{}: {}", source.name(), e));
                }
            }
        }

        if !fragments.is_empty() {
            let merged = merge(&key, candidate, fragments);
            return Ok(self.store(&key, merged, self.policy.success_ttl));
        }

        if !answered {
            if let Some(mut artist) = stale.filter(Artist::is_verified) {
                warn!(candidate = %candidate.name, "Catalogs unreachable, serving stale record");
                artist.stale = true;
                return Ok(artist);
            }
        }

        self.store(
            &key,
            Artist::negative(key.clone(), candidate.name.clone()),
            self.policy.failure_ttl,
        );

        if answered {
            Err(EnrichmentFailure::Unverified {
                name: candidate.name.clone(),
            })
        } else {
            Err(EnrichmentFailure::SourcesUnavailable {
                name: candidate.name.clone(),
                reasons,
            })
        }
    }

    fn cached(&self, key: &str) -> Option<CachedArtist> {
        match self.cache.get(key) {
            Ok(cached) => cached,
            Err(e) => {
                warn!(cache_key = %key, "Artist cache read failed, treating as miss: {:#}", e);
                None
            }
        }
    }

    /// Write through to the cache. A failed write leaves the result usable.
    fn store(&self, key: &str, artist: Artist, ttl: Duration) -> Artist {
        match self.cache.put(key, &artist, ttl) {
            Ok(stamped) => stamped,
            Err(e) => {
                warn!(cache_key = %key, "Artist cache write failed: {:#}", e);
                artist
            }
        }
    }
}

fn first_non_empty<'a>(
    fragments: &'a [ArtistFragment],
    field: impl Fn(&'a ArtistFragment) -> &'a str,
) -> String {
    fragments
        .iter()
        .map(field)
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Combine the fragments of every confirming source, in priority order.
///
/// Scalar fields come from the first source supplying a non-empty value.
/// Genres are the case-insensitive union, keeping the first spelling seen.
pub fn merge(key: &str, candidate: &Candidate, fragments: Vec<ArtistFragment>) -> Artist {
    let mut artist = Artist::negative(
        fragments
            .iter()
            .find_map(|f| f.id.clone())
            .unwrap_or_else(|| key.to_string()),
        candidate.name.clone(),
    );

    let name = first_non_empty(&fragments, |f| f.name.as_str());
    if !name.is_empty() {
        artist.name = name;
    }
    artist.country = first_non_empty(&fragments, |f| f.country.as_str());
    artist.description = first_non_empty(&fragments, |f| f.description.as_str());
    artist.years_active = first_non_empty(&fragments, |f| f.years_active.as_str());
    artist.image_url = first_non_empty(&fragments, |f| f.image_url.as_str());
    artist.album_count = fragments
        .iter()
        .find_map(|f| f.album_count)
        .unwrap_or_default();

    let mut seen_genres = HashSet::new();
    for fragment in &fragments {
        artist.verified_sources.insert(fragment.source.clone());
        if let Some(url) = &fragment.url {
            artist
                .external_urls
                .entry(fragment.source.clone())
                .or_insert_with(|| url.clone());
        }
        for genre in &fragment.genres {
            let genre = genre.trim();
            if !genre.is_empty() && seen_genres.insert(genre.to_lowercase()) {
                artist.genres.push(genre.to_string());
            }
        }
    }

    if artist.genres.is_empty() {
        artist.genres.extend(candidate.genre.clone());
    }

    artist
}
