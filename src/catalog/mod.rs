//! External music catalogs used to confirm and describe candidate artists.
//!
//! Sources are queried in a fixed priority order chosen by configuration:
//! - MusicBrainz: identity (MBID), country, years active, tags, album count
//! - Last.fm: biography, tags, images

pub mod lastfm;
pub mod musicbrainz;
mod rate_limit;

pub use lastfm::LastFmSource;
pub use musicbrainz::MusicBrainzSource;

use async_trait::async_trait;
use thiserror::Error;

/// What one catalog knows about an artist. Empty strings mean "not supplied".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtistFragment {
    /// Name of the source that produced the fragment.
    pub source: String,
    /// Stable identifier, namespaced by issuing catalog (`musicbrainz:<mbid>`).
    pub id: Option<String>,
    pub name: String,
    pub country: String,
    pub description: String,
    pub years_active: String,
    pub image_url: String,
    pub album_count: Option<u32>,
    pub genres: Vec<String>,
    pub url: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("catalog request timed out")]
    Timeout,

    #[error("invalid catalog response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CatalogError::Timeout
        } else if e.is_decode() {
            CatalogError::InvalidResponse(e.to_string())
        } else {
            CatalogError::Unavailable(e.to_string())
        }
    }
}

/// A catalog able to confirm that an artist exists.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Stable source name, used in `verified_sources` and `external_urls`.
    fn name(&self) -> &str;

    /// Look up an artist by name.
    ///
    /// `Ok(None)` means the catalog answered and has no artist with exactly
    /// this (normalized) name.
    async fn lookup(&self, name: &str) -> Result<Option<ArtistFragment>, CatalogError>;
}
