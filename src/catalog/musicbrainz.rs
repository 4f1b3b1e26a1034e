//! MusicBrainz catalog source.
//!
//! Rate limited to 1 request per second per MusicBrainz API policy.

use super::rate_limit::RateLimiter;
use super::{ArtistFragment, CatalogError, CatalogSource};
use crate::recommend::normalize::normalize_name;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const SOURCE_NAME: &str = "musicbrainz";

const MUSICBRAINZ_API_BASE: &str = "https://musicbrainz.org/ws/2";
const RATE_LIMIT_INTERVAL: Duration = Duration::from_millis(1100); // slightly over 1s for safety
const SEARCH_LIMIT: usize = 5;
const MAX_GENRES: usize = 5;

pub struct MusicBrainzSource {
    client: Client,
    base_url: String,
    rate_limiter: RateLimiter,
}

#[derive(Deserialize)]
struct ArtistSearchResponse {
    #[serde(default)]
    artists: Vec<MbArtist>,
}

#[derive(Deserialize)]
struct MbArtist {
    id: String,
    name: String,
    country: Option<String>,
    disambiguation: Option<String>,
    #[serde(rename = "life-span")]
    life_span: Option<MbLifeSpan>,
    #[serde(default)]
    tags: Vec<MbTag>,
    #[serde(default)]
    aliases: Vec<MbAlias>,
}

#[derive(Deserialize)]
struct MbLifeSpan {
    begin: Option<String>,
    end: Option<String>,
    ended: Option<bool>,
}

#[derive(Deserialize)]
struct MbTag {
    name: String,
    #[serde(default)]
    count: i64,
}

#[derive(Deserialize)]
struct MbAlias {
    name: String,
}

#[derive(Deserialize)]
struct ReleaseGroupBrowseResponse {
    #[serde(rename = "release-group-count")]
    release_group_count: Option<u32>,
}

impl MusicBrainzSource {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, CatalogError> {
        Self::with_base_url(MUSICBRAINZ_API_BASE, user_agent, timeout)
    }

    pub fn with_base_url(
        base_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::new(RATE_LIMIT_INTERVAL),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, CatalogError> {
        self.rate_limiter.wait().await;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.as_u16() == 503 {
            return Err(CatalogError::Unavailable(
                "MusicBrainz rate limited the request".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(CatalogError::Unavailable(format!(
                "MusicBrainz request failed with status {}",
                status
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))
    }

    /// Number of album release groups credited to `mbid`.
    async fn album_count(&self, mbid: &str) -> Result<Option<u32>, CatalogError> {
        let url = format!(
            "{}/release-group?artist={}&type=album&fmt=json&limit=1",
            self.base_url, mbid
        );
        let body: ReleaseGroupBrowseResponse = self.get_json(&url).await?;
        Ok(body.release_group_count)
    }
}

/// Lucene phrase query for an exact artist name.
fn artist_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("artist:\"{}\"", escaped)
}

/// First search hit whose name or one of its aliases normalizes to `name`.
fn select_match(artists: Vec<MbArtist>, name: &str) -> Option<MbArtist> {
    let wanted = normalize_name(name);
    artists.into_iter().find(|artist| {
        normalize_name(&artist.name) == wanted
            || artist
                .aliases
                .iter()
                .any(|alias| normalize_name(&alias.name) == wanted)
    })
}

fn year_of(date: &str) -> Option<&str> {
    date.get(..4).filter(|y| y.chars().all(|c| c.is_ascii_digit()))
}

fn years_active(life_span: Option<&MbLifeSpan>) -> String {
    let Some(span) = life_span else {
        return String::new();
    };
    let Some(begin) = span.begin.as_deref().and_then(year_of) else {
        return String::new();
    };
    match span.end.as_deref().and_then(year_of) {
        Some(end) => format!("{}-{}", begin, end),
        None if span.ended == Some(true) => begin.to_string(),
        None => format!("{}-present", begin),
    }
}

fn top_tags(mut tags: Vec<MbTag>) -> Vec<String> {
    tags.sort_by(|a, b| b.count.cmp(&a.count));
    tags.into_iter()
        .filter(|t| t.count > 0 && !t.name.trim().is_empty())
        .take(MAX_GENRES)
        .map(|t| t.name)
        .collect()
}

fn to_fragment(artist: MbArtist) -> ArtistFragment {
    let years_active = years_active(artist.life_span.as_ref());
    ArtistFragment {
        source: SOURCE_NAME.to_string(),
        id: Some(format!("{}:{}", SOURCE_NAME, artist.id)),
        url: Some(format!("https://musicbrainz.org/artist/{}", artist.id)),
        name: artist.name,
        country: artist.country.unwrap_or_default(),
        description: artist.disambiguation.unwrap_or_default(),
        years_active,
        image_url: String::new(),
        album_count: None,
        genres: top_tags(artist.tags),
    }
}

#[async_trait]
impl CatalogSource for MusicBrainzSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn lookup(&self, name: &str) -> Result<Option<ArtistFragment>, CatalogError> {
        let url = format!(
            "{}/artist/?query={}&fmt=json&limit={}",
            self.base_url,
            urlencoding::encode(&artist_query(name)),
            SEARCH_LIMIT
        );
        let body: ArtistSearchResponse = self.get_json(&url).await?;

        let Some(artist) = select_match(body.artists, name) else {
            debug!(name = %name, "No exact MusicBrainz match");
            return Ok(None);
        };

        let mbid = artist.id.clone();
        let mut fragment = to_fragment(artist);
        match self.album_count(&mbid).await {
            Ok(count) => fragment.album_count = count,
            Err(e) => warn!(mbid = %mbid, "MusicBrainz album count lookup failed: {}", e),
        }
        Ok(Some(fragment))
    }
}
