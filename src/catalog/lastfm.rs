//! Last.fm catalog source.
//!
//! Rate limited to 5 requests per second per Last.fm API guidelines.

use super::rate_limit::RateLimiter;
use super::{ArtistFragment, CatalogError, CatalogSource};
use crate::recommend::normalize::normalize_name;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

pub const SOURCE_NAME: &str = "lastfm";

const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";
const RATE_LIMIT_INTERVAL: Duration = Duration::from_millis(200); // 5 req/sec
const MAX_GENRES: usize = 5;

/// Last.fm API error code for "The artist you supplied could not be found".
const ERROR_NOT_FOUND: i64 = 6;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

pub struct LastFmSource {
    client: Client,
    base_url: String,
    api_key: String,
    rate_limiter: RateLimiter,
}

impl LastFmSource {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, CatalogError> {
        Self::with_base_url(LASTFM_API_BASE, api_key, timeout)
    }

    pub fn with_base_url(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            rate_limiter: RateLimiter::new(RATE_LIMIT_INTERVAL),
        })
    }
}

/// Biography summary as plain text, without the trailing "Read more" link.
fn clean_summary(summary: &str) -> String {
    let text = HTML_TAG.replace_all(summary, "");
    let text = text
        .split("Read more on Last.fm")
        .next()
        .unwrap_or_default();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
}

/// Last.fm returns a bare object instead of a one-element array.
fn array_or_single(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    }
}

/// Interpret an `artist.getinfo` response body.
fn parse_artist_info(body: &Value, name: &str) -> Result<Option<ArtistFragment>, CatalogError> {
    if let Some(code) = body.get("error").and_then(Value::as_i64) {
        if code == ERROR_NOT_FOUND {
            return Ok(None);
        }
        return Err(CatalogError::Unavailable(format!(
            "Last.fm error {}: {}",
            code,
            str_field(body, "message")
        )));
    }

    let artist = body
        .get("artist")
        .ok_or_else(|| CatalogError::InvalidResponse("missing artist object".to_string()))?;

    let returned_name = str_field(artist, "name");
    if normalize_name(returned_name) != normalize_name(name) {
        debug!(requested = %name, returned = %returned_name, "Last.fm returned a different artist");
        return Ok(None);
    }

    let genres = array_or_single(artist.get("tags").and_then(|t| t.get("tag")))
        .into_iter()
        .map(|tag| str_field(tag, "name"))
        .filter(|tag| !tag.is_empty())
        .take(MAX_GENRES)
        .map(str::to_string)
        .collect();

    // Images are listed smallest first.
    let image_url = array_or_single(artist.get("image"))
        .into_iter()
        .rev()
        .map(|image| str_field(image, "#text"))
        .find(|url| !url.is_empty())
        .unwrap_or_default()
        .to_string();

    let mbid = str_field(artist, "mbid");
    let url = str_field(artist, "url");

    Ok(Some(ArtistFragment {
        source: SOURCE_NAME.to_string(),
        id: (!mbid.is_empty()).then(|| format!("musicbrainz:{}", mbid)),
        name: returned_name.to_string(),
        country: String::new(),
        description: artist
            .get("bio")
            .map(|bio| clean_summary(str_field(bio, "summary")))
            .unwrap_or_default(),
        years_active: String::new(),
        image_url,
        album_count: None,
        genres,
        url: (!url.is_empty()).then(|| url.to_string()),
    }))
}

#[async_trait]
impl CatalogSource for LastFmSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn lookup(&self, name: &str) -> Result<Option<ArtistFragment>, CatalogError> {
        self.rate_limiter.wait().await;

        let url = format!(
            "{}?method=artist.getinfo&artist={}&api_key={}&format=json&autocorrect=0",
            self.base_url,
            urlencoding::encode(name),
            self.api_key
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(CatalogError::Unavailable(format!(
                "Last.fm request failed with status {}",
                status
            )));
        }

        // Not-found is reported with a 4xx status and an error body.
        let body: Value = response
            .json()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;
        parse_artist_info(&body, name)
    }
}
