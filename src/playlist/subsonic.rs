//! OpenSubsonic playlist source (Navidrome, Airsonic, Gonic, ...).

use super::{PlaylistError, PlaylistSource, PlaylistTrack};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const API_VERSION: &str = "1.16.1";
const CLIENT_ID: &str = "artist-discovery";

pub struct SubsonicPlaylistSource {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl SubsonicPlaylistSource {
    pub fn new(
        base_url: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, PlaylistError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlaylistError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn api_url(&self, method: &str, params: &[(&str, &str)]) -> String {
        let salt = format!("{:016x}", rand::random::<u64>());
        let token = format!("{:x}", md5::compute(format!("{}{}", self.password, salt)));

        let auth = [
            ("u", self.username.as_str()),
            ("t", token.as_str()),
            ("s", salt.as_str()),
            ("f", "json"),
            ("v", API_VERSION),
            ("c", CLIENT_ID),
        ];
        let query = auth
            .iter()
            .chain(params)
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}/rest/{}.view?{}", self.base_url, method, query)
    }

    async fn request_json(&self, method: &str, params: &[(&str, &str)]) -> Result<Value, PlaylistError> {
        let response = self
            .client
            .get(self.api_url(method, params))
            .send()
            .await
            .map_err(|e| PlaylistError::Unavailable(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlaylistError::Unavailable(format!(
                "{} failed with status {}",
                method, status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PlaylistError::InvalidResponse(format!("{}: {}", method, e)))?;
        check_status(body)
    }
}

/// Unwrap the `subsonic-response` envelope, rejecting failed calls.
fn check_status(body: Value) -> Result<Value, PlaylistError> {
    let Some(envelope) = body.get("subsonic-response") else {
        return Err(PlaylistError::InvalidResponse(
            "missing subsonic-response".to_string(),
        ));
    };
    if envelope.get("status").and_then(Value::as_str) != Some("ok") {
        let message = envelope
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("media server returned an error");
        return Err(PlaylistError::Unavailable(message.to_string()));
    }
    Ok(envelope.clone())
}

fn array_or_single(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    }
}

/// Id of the first playlist whose name matches `name`, ignoring case and
/// surrounding whitespace.
fn find_playlist_id(envelope: &Value, name: &str) -> Option<String> {
    let wanted = name.trim().to_lowercase();
    array_or_single(envelope.get("playlists").and_then(|p| p.get("playlist")))
        .into_iter()
        .find(|playlist| {
            playlist
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|n| n.trim().to_lowercase() == wanted)
        })
        .and_then(|playlist| playlist.get("id"))
        .and_then(|id| match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn parse_entries(envelope: &Value) -> Vec<PlaylistTrack> {
    array_or_single(envelope.get("playlist").and_then(|p| p.get("entry")))
        .into_iter()
        .filter_map(|entry| {
            let artist = entry.get("artist").and_then(Value::as_str)?.trim();
            if artist.is_empty() {
                return None;
            }
            let title = entry
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim();
            Some(PlaylistTrack::new(title, artist))
        })
        .collect()
}

#[async_trait]
impl PlaylistSource for SubsonicPlaylistSource {
    async fn get_playlist_tracks(&self, name: &str) -> Result<Vec<PlaylistTrack>, PlaylistError> {
        let playlists = self.request_json("getPlaylists", &[]).await?;
        let id = find_playlist_id(&playlists, name)
            .ok_or_else(|| PlaylistError::NotFound(name.to_string()))?;

        let playlist = self.request_json("getPlaylist", &[("id", id.as_str())]).await?;
        let tracks = parse_entries(&playlist);
        debug!(playlist = %name, tracks = tracks.len(), "Fetched playlist");
        Ok(tracks)
    }
}
