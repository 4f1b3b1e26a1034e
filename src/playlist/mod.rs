//! Playlist retrieval from the listener's media server.

mod subsonic;

pub use subsonic::SubsonicPlaylistSource;

use async_trait::async_trait;
use thiserror::Error;

/// One entry of a playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistTrack {
    pub title: String,
    pub artist: String,
}

impl PlaylistTrack {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaylistError {
    #[error("no playlist named '{0}'")]
    NotFound(String),

    #[error("media server unavailable: {0}")]
    Unavailable(String),

    #[error("invalid media server response: {0}")]
    InvalidResponse(String),
}

/// Source of seed tracks.
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    /// Tracks of the playlist called `name`, in playlist order.
    async fn get_playlist_tracks(&self, name: &str) -> Result<Vec<PlaylistTrack>, PlaylistError>;
}
