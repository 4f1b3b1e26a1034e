//! Artist Discovery Library
//!
//! Recommends artists a listener does not know yet, starting from one of
//! their playlists. This library exposes the internal modules for testing
//! and reuse by the binary.

pub mod artist_cache;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod llm;
pub mod playlist;
pub mod recommend;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use artist_cache::{Artist, ArtistCache, SqliteArtistCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use recommend::{
    RecommendError, RecommendRequest, RecommendResponse, RecommendationPipeline, RunStats,
};
pub use server::run_server;
