mod models;
mod schema;
mod store;
mod trait_def;

pub use models::{Artist, CacheStats, CachedArtist};
pub use store::SqliteArtistCache;
pub use trait_def::ArtistCache;
