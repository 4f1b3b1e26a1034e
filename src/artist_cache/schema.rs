//! SQLite schema definitions for the artist cache database.

use crate::sqlite_column;
use crate::sqlite_persistence::{SqlType, Table, VersionedSchema};

/// Enriched artists keyed by normalized candidate name.
const ARTIST_CACHE_TABLE: Table = Table {
    name: "artist_cache",
    columns: &[
        sqlite_column!("cache_key", &SqlType::Text, is_primary_key = true),
        sqlite_column!("artist_id", &SqlType::Text, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("verified_sources", &SqlType::Text, non_null = true), // JSON array
        sqlite_column!("album_count", &SqlType::Integer, non_null = true),
        sqlite_column!("years_active", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text, non_null = true),
        sqlite_column!("country", &SqlType::Text, non_null = true),
        sqlite_column!("image_url", &SqlType::Text, non_null = true),
        sqlite_column!("genres", &SqlType::Text, non_null = true), // JSON array
        sqlite_column!("external_urls", &SqlType::Text, non_null = true), // JSON object
        sqlite_column!("last_updated", &SqlType::Integer, non_null = true),
        sqlite_column!("cache_expiry", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_artist_cache_expiry", "cache_expiry")],
};

pub const ARTIST_CACHE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[ARTIST_CACHE_TABLE],
    migration: None,
}];
