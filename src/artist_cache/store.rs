//! SQLite-backed artist cache implementation.

use super::models::{Artist, CacheStats, CachedArtist};
use super::schema::ARTIST_CACHE_VERSIONED_SCHEMAS;
use super::trait_def::ArtistCache;
use crate::clock::{Clock, SystemClock};
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// SQLite-backed artist cache.
///
/// Writes go through a single connection behind a mutex, so concurrent
/// `put`s to the same key are serialized and the last one wins.
#[derive(Clone)]
pub struct SqliteArtistCache {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
}

/// Raw column values of one `artist_cache` row.
struct ArtistRow {
    artist_id: String,
    name: String,
    verified_sources: String,
    album_count: i64,
    years_active: String,
    description: String,
    country: String,
    image_url: String,
    genres: String,
    external_urls: String,
    last_updated: i64,
    cache_expiry: i64,
}

impl ArtistRow {
    fn decode(self) -> Result<Artist> {
        let verified_sources: BTreeSet<String> = serde_json::from_str(&self.verified_sources)
            .context("verified_sources is not a JSON array")?;
        let genres: Vec<String> =
            serde_json::from_str(&self.genres).context("genres is not a JSON array")?;
        let external_urls: BTreeMap<String, String> = serde_json::from_str(&self.external_urls)
            .context("external_urls is not a JSON object")?;
        let last_updated = DateTime::from_timestamp(self.last_updated, 0)
            .context("last_updated out of range")?;
        let cache_expiry = DateTime::from_timestamp(self.cache_expiry, 0)
            .context("cache_expiry out of range")?;

        Ok(Artist {
            id: self.artist_id,
            name: self.name,
            verified_sources,
            album_count: u32::try_from(self.album_count).unwrap_or(0),
            years_active: self.years_active,
            description: self.description,
            country: self.country,
            image_url: self.image_url,
            genres,
            external_urls,
            last_updated,
            cache_expiry,
            stale: false,
        })
    }
}

impl SqliteArtistCache {
    /// Open (or create) the cache database at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::with_clock(db_path, Arc::new(SystemClock))
    }

    /// Open the cache with an explicit time source.
    pub fn with_clock<P: AsRef<Path>>(db_path: P, clock: Arc<dyn Clock>) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open artist cache database")?;

        migrate_if_needed(&mut write_conn, ARTIST_CACHE_VERSIONED_SCHEMAS, "artist cache")?;

        write_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on artist cache write connection")?;

        let read_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open artist cache database for reading")?;

        let cache = Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
            clock,
        };

        let stats = cache.stats()?;
        info!(
            "Artist cache ready: {} records ({} fresh, {} negative)",
            stats.total, stats.fresh, stats.negative
        );

        Ok(cache)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("Failed to serialize artist cache column")
}

impl ArtistCache for SqliteArtistCache {
    fn get(&self, key: &str) -> Result<Option<CachedArtist>> {
        let row = {
            let conn = self.read_conn.lock().unwrap();
            let mut stmt = conn.prepare_cached(
                "SELECT artist_id, name, verified_sources, album_count, years_active,
                        description, country, image_url, genres, external_urls,
                        last_updated, cache_expiry
                 FROM artist_cache WHERE cache_key = ?1",
            )?;
            stmt.query_row(params![key], |row| {
                Ok(ArtistRow {
                    artist_id: row.get(0)?,
                    name: row.get(1)?,
                    verified_sources: row.get(2)?,
                    album_count: row.get(3)?,
                    years_active: row.get(4)?,
                    description: row.get(5)?,
                    country: row.get(6)?,
                    image_url: row.get(7)?,
                    genres: row.get(8)?,
                    external_urls: row.get(9)?,
                    last_updated: row.get(10)?,
                    cache_expiry: row.get(11)?,
                })
            })
            .optional()?
        };

        let Some(row) = row else {
            return Ok(None);
        };

        match row.decode() {
            Ok(artist) => {
                let fresh = artist.is_fresh_at(self.clock.now());
                Ok(Some(CachedArtist { artist, fresh }))
            }
            Err(e) => {
                warn!(cache_key = %key, "Undecodable artist cache row, treating as miss: {:#}", e);
                Ok(None)
            }
        }
    }

    fn put(&self, key: &str, artist: &Artist, ttl: Duration) -> Result<Artist> {
        // Stored with second precision.
        let now = self.clock.now().trunc_subsecs(0);
        let mut stamped = artist.clone();
        stamped.last_updated = now;
        stamped.cache_expiry = now
            .checked_add_signed(ttl)
            .ok_or_else(|| anyhow!("Cache TTL of {} overflows the expiry time", ttl))?;
        stamped.stale = false;

        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO artist_cache
             (cache_key, artist_id, name, verified_sources, album_count, years_active,
              description, country, image_url, genres, external_urls,
              last_updated, cache_expiry)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                key,
                stamped.id,
                stamped.name,
                to_json(&stamped.verified_sources)?,
                stamped.album_count,
                stamped.years_active,
                stamped.description,
                stamped.country,
                stamped.image_url,
                to_json(&stamped.genres)?,
                to_json(&stamped.external_urls)?,
                stamped.last_updated.timestamp(),
                stamped.cache_expiry.timestamp(),
            ],
        )?;
        Ok(stamped)
    }

    fn stats(&self) -> Result<CacheStats> {
        let now = self.clock.now().timestamp();
        let conn = self.read_conn.lock().unwrap();
        let total: usize = conn.query_row("SELECT COUNT(*) FROM artist_cache", [], |r| r.get(0))?;
        let fresh: usize = conn.query_row(
            "SELECT COUNT(*) FROM artist_cache WHERE cache_expiry > ?1",
            params![now],
            |r| r.get(0),
        )?;
        let negative: usize = conn.query_row(
            "SELECT COUNT(*) FROM artist_cache WHERE verified_sources = '[]'",
            [],
            |r| r.get(0),
        )?;
        Ok(CacheStats {
            total,
            fresh,
            negative,
        })
    }
}
