//! Per-run counters and error log.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Statistics describing one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub duration_ms: u64,
    pub seed_track_count: usize,
    pub known_artist_count: usize,
    pub llm_suggestion_count: usize,
    pub filtered_count: usize,
    pub enriched_count: usize,
    pub api_call_count: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// Non-fatal problems, one per affected candidate in candidate order,
    /// then a cancellation note if the run was cut short.
    pub errors: Vec<String>,
}

/// Shared, concurrency-safe accumulator behind [`RunStats`].
///
/// Counters are independent of each other and use relaxed atomics: no
/// counter is used to publish other data. They are read only through
/// [`StatsAccumulator::snapshot`], after every enrichment future has
/// completed, so the final values are exact.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    seed_track_count: AtomicUsize,
    known_artist_count: AtomicUsize,
    llm_suggestion_count: AtomicUsize,
    filtered_count: AtomicUsize,
    enriched_count: AtomicUsize,
    api_call_count: AtomicUsize,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    errors: Mutex<Vec<String>>,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_seed_track_count(&self, count: usize) {
        self.seed_track_count.store(count, Ordering::Relaxed);
    }

    pub fn set_known_artist_count(&self, count: usize) {
        self.known_artist_count.store(count, Ordering::Relaxed);
    }

    pub fn set_llm_suggestion_count(&self, count: usize) {
        self.llm_suggestion_count.store(count, Ordering::Relaxed);
    }

    pub fn set_filtered_count(&self, count: usize) {
        self.filtered_count.store(count, Ordering::Relaxed);
    }

    pub fn record_enriched(&self) {
        self.enriched_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_api_call(&self) {
        self.api_call_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn push_error(&self, error: impl Into<String>) {
        self.errors.lock().unwrap().push(error.into());
    }

    pub fn snapshot(&self, duration: Duration) -> RunStats {
        RunStats {
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            seed_track_count: self.seed_track_count.load(Ordering::Relaxed),
            known_artist_count: self.known_artist_count.load(Ordering::Relaxed),
            llm_suggestion_count: self.llm_suggestion_count.load(Ordering::Relaxed),
            filtered_count: self.filtered_count.load(Ordering::Relaxed),
            enriched_count: self.enriched_count.load(Ordering::Relaxed),
            api_call_count: self.api_call_count.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            errors: self.errors.lock().unwrap().clone(),
        }
    }
}
