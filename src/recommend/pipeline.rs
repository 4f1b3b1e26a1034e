//! One recommendation run, from playlist to enriched artists.
//!
//! ```text
//! SeedExtraction → Generation → Filtering → Enrichment → Assembly → Done
//!        └──────────────┴──→ Failed
//! ```
//!
//! Only the playlist lookup and candidate generation can fail a run.
//! Enrichment failures are recorded in the run's error log and the run
//! carries on with the remaining candidates.

use super::candidates::{CandidateGenerator, GenerationFailure, SeedDescriptor};
use super::enricher::MetadataEnricher;
use super::known_filter::KnownArtists;
use super::models::{PipelineStage, RecommendRequest, RecommendResponse};
use super::normalize::normalize_name;
use super::stats::StatsAccumulator;
use crate::playlist::{PlaylistError, PlaylistSource};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A run that produced no response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecommendError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("playlist not found: {0}")]
    PlaylistNotFound(String),

    #[error("playlist source unavailable: {0}")]
    PlaylistUnavailable(String),

    #[error("candidate generation failed: {0}")]
    Generation(#[from] GenerationFailure),
}

impl From<PlaylistError> for RecommendError {
    fn from(e: PlaylistError) -> Self {
        match e {
            PlaylistError::NotFound(name) => RecommendError::PlaylistNotFound(name),
            PlaylistError::Unavailable(msg) | PlaylistError::InvalidResponse(msg) => {
                RecommendError::PlaylistUnavailable(msg)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Concurrent enrichments per run.
    pub enrichment_workers: usize,
    /// Requests asking for more results are clamped to this.
    pub max_results_limit: usize,
    /// Suggestions requested per wanted result.
    pub candidate_oversample: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            enrichment_workers: 4,
            max_results_limit: 50,
            candidate_oversample: 2,
        }
    }
}

/// Cancels a token once a deadline passes, unless dropped first.
struct DeadlineGuard(JoinHandle<()>);

impl DeadlineGuard {
    fn spawn(token: CancellationToken, after: Duration) -> Self {
        Self(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            debug!("Recommendation deadline reached");
            token.cancel();
        }))
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct RecommendationPipeline {
    playlists: Arc<dyn PlaylistSource>,
    generator: CandidateGenerator,
    enricher: Arc<MetadataEnricher>,
    settings: PipelineSettings,
}

impl RecommendationPipeline {
    pub fn new(
        playlists: Arc<dyn PlaylistSource>,
        generator: CandidateGenerator,
        enricher: Arc<MetadataEnricher>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            playlists,
            generator,
            enricher,
            settings,
        }
    }

    /// Run the whole pipeline for one request.
    ///
    /// Once `cancel` fires (or the request deadline passes) no further
    /// enrichment is started; enrichments already running complete and the
    /// response holds what finished.
    pub async fn generate_recommendations(
        &self,
        request: RecommendRequest,
        cancel: CancellationToken,
    ) -> Result<RecommendResponse, RecommendError> {
        let started = Instant::now();

        let playlist = request.playlist.trim();
        if playlist.is_empty() {
            return Err(RecommendError::InvalidRequest(
                "playlist name is empty".to_string(),
            ));
        }
        if request.max_results == 0 {
            return Err(RecommendError::InvalidRequest(
                "max_results must be at least 1".to_string(),
            ));
        }
        let max_results = request.max_results.min(self.settings.max_results_limit);
        let genre = request
            .genre
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty());

        let cancel = cancel.child_token();
        let _deadline = request
            .deadline
            .map(|after| DeadlineGuard::spawn(cancel.clone(), after));

        let stats = Arc::new(StatsAccumulator::new());

        enter(PipelineStage::SeedExtraction);
        let tracks = self
            .playlists
            .get_playlist_tracks(playlist)
            .await
            .map_err(|e| fail(PipelineStage::SeedExtraction, e.into()))?;
        stats.set_seed_track_count(tracks.len());

        let known = KnownArtists::new(tracks.iter().map(|t| t.artist.as_str()));
        stats.set_known_artist_count(known.len());

        let mut seen = HashSet::new();
        let known_names: Vec<String> = tracks
            .iter()
            .filter(|t| seen.insert(normalize_name(&t.artist)))
            .map(|t| t.artist.clone())
            .collect();
        let seeds: Vec<SeedDescriptor> = tracks
            .into_iter()
            .map(|t| SeedDescriptor {
                artist: t.artist,
                track: t.title,
            })
            .collect();

        enter(PipelineStage::Generation);
        let wanted = max_results.saturating_mul(self.settings.candidate_oversample.max(1));
        let generated = self
            .generator
            .generate(&seeds, &known_names, genre, wanted)
            .await
            .map_err(|e| fail(PipelineStage::Generation, e.into()))?;
        stats.set_llm_suggestion_count(generated.raw_count);

        enter(PipelineStage::Filtering);
        let candidates = known.retain_unknown(generated.candidates);
        stats.set_filtered_count(candidates.len());

        enter(PipelineStage::Enrichment);
        let total = candidates.len();
        let enricher = Arc::clone(&self.enricher);
        let run_stats = Arc::clone(&stats);
        let run_cancel = cancel.clone();
        let mut outcomes: Vec<_> = stream::iter(candidates.into_iter().enumerate())
            .map(move |(index, candidate)| {
                let enricher = Arc::clone(&enricher);
                let stats = Arc::clone(&run_stats);
                let cancel = run_cancel.clone();
                async move {
                    // Checked when the worker picks the candidate up, so nothing
                    // new starts after cancellation.
                    if cancel.is_cancelled() {
                        return (index, candidate, None);
                    }
                    let outcome = enricher.enrich(&candidate, &stats).await;
                    (index, candidate, Some(outcome))
                }
            })
            .buffer_unordered(self.settings.enrichment_workers.max(1))
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _, _)| *index);

        enter(PipelineStage::Assembly);
        let mut artists = Vec::with_capacity(outcomes.len());
        let mut skipped = 0;
        for (_, candidate, outcome) in outcomes {
            match outcome {
                Some(Ok(artist)) => {
                    stats.record_enriched();
                    if artist.stale {
                        stats.push_error(format!(
                            "{}: catalogs unreachable, serving stale record",
                            candidate.name
                        ));
                    }
                    artists.push(artist);
                }
                Some(Err(e)) => {
                    warn!(candidate = %candidate.name, "Enrichment failed: {}", e);
                    stats.push_error(e.to_string());
                }
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(skipped, "Recommendation run cancelled before enrichment finished");
            stats.push_error(format!(
                "cancelled: {} of {} candidates were not enriched",
                skipped, total
            ));
        }

        let mut ids = HashSet::new();
        artists.retain(|artist| !known.contains(&artist.name) && ids.insert(artist.id.clone()));
        artists.truncate(max_results);

        let stats = stats.snapshot(started.elapsed());
        enter(PipelineStage::Done);
        info!(
            "Recommended {} artists for playlist '{}' in {}ms ({} suggested, {} unknown, {} enriched, {} catalog calls, {} cache hits, {} errors)",
            artists.len(),
            playlist,
            stats.duration_ms,
            stats.llm_suggestion_count,
            stats.filtered_count,
            stats.enriched_count,
            stats.api_call_count,
            stats.cache_hits,
            stats.errors.len()
        );

        Ok(RecommendResponse { artists, stats })
    }
}

fn enter(stage: PipelineStage) {
    debug!(stage = %stage, "Pipeline stage");
}

fn fail(stage: PipelineStage, error: RecommendError) -> RecommendError {
    warn!(stage = %stage, "Recommendation run failed: {}", error);
    enter(PipelineStage::Failed);
    error
}
