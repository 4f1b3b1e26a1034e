use super::fakes::{FakeCatalog, FakePlaylists, ScriptedSuggestions};
use artist_discovery::artist_cache::SqliteArtistCache;
use artist_discovery::catalog::CatalogSource;
use artist_discovery::clock::ManualClock;
use artist_discovery::playlist::PlaylistTrack;
use artist_discovery::recommend::{
    CandidateGenerator, EnrichmentPolicy, MetadataEnricher, PipelineSettings, RecommendError,
    RecommendRequest, RecommendResponse, RecommendationPipeline,
};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub const PLAYLIST_NAME: &str = "Late Night";

/// A pipeline wired to fakes and a real artist cache.
pub struct TestPipeline {
    pub pipeline: RecommendationPipeline,
    pub cache: Arc<SqliteArtistCache>,
    pub catalog: Arc<FakeCatalog>,
    pub suggestions: Arc<ScriptedSuggestions>,
    pub clock: ManualClock,
    pub policy: EnrichmentPolicy,
    _temp_dir: TempDir,
}

impl TestPipeline {
    /// One playlist, [`PLAYLIST_NAME`], with a track by each seed artist.
    pub fn new(seed_artists: &[&str], suggestions: &[&str], catalog: FakeCatalog) -> Self {
        Self::with_suggestions(
            seed_artists,
            ScriptedSuggestions::returning(suggestions),
            catalog,
        )
    }

    pub fn with_suggestions(
        seed_artists: &[&str],
        suggestions: ScriptedSuggestions,
        catalog: FakeCatalog,
    ) -> Self {
        Self::build(seed_artists, suggestions, catalog, PipelineSettings::default())
    }

    pub fn with_settings(
        seed_artists: &[&str],
        suggestions: &[&str],
        catalog: FakeCatalog,
        settings: PipelineSettings,
    ) -> Self {
        Self::build(
            seed_artists,
            ScriptedSuggestions::returning(suggestions),
            catalog,
            settings,
        )
    }

    fn build(
        seed_artists: &[&str],
        suggestions: ScriptedSuggestions,
        catalog: FakeCatalog,
        settings: PipelineSettings,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let clock = ManualClock::default();
        let cache = Arc::new(
            SqliteArtistCache::with_clock(
                temp_dir.path().join("artist_cache.db"),
                Arc::new(clock.clone()),
            )
            .expect("Failed to open artist cache"),
        );

        let tracks = seed_artists
            .iter()
            .enumerate()
            .map(|(i, artist)| PlaylistTrack::new(format!("Track {}", i + 1), *artist))
            .collect();
        let playlists = FakePlaylists::default().with_playlist(PLAYLIST_NAME, tracks);

        let catalog = Arc::new(catalog);
        let suggestions = Arc::new(suggestions);
        let policy = EnrichmentPolicy::default();
        let sources: Vec<Arc<dyn CatalogSource>> = vec![catalog.clone()];
        let enricher = MetadataEnricher::new(cache.clone(), sources, policy);
        let pipeline = RecommendationPipeline::new(
            Arc::new(playlists),
            CandidateGenerator::new(suggestions.clone(), 50),
            Arc::new(enricher),
            settings,
        );

        Self {
            pipeline,
            cache,
            catalog,
            suggestions,
            clock,
            policy,
            _temp_dir: temp_dir,
        }
    }

    pub async fn run(&self, max_results: usize) -> Result<RecommendResponse, RecommendError> {
        self.run_request(RecommendRequest::new(PLAYLIST_NAME, max_results))
            .await
    }

    pub async fn run_request(
        &self,
        request: RecommendRequest,
    ) -> Result<RecommendResponse, RecommendError> {
        self.pipeline
            .generate_recommendations(request, CancellationToken::new())
            .await
    }
}
