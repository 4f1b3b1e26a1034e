//! The recommendation pipeline and its stages.

pub mod candidates;
pub mod enricher;
pub mod known_filter;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod stats;

pub use candidates::{
    Candidate, CandidateGenerator, GenerationFailure, SeedContext, SeedDescriptor, Suggestion,
    SuggestionError, SuggestionService,
};
pub use enricher::{EnrichmentFailure, EnrichmentPolicy, MetadataEnricher};
pub use known_filter::{filter_known_artists, KnownArtists};
pub use models::{PipelineStage, RecommendRequest, RecommendResponse, DEFAULT_MAX_RESULTS};
pub use pipeline::{PipelineSettings, RecommendError, RecommendationPipeline};
pub use stats::{RunStats, StatsAccumulator};
