//! Request and response types of a recommendation run.

use super::stats::RunStats;
use crate::artist_cache::Artist;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_MAX_RESULTS: usize = 10;

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendRequest {
    /// Name of the playlist to seed from.
    pub playlist: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Stop dispatching enrichment work after this long.
    #[serde(skip)]
    pub deadline: Option<Duration>,
}

impl RecommendRequest {
    pub fn new(playlist: impl Into<String>, max_results: usize) -> Self {
        Self {
            playlist: playlist.into(),
            genre: None,
            max_results,
            deadline: None,
        }
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendResponse {
    /// Verified artists in the order the suggestion service proposed them.
    pub artists: Vec<Artist>,
    pub stats: RunStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    SeedExtraction,
    Generation,
    Filtering,
    Enrichment,
    Assembly,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::SeedExtraction => "seed_extraction",
            PipelineStage::Generation => "generation",
            PipelineStage::Filtering => "filtering",
            PipelineStage::Enrichment => "enrichment",
            PipelineStage::Assembly => "assembly",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}
