use crate::recommend::{RecommendationPipeline, DEFAULT_MAX_RESULTS};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::RequestsLoggingLevel;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub requests_logging_level: RequestsLoggingLevel,
    /// Used when a request does not say how many artists it wants.
    pub default_max_results: usize,
    /// Enrichment stops being dispatched this long after a request arrives.
    pub request_deadline: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3002,
            requests_logging_level: RequestsLoggingLevel::default(),
            default_max_results: DEFAULT_MAX_RESULTS,
            request_deadline: None,
        }
    }
}

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub pipeline: Arc<RecommendationPipeline>,
}

impl ServerState {
    pub fn new(config: ServerConfig, pipeline: Arc<RecommendationPipeline>) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            pipeline,
        }
    }
}
