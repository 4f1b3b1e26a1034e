use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{log_requests, state::ServerState, ServerConfig};
use crate::recommend::{RecommendError, RecommendRequest, RecommendationPipeline};

#[derive(Serialize)]
struct HealthResponse {
    pub status: &'static str,
    pub uptime: String,
}

#[derive(Serialize)]
struct ErrorBody {
    pub error: String,
}

#[derive(Deserialize, Debug)]
struct RecommendBody {
    pub playlist: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

fn status_for(error: &RecommendError) -> StatusCode {
    match error {
        RecommendError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        RecommendError::PlaylistNotFound(_) => StatusCode::NOT_FOUND,
        RecommendError::PlaylistUnavailable(_) | RecommendError::Generation(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

impl IntoResponse for RecommendError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

async fn health(State(state): State<ServerState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime: format_uptime(state.start_time.elapsed()),
    })
}

async fn post_recommendations(
    State(state): State<ServerState>,
    Json(body): Json<RecommendBody>,
) -> Response {
    let mut request = RecommendRequest::new(
        body.playlist,
        body.max_results.unwrap_or(state.config.default_max_results),
    );
    request.genre = body.genre;
    request.deadline = state.config.request_deadline;

    match state
        .pipeline
        .generate_recommendations(request, CancellationToken::new())
        .await
    {
        Ok(response) => Json(response).into_response(),
        Err(e) => e.into_response(),
    }
}

pub fn make_app(config: ServerConfig, pipeline: Arc<RecommendationPipeline>) -> Router {
    let state = ServerState::new(config, pipeline);

    let recommendation_routes: Router = Router::new()
        .route("/recommendations", post(post_recommendations))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health))
        .with_state(state.clone())
        .nest("/v1", recommendation_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

pub async fn run_server(config: ServerConfig, pipeline: Arc<RecommendationPipeline>) -> Result<()> {
    let port = config.port;
    let app = make_app(config, pipeline);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on 127.0.0.1:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artist_cache::SqliteArtistCache;
    use crate::catalog::{ArtistFragment, CatalogError, CatalogSource};
    use crate::playlist::{PlaylistError, PlaylistSource, PlaylistTrack};
    use crate::recommend::{
        CandidateGenerator, EnrichmentPolicy, MetadataEnricher, PipelineSettings, RecommendResponse,
        SeedContext, Suggestion, SuggestionError, SuggestionService,
    };
    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use tempfile::TempDir;
    use tower::ServiceExt; // for `oneshot`

    struct StaticPlaylists;

    #[async_trait]
    impl PlaylistSource for StaticPlaylists {
        async fn get_playlist_tracks(&self, name: &str) -> Result<Vec<PlaylistTrack>, PlaylistError> {
            match name {
                "Focus" => Ok(vec![PlaylistTrack::new("Avril 14th", "Aphex Twin")]),
                "Broken" => Err(PlaylistError::Unavailable("connection refused".to_string())),
                _ => Err(PlaylistError::NotFound(name.to_string())),
            }
        }
    }

    struct StaticSuggestions;

    #[async_trait]
    impl SuggestionService for StaticSuggestions {
        async fn suggest(
            &self,
            _context: &SeedContext,
            genre_hint: Option<&str>,
        ) -> Result<Vec<Suggestion>, SuggestionError> {
            if genre_hint == Some("unsupported") {
                return Err(SuggestionError::Timeout);
            }
            Ok(["Aphex Twin", "Boards of Canada"]
                .into_iter()
                .map(|name| Suggestion {
                    name: name.to_string(),
                    genre: None,
                })
                .collect())
        }
    }

    struct EchoCatalog;

    #[async_trait]
    impl CatalogSource for EchoCatalog {
        fn name(&self) -> &str {
            "echo"
        }

        async fn lookup(&self, name: &str) -> Result<Option<ArtistFragment>, CatalogError> {
            Ok(Some(ArtistFragment {
                source: "echo".to_string(),
                name: name.to_string(),
                ..Default::default()
            }))
        }
    }

    fn app() -> (TempDir, Router) {
        let dir = TempDir::new().unwrap();
        let cache = SqliteArtistCache::new(dir.path().join("artist_cache.db")).unwrap();
        let enricher = MetadataEnricher::new(
            Arc::new(cache),
            vec![Arc::new(EchoCatalog) as Arc<dyn CatalogSource>],
            EnrichmentPolicy::default(),
        );
        let pipeline = RecommendationPipeline::new(
            Arc::new(StaticPlaylists),
            CandidateGenerator::new(Arc::new(StaticSuggestions), 50),
            Arc::new(enricher),
            PipelineSettings::default(),
        );
        (dir, make_app(ServerConfig::default(), Arc::new(pipeline)))
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/recommendations")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_responds_ok() {
        let (_dir, app) = app();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn recommends_unknown_artists() {
        let (_dir, app) = app();

        let response = app
            .oneshot(post_json(r#"{"playlist": "Focus", "max_results": 5}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: RecommendResponse = body_json(response).await;
        let names: Vec<_> = body.artists.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Boards of Canada"]);
        assert_eq!(body.stats.filtered_count, 1);
    }

    #[tokio::test]
    async fn maps_errors_to_status_codes() {
        let cases = [
            (r#"{"playlist": "Nowhere"}"#, StatusCode::NOT_FOUND),
            (r#"{"playlist": "Broken"}"#, StatusCode::BAD_GATEWAY),
            (
                r#"{"playlist": "Focus", "genre": "unsupported"}"#,
                StatusCode::BAD_GATEWAY,
            ),
            (r#"{"playlist": "Focus", "max_results": 0}"#, StatusCode::BAD_REQUEST),
            (r#"{"playlist": " "}"#, StatusCode::BAD_REQUEST),
        ];

        for (body, expected) in cases {
            let (_dir, app) = app();
            let response = app.oneshot(post_json(body)).await.unwrap();
            assert_eq!(response.status(), expected, "body: {}", body);
        }
    }

    #[test]
    fn formats_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d 01:01:01");
    }
}
