use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use artist_discovery::artist_cache::{ArtistCache, SqliteArtistCache};
use artist_discovery::catalog::{CatalogSource, LastFmSource, MusicBrainzSource};
use artist_discovery::config::{self, AppConfig, CatalogSourceKind};
use artist_discovery::llm::{LlmProvider, LlmSuggestionService, OpenAIProvider};
use artist_discovery::playlist::SubsonicPlaylistSource;
use artist_discovery::recommend::{
    CandidateGenerator, MetadataEnricher, RecommendRequest, RecommendationPipeline,
};
use artist_discovery::server::{run_server, RequestsLoggingLevel, ServerConfig};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(name = "artist-discovery", version, about)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the artist cache database.
    /// Can also be specified in config file.
    #[clap(long, global = true, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// The level of logging to perform on each HTTP request.
    #[clap(long, global = true, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recommends artists for a playlist and prints them as JSON.
    Recommend {
        playlist: String,

        /// Only suggest artists in this genre.
        #[clap(long)]
        genre: Option<String>,

        /// How many artists to return.
        #[clap(long)]
        max: Option<usize>,

        /// Stop enriching candidates after this many seconds.
        #[clap(long)]
        deadline_secs: Option<u64>,
    },

    /// Serves recommendations over HTTP.
    Serve {
        /// The port to listen on.
        #[clap(short, long, default_value_t = 3002)]
        port: u16,

        /// Stop enriching candidates this many seconds after a request arrives.
        #[clap(long)]
        deadline_secs: Option<u64>,
    },

    /// Shows row counts of the artist cache.
    CacheStats,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        let port = match args.command {
            Command::Serve { port, .. } => port,
            _ => ServerConfig::default().port,
        };
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            port,
            logging_level: args.logging_level.clone(),
        }
    }
}

fn open_cache(app_config: &AppConfig) -> Result<Arc<SqliteArtistCache>> {
    let path = app_config.cache_db_path();
    info!("Opening artist cache at {:?}...", path);
    Ok(Arc::new(SqliteArtistCache::new(&path)?))
}

fn build_sources(app_config: &AppConfig) -> Result<Vec<Arc<dyn CatalogSource>>> {
    app_config
        .catalog_sources
        .iter()
        .map(|kind| -> Result<Arc<dyn CatalogSource>> {
            let source: Arc<dyn CatalogSource> = match kind {
                CatalogSourceKind::MusicBrainz => Arc::new(MusicBrainzSource::new(
                    &app_config.musicbrainz.user_agent,
                    app_config.musicbrainz.timeout,
                )?),
                CatalogSourceKind::LastFm => {
                    let api_key = app_config
                        .lastfm
                        .api_key
                        .as_deref()
                        .ok_or_else(|| anyhow!("Last.fm source requires an API key"))?;
                    Arc::new(LastFmSource::new(api_key, app_config.lastfm.timeout)?)
                }
            };
            Ok(source)
        })
        .collect()
}

async fn build_pipeline(app_config: &AppConfig) -> Result<RecommendationPipeline> {
    let subsonic = app_config.subsonic.as_ref().ok_or_else(|| {
        anyhow!("A [subsonic] section is required to read playlists, add one to the config file")
    })?;
    let playlists = SubsonicPlaylistSource::new(
        &subsonic.url,
        &subsonic.username,
        &subsonic.password,
        subsonic.timeout,
    )
    .context("Failed to create Subsonic client")?;
    info!("Reading playlists from {}", subsonic.url);

    let provider = OpenAIProvider::new(
        app_config.llm.base_url.clone(),
        app_config.llm.model.clone(),
        app_config.llm.api_key.clone(),
    );
    if let Err(e) = provider.health_check().await {
        warn!(
            "LLM endpoint {} did not pass the health check: {}",
            app_config.llm.base_url, e
        );
    }
    info!(
        "Suggesting artists with {} via {}",
        app_config.llm.model, app_config.llm.base_url
    );
    let suggestions =
        LlmSuggestionService::new(Arc::new(provider), app_config.llm.completion.clone());
    let generator =
        CandidateGenerator::new(Arc::new(suggestions), app_config.max_seed_descriptors);

    let cache: Arc<dyn ArtistCache> = open_cache(app_config)?;
    let enricher = MetadataEnricher::new(cache, build_sources(app_config)?, app_config.enrichment);
    info!("Catalog sources: {}", enricher.source_names().join(", "));

    Ok(RecommendationPipeline::new(
        Arc::new(playlists),
        generator,
        Arc::new(enricher),
        app_config.pipeline,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialise logging")?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!(
        "  catalog_sources: {:?}",
        app_config
            .catalog_sources
            .iter()
            .map(CatalogSourceKind::as_str)
            .collect::<Vec<_>>()
    );

    match cli_args.command {
        Command::Recommend {
            playlist,
            genre,
            max,
            deadline_secs,
        } => {
            let pipeline = build_pipeline(&app_config).await?;

            let mut request =
                RecommendRequest::new(playlist, max.unwrap_or(app_config.default_max_results));
            if let Some(genre) = genre {
                request = request.with_genre(genre);
            }
            if let Some(secs) = deadline_secs {
                request = request.with_deadline(Duration::from_secs(secs));
            }

            let cancel = CancellationToken::new();
            let ctrl_c_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, finishing enrichments already in flight");
                    ctrl_c_cancel.cancel();
                }
            });

            let response = pipeline.generate_recommendations(request, cancel).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Serve { deadline_secs, .. } => {
            let pipeline = build_pipeline(&app_config).await?;
            let server_config = ServerConfig {
                port: app_config.port,
                requests_logging_level: app_config.logging_level.clone(),
                default_max_results: app_config.default_max_results,
                request_deadline: deadline_secs.map(Duration::from_secs),
            };
            run_server(server_config, Arc::new(pipeline)).await?;
        }
        Command::CacheStats => {
            let stats = open_cache(&app_config)?.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
