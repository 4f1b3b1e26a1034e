mod file_config;

pub use file_config::{
    CacheConfig, FileConfig, LastFmConfig, LlmConfig, MusicBrainzConfig, PipelineConfig,
    SubsonicConfig,
};

use crate::llm::{ApiKeySource, CompletionOptions};
use crate::recommend::{EnrichmentPolicy, PipelineSettings, DEFAULT_MAX_RESULTS};
use crate::server::RequestsLoggingLevel;
use anyhow::{anyhow, bail, Result};
use clap::ValueEnum;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

const ARTIST_CACHE_DB_FILE: &str = "artist_cache.db";

const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LLM_TIMEOUT_SEC: u64 = 120;
const DEFAULT_CATALOG_TIMEOUT_SEC: u64 = 30;
const DEFAULT_SUBSONIC_TIMEOUT_SEC: u64 = 30;
const DEFAULT_SUCCESS_TTL_DAYS: i64 = 30;
const DEFAULT_FAILURE_TTL_HOURS: i64 = 24;
const MAX_CACHE_TTL_DAYS: i64 = 3650;
const DEFAULT_MAX_SEED_DESCRIPTORS: usize = 50;
const DEFAULT_MUSICBRAINZ_USER_AGENT: &str = concat!("artist-discovery/", env!("CARGO_PKG_VERSION"));

/// CLI arguments that can be used for config resolution.
/// TOML config overrides them where present.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
}

/// A catalog the enricher can query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogSourceKind {
    MusicBrainz,
    LastFm,
}

impl CatalogSourceKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "musicbrainz" => Some(Self::MusicBrainz),
            "lastfm" => Some(Self::LastFm),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MusicBrainz => "musicbrainz",
            Self::LastFm => "lastfm",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,

    pub llm: LlmSettings,
    /// Absent when no media server is configured; only `cache-stats` works
    /// without one.
    pub subsonic: Option<SubsonicSettings>,
    /// Lookup and merge priority, highest first.
    pub catalog_sources: Vec<CatalogSourceKind>,
    pub musicbrainz: MusicBrainzSettings,
    pub lastfm: LastFmSettings,
    pub enrichment: EnrichmentPolicy,
    pub pipeline: PipelineSettings,
    pub default_max_results: usize,
    pub max_seed_descriptors: usize,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: ApiKeySource,
    pub completion: CompletionOptions,
}

#[derive(Debug, Clone)]
pub struct SubsonicSettings {
    pub url: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MusicBrainzSettings {
    pub user_agent: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LastFmSettings {
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present. Secrets missing from
    /// the file are read from the environment.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        Self::resolve_with_env(cli, file_config, |name| std::env::var(name).ok())
    }

    pub fn resolve_with_env(
        cli: &CliConfig,
        file_config: Option<FileConfig>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| anyhow!("db_dir must be specified via --db-dir or in config file"))?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let llm_file = file.llm.unwrap_or_default();
        let api_key = match (
            non_empty(llm_file.api_key_command),
            non_empty(llm_file.api_key).or_else(|| non_empty(env("LLM_API_KEY"))),
        ) {
            (Some(command), _) => ApiKeySource::Command(command),
            (None, Some(key)) => ApiKeySource::Static(key),
            (None, None) => ApiKeySource::None,
        };
        let completion_defaults = CompletionOptions::default();
        let llm = LlmSettings {
            base_url: llm_file
                .base_url
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            model: llm_file
                .model
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            api_key,
            completion: CompletionOptions {
                temperature: llm_file
                    .temperature
                    .unwrap_or(completion_defaults.temperature),
                max_tokens: llm_file.max_tokens.or(completion_defaults.max_tokens),
                timeout: Duration::from_secs(
                    llm_file.timeout_sec.unwrap_or(DEFAULT_LLM_TIMEOUT_SEC),
                ),
            },
        };

        let subsonic = match file.subsonic {
            Some(sub) => {
                let url = non_empty(sub.url)
                    .ok_or_else(|| anyhow!("[subsonic] section requires a url"))?;
                let username = non_empty(sub.username)
                    .ok_or_else(|| anyhow!("[subsonic] section requires a username"))?;
                let password = non_empty(sub.password)
                    .or_else(|| non_empty(env("SUBSONIC_PASSWORD")))
                    .ok_or_else(|| {
                        anyhow!("Subsonic password must be set in config or SUBSONIC_PASSWORD")
                    })?;
                Some(SubsonicSettings {
                    url,
                    username,
                    password,
                    timeout: Duration::from_secs(
                        sub.timeout_sec.unwrap_or(DEFAULT_SUBSONIC_TIMEOUT_SEC),
                    ),
                })
            }
            None => None,
        };

        let mb_file = file.musicbrainz.unwrap_or_default();
        let musicbrainz = MusicBrainzSettings {
            user_agent: non_empty(mb_file.user_agent)
                .unwrap_or_else(|| DEFAULT_MUSICBRAINZ_USER_AGENT.to_string()),
            timeout: Duration::from_secs(mb_file.timeout_sec.unwrap_or(DEFAULT_CATALOG_TIMEOUT_SEC)),
        };

        let lastfm_file = file.lastfm.unwrap_or_default();
        let lastfm = LastFmSettings {
            api_key: non_empty(lastfm_file.api_key).or_else(|| non_empty(env("LASTFM_API_KEY"))),
            timeout: Duration::from_secs(
                lastfm_file.timeout_sec.unwrap_or(DEFAULT_CATALOG_TIMEOUT_SEC),
            ),
        };

        let catalog_sources = parse_catalog_sources(
            file.catalog_sources
                .unwrap_or_else(|| vec!["musicbrainz".to_string(), "lastfm".to_string()]),
        )?;
        if catalog_sources.contains(&CatalogSourceKind::LastFm) && lastfm.api_key.is_none() {
            bail!("Last.fm catalog source requires [lastfm] api_key or LASTFM_API_KEY");
        }

        let cache_file = file.cache.unwrap_or_default();
        let success_ttl_days = cache_file.success_ttl_days.unwrap_or(DEFAULT_SUCCESS_TTL_DAYS);
        if !(1..=MAX_CACHE_TTL_DAYS).contains(&success_ttl_days) {
            bail!(
                "[cache] success_ttl_days must be between 1 and {}, got {}",
                MAX_CACHE_TTL_DAYS,
                success_ttl_days
            );
        }
        let failure_ttl_hours = cache_file
            .failure_ttl_hours
            .unwrap_or(DEFAULT_FAILURE_TTL_HOURS);
        if !(1..=MAX_CACHE_TTL_DAYS * 24).contains(&failure_ttl_hours) {
            bail!(
                "[cache] failure_ttl_hours must be between 1 and {}, got {}",
                MAX_CACHE_TTL_DAYS * 24,
                failure_ttl_hours
            );
        }
        let enrichment = EnrichmentPolicy {
            success_ttl: chrono::Duration::days(success_ttl_days),
            failure_ttl: chrono::Duration::hours(failure_ttl_hours),
        };

        let pipeline_file = file.pipeline.unwrap_or_default();
        let pipeline_defaults = PipelineSettings::default();
        let pipeline = PipelineSettings {
            enrichment_workers: pipeline_file
                .enrichment_workers
                .unwrap_or(pipeline_defaults.enrichment_workers),
            max_results_limit: pipeline_file
                .max_results_limit
                .unwrap_or(pipeline_defaults.max_results_limit),
            candidate_oversample: pipeline_file
                .candidate_oversample
                .unwrap_or(pipeline_defaults.candidate_oversample),
        };
        let default_max_results = pipeline_file
            .default_max_results
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .min(pipeline.max_results_limit);
        let max_seed_descriptors = pipeline_file
            .max_seed_descriptors
            .unwrap_or(DEFAULT_MAX_SEED_DESCRIPTORS);

        if pipeline.enrichment_workers == 0
            || pipeline.max_results_limit == 0
            || pipeline.candidate_oversample == 0
            || default_max_results == 0
            || max_seed_descriptors == 0
        {
            bail!("[pipeline] values must be at least 1");
        }

        Ok(Self {
            db_dir,
            port,
            logging_level,
            llm,
            subsonic,
            catalog_sources,
            musicbrainz,
            lastfm,
            enrichment,
            pipeline,
            default_max_results,
            max_seed_descriptors,
        })
    }

    pub fn cache_db_path(&self) -> PathBuf {
        self.db_dir.join(ARTIST_CACHE_DB_FILE)
    }
}

fn parse_catalog_sources(names: Vec<String>) -> Result<Vec<CatalogSourceKind>> {
    if names.is_empty() {
        bail!("catalog_sources must name at least one source");
    }
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|name| {
            let kind = CatalogSourceKind::parse(name)
                .ok_or_else(|| anyhow!("Unknown catalog source: {:?}", name))?;
            if !seen.insert(kind) {
                bail!("Catalog source listed twice: {:?}", name);
            }
            Ok(kind)
        })
        .collect()
}

fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn cli_with_dir(dir: &TempDir) -> CliConfig {
        CliConfig {
            db_dir: Some(dir.path().to_path_buf()),
            port: 3002,
            logging_level: RequestsLoggingLevel::Path,
        }
    }

    fn musicbrainz_only() -> FileConfig {
        FileConfig {
            catalog_sources: Some(vec!["musicbrainz".to_string()]),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_defaults() {
        let temp_dir = TempDir::new().unwrap();

        let config =
            AppConfig::resolve_with_env(&cli_with_dir(&temp_dir), Some(musicbrainz_only()), no_env)
                .unwrap();

        assert_eq!(config.port, 3002);
        assert_eq!(config.catalog_sources, vec![CatalogSourceKind::MusicBrainz]);
        assert_eq!(config.enrichment, EnrichmentPolicy::default());
        assert_eq!(config.pipeline, PipelineSettings::default());
        assert_eq!(config.default_max_results, 10);
        assert_eq!(config.max_seed_descriptors, 50);
        assert_eq!(config.llm.completion.timeout, Duration::from_secs(120));
        assert_eq!(config.llm.api_key, ApiKeySource::None);
        assert_eq!(config.musicbrainz.timeout, Duration::from_secs(30));
        assert!(config.subsonic.is_none());
        assert_eq!(config.cache_db_path(), temp_dir.path().join("artist_cache.db"));
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/should/be/overridden")),
            port: 3002,
            logging_level: RequestsLoggingLevel::Path,
        };
        let file_config = FileConfig {
            db_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            port: Some(4000),
            logging_level: Some("headers".to_string()),
            ..musicbrainz_only()
        };

        let config = AppConfig::resolve_with_env(&cli, Some(file_config), no_env).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.port, 4000);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Headers);
    }

    #[test]
    fn test_default_sources_need_lastfm_key() {
        let temp_dir = TempDir::new().unwrap();

        let missing = AppConfig::resolve_with_env(&cli_with_dir(&temp_dir), None, no_env);
        assert!(missing.unwrap_err().to_string().contains("LASTFM_API_KEY"));

        let config = AppConfig::resolve_with_env(&cli_with_dir(&temp_dir), None, |name| {
            (name == "LASTFM_API_KEY").then(|| "abc123".to_string())
        })
        .unwrap();
        assert_eq!(
            config.catalog_sources,
            vec![CatalogSourceKind::MusicBrainz, CatalogSourceKind::LastFm]
        );
        assert_eq!(config.lastfm.api_key.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_catalog_source_validation() {
        let temp_dir = TempDir::new().unwrap();
        let resolve = |names: &[&str]| {
            let file = FileConfig {
                catalog_sources: Some(names.iter().map(|n| n.to_string()).collect()),
                ..Default::default()
            };
            AppConfig::resolve_with_env(&cli_with_dir(&temp_dir), Some(file), no_env)
        };

        assert!(resolve(&["discogs"])
            .unwrap_err()
            .to_string()
            .contains("Unknown catalog source"));
        assert!(resolve(&["musicbrainz", "MusicBrainz"])
            .unwrap_err()
            .to_string()
            .contains("listed twice"));
        assert!(resolve(&[])
            .unwrap_err()
            .to_string()
            .contains("at least one"));
    }

    #[test]
    fn test_sections_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let toml_content = r#"
            catalog_sources = ["lastfm", "musicbrainz"]

            [llm]
            base_url = "http://localhost:11434/v1"
            model = "llama3.1"
            api_key_command = "pass show llm"
            timeout_sec = 60

            [subsonic]
            url = "http://navidrome:4533"
            username = "me"

            [lastfm]
            api_key = "k"

            [cache]
            success_ttl_days = 7
            failure_ttl_hours = 6

            [pipeline]
            enrichment_workers = 2
            max_results_limit = 20
            default_max_results = 30
        "#;
        let file: FileConfig = toml::from_str(toml_content).unwrap();

        let config = AppConfig::resolve_with_env(&cli_with_dir(&temp_dir), Some(file), |name| {
            (name == "SUBSONIC_PASSWORD").then(|| "sesame".to_string())
        })
        .unwrap();

        assert_eq!(
            config.catalog_sources,
            vec![CatalogSourceKind::LastFm, CatalogSourceKind::MusicBrainz]
        );
        assert_eq!(config.llm.model, "llama3.1");
        assert_eq!(
            config.llm.api_key,
            ApiKeySource::Command("pass show llm".to_string())
        );
        assert_eq!(config.llm.completion.timeout, Duration::from_secs(60));
        let subsonic = config.subsonic.unwrap();
        assert_eq!(subsonic.password, "sesame");
        assert_eq!(config.enrichment.success_ttl, chrono::Duration::days(7));
        assert_eq!(config.enrichment.failure_ttl, chrono::Duration::hours(6));
        assert_eq!(config.pipeline.enrichment_workers, 2);
        assert_eq!(config.default_max_results, 20);
    }

    #[test]
    fn test_cache_ttls_are_bounded() {
        let temp_dir = TempDir::new().unwrap();
        let resolve = |success_ttl_days: i64, failure_ttl_hours: i64| {
            let file = FileConfig {
                cache: Some(CacheConfig {
                    success_ttl_days: Some(success_ttl_days),
                    failure_ttl_hours: Some(failure_ttl_hours),
                }),
                ..musicbrainz_only()
            };
            AppConfig::resolve_with_env(&cli_with_dir(&temp_dir), Some(file), no_env)
        };

        assert!(resolve(3650, 87_600).is_ok());
        for (days, hours) in [(0, 24), (30, -1), (100_000_000, 24), (30, i64::MAX), (i64::MIN, 24)] {
            let err = resolve(days, hours).unwrap_err().to_string();
            assert!(err.contains("must be between 1 and"), "{}: {}", days, err);
        }
    }

    #[test]
    fn test_subsonic_without_password_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let file = FileConfig {
            subsonic: Some(SubsonicConfig {
                url: Some("http://navidrome:4533".to_string()),
                username: Some("me".to_string()),
                ..Default::default()
            }),
            ..musicbrainz_only()
        };

        let result = AppConfig::resolve_with_env(&cli_with_dir(&temp_dir), Some(file), no_env);

        assert!(result.unwrap_err().to_string().contains("SUBSONIC_PASSWORD"));
    }

    #[test]
    fn test_resolve_missing_db_dir_error() {
        let result = AppConfig::resolve_with_env(&CliConfig::default(), None, no_env);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_dir must be specified"));
    }

    #[test]
    fn test_file_config_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "port = 3100\n[lastfm]\napi_key = \"x\"\n").unwrap();

        let file = FileConfig::load(&path).unwrap();

        assert_eq!(file.port, Some(3100));
        assert_eq!(file.lastfm.unwrap().api_key.as_deref(), Some("x"));
        assert!(FileConfig::load(&temp_dir.path().join("missing.toml")).is_err());
    }
}
