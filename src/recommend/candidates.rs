//! Candidate generation through an external suggestion service.

use super::normalize::normalize_name;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Candidate names longer than this (in chars) are discarded.
pub const MAX_CANDIDATE_NAME_CHARS: usize = 100;

/// Genre hints longer than this (in chars) are dropped.
const MAX_GENRE_HINT_CHARS: usize = 60;

/// Upper bound on the known-artist list forwarded to the suggestion service.
const MAX_KNOWN_ARTISTS_IN_CONTEXT: usize = 200;

/// One track of the source playlist, as context for the suggestion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedDescriptor {
    pub artist: String,
    pub track: String,
}

/// Everything the suggestion service is told about the listener.
#[derive(Debug, Clone, Default)]
pub struct SeedContext {
    pub seeds: Vec<SeedDescriptor>,
    pub known_artists: Vec<String>,
    /// How many suggestions the caller would like.
    pub wanted: usize,
}

/// A raw entry returned by the suggestion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub name: String,
    pub genre: Option<String>,
}

/// A plausible, de-duplicated candidate artist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub genre: Option<String>,
}

impl Candidate {
    pub fn new(name: impl Into<String>, genre: Option<String>) -> Self {
        Self {
            name: name.into(),
            genre,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SuggestionError {
    #[error("suggestion service unavailable: {0}")]
    Unavailable(String),

    #[error("suggestion service timed out")]
    Timeout,

    #[error("malformed suggestion response: {0}")]
    MalformedResponse(String),
}

/// The external service proposing artists (a language model in production).
#[async_trait]
pub trait SuggestionService: Send + Sync {
    async fn suggest(
        &self,
        context: &SeedContext,
        genre_hint: Option<&str>,
    ) -> Result<Vec<Suggestion>, SuggestionError>;
}

/// Candidate generation failed; there is nothing to recommend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationFailure {
    #[error("suggestion service unavailable: {0}")]
    Unavailable(String),

    #[error("suggestion service timed out")]
    Timeout,

    #[error("malformed suggestion response: {0}")]
    MalformedResponse(String),
}

impl From<SuggestionError> for GenerationFailure {
    fn from(e: SuggestionError) -> Self {
        match e {
            SuggestionError::Unavailable(msg) => GenerationFailure::Unavailable(msg),
            SuggestionError::Timeout => GenerationFailure::Timeout,
            SuggestionError::MalformedResponse(msg) => GenerationFailure::MalformedResponse(msg),
        }
    }
}

/// Output of one generation call.
#[derive(Debug, Clone, Default)]
pub struct GeneratedCandidates {
    /// Entries returned by the service before any validation.
    pub raw_count: usize,
    pub candidates: Vec<Candidate>,
}

pub struct CandidateGenerator {
    service: Arc<dyn SuggestionService>,
    max_seed_descriptors: usize,
}

impl CandidateGenerator {
    pub fn new(service: Arc<dyn SuggestionService>, max_seed_descriptors: usize) -> Self {
        Self {
            service,
            max_seed_descriptors: max_seed_descriptors.max(1),
        }
    }

    /// Ask the suggestion service for `wanted` candidates.
    ///
    /// Implausible entries are dropped and duplicates (by normalized name)
    /// collapse to their first occurrence; only a service-level failure
    /// fails the call.
    pub async fn generate(
        &self,
        seeds: &[SeedDescriptor],
        known_artists: &[String],
        genre_hint: Option<&str>,
        wanted: usize,
    ) -> Result<GeneratedCandidates, GenerationFailure> {
        let context = SeedContext {
            seeds: cap_seeds(seeds, self.max_seed_descriptors),
            known_artists: known_artists
                .iter()
                .take(MAX_KNOWN_ARTISTS_IN_CONTEXT)
                .cloned()
                .collect(),
            wanted,
        };

        let suggestions = self.service.suggest(&context, genre_hint).await?;
        let raw_count = suggestions.len();

        let mut seen = HashSet::new();
        let mut candidates = Vec::with_capacity(raw_count);
        for suggestion in suggestions {
            let Some(candidate) = sanitize(suggestion) else {
                continue;
            };
            if seen.insert(normalize_name(&candidate.name)) {
                candidates.push(candidate);
            }
        }

        debug!(
            raw_count,
            kept = candidates.len(),
            seeds = context.seeds.len(),
            "Generated candidates"
        );

        Ok(GeneratedCandidates {
            raw_count,
            candidates,
        })
    }
}

/// Pick at most `limit` seed descriptors, one track per distinct artist
/// first (in playlist order), then the remaining tracks in order.
fn cap_seeds(seeds: &[SeedDescriptor], limit: usize) -> Vec<SeedDescriptor> {
    let mut seen_artists = HashSet::new();
    let (first_per_artist, rest): (Vec<_>, Vec<_>) = seeds
        .iter()
        .partition(|seed| seen_artists.insert(normalize_name(&seed.artist)));

    first_per_artist
        .into_iter()
        .chain(rest)
        .take(limit)
        .cloned()
        .collect()
}

fn is_plausible_name(name: &str) -> bool {
    if name.is_empty() || name.chars().count() > MAX_CANDIDATE_NAME_CHARS {
        return false;
    }
    !name
        .chars()
        .all(|c| c.is_numeric() || c.is_whitespace() || c.is_ascii_punctuation())
}

fn sanitize(suggestion: Suggestion) -> Option<Candidate> {
    let name = suggestion.name.trim();
    if !is_plausible_name(name) {
        debug!(name = %suggestion.name, "Discarding implausible candidate");
        return None;
    }
    let genre = suggestion
        .genre
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty() && g.chars().count() <= MAX_GENRE_HINT_CHARS);
    Some(Candidate::new(name, genre))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedService {
        response: Result<Vec<Suggestion>, SuggestionError>,
        last_context: Mutex<Option<SeedContext>>,
    }

    impl ScriptedService {
        fn returning(names: &[&str]) -> Self {
            Self {
                response: Ok(names
                    .iter()
                    .map(|n| Suggestion {
                        name: n.to_string(),
                        genre: None,
                    })
                    .collect()),
                last_context: Mutex::new(None),
            }
        }

        fn failing(error: SuggestionError) -> Self {
            Self {
                response: Err(error),
                last_context: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl SuggestionService for ScriptedService {
        async fn suggest(
            &self,
            context: &SeedContext,
            _genre_hint: Option<&str>,
        ) -> Result<Vec<Suggestion>, SuggestionError> {
            *self.last_context.lock().unwrap() = Some(context.clone());
            self.response.clone()
        }
    }

    fn seed(artist: &str, track: &str) -> SeedDescriptor {
        SeedDescriptor {
            artist: artist.to_string(),
            track: track.to_string(),
        }
    }

    #[tokio::test]
    async fn discards_implausible_names() {
        let long_name = "x".repeat(MAX_CANDIDATE_NAME_CHARS + 1);
        let service = Arc::new(ScriptedService::returning(&[
            "Stereolab",
            "",
            "   ",
            "1999",
            "42 - 7",
            long_name.as_str(),
            "Broadcast",
        ]));
        let generator = CandidateGenerator::new(service, 10);

        let generated = generator.generate(&[], &[], None, 5).await.unwrap();

        assert_eq!(generated.raw_count, 7);
        let names: Vec<_> = generated.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Stereolab", "Broadcast"]);
    }

    #[tokio::test]
    async fn keeps_names_with_digits_and_letters() {
        let service = Arc::new(ScriptedService::returning(&["blink-182", "311", "The 1975"]));
        let generator = CandidateGenerator::new(service, 10);

        let generated = generator.generate(&[], &[], None, 5).await.unwrap();

        let names: Vec<_> = generated.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["blink-182", "The 1975"]);
    }

    #[tokio::test]
    async fn deduplicates_by_normalized_name() {
        let service = Arc::new(ScriptedService::returning(&["Múm", "mum", "  MÚM "]));
        let generator = CandidateGenerator::new(service, 10);

        let generated = generator.generate(&[], &[], None, 5).await.unwrap();

        assert_eq!(generated.raw_count, 3);
        assert_eq!(generated.candidates, vec![Candidate::new("Múm", None)]);
    }

    #[tokio::test]
    async fn caps_seed_descriptors_preferring_distinct_artists() {
        let service = Arc::new(ScriptedService::returning(&["Anyone"]));
        let generator = CandidateGenerator::new(service.clone(), 3);
        let seeds = vec![
            seed("Can", "Vitamin C"),
            seed("Can", "Halleluwah"),
            seed("Neu!", "Hallogallo"),
            seed("Faust", "Jennifer"),
            seed("Can", "Mother Sky"),
        ];

        generator.generate(&seeds, &[], None, 5).await.unwrap();

        let context = service.last_context.lock().unwrap().clone().unwrap();
        assert_eq!(
            context.seeds,
            vec![
                seed("Can", "Vitamin C"),
                seed("Neu!", "Hallogallo"),
                seed("Faust", "Jennifer"),
            ]
        );
        assert_eq!(context.wanted, 5);
    }

    #[tokio::test]
    async fn service_errors_become_generation_failures() {
        let generator =
            CandidateGenerator::new(Arc::new(ScriptedService::failing(SuggestionError::Timeout)), 10);

        let result = generator.generate(&[], &[], None, 5).await;

        assert_eq!(result.unwrap_err(), GenerationFailure::Timeout);
    }

    #[tokio::test]
    async fn drops_empty_and_oversized_genre_hints() {
        let service = Arc::new(ScriptedService {
            response: Ok(vec![
                Suggestion {
                    name: "Autechre".to_string(),
                    genre: Some("  IDM ".to_string()),
                },
                Suggestion {
                    name: "Plaid".to_string(),
                    genre: Some(" ".to_string()),
                },
                Suggestion {
                    name: "Boards of Canada".to_string(),
                    genre: Some("g".repeat(MAX_GENRE_HINT_CHARS + 1)),
                },
            ]),
            last_context: Mutex::new(None),
        });
        let generator = CandidateGenerator::new(service, 10);

        let generated = generator.generate(&[], &[], None, 5).await.unwrap();

        assert_eq!(
            generated.candidates,
            vec![
                Candidate::new("Autechre", Some("IDM".to_string())),
                Candidate::new("Plaid", None),
                Candidate::new("Boards of Canada", None),
            ]
        );
    }
}
