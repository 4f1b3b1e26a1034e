use artist_discovery::catalog::{ArtistFragment, CatalogError, CatalogSource};
use artist_discovery::playlist::{PlaylistError, PlaylistSource, PlaylistTrack};
use artist_discovery::recommend::normalize::normalize_name;
use artist_discovery::recommend::{SeedContext, Suggestion, SuggestionError, SuggestionService};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

/// Playlists held in memory, keyed by exact name.
#[derive(Default)]
pub struct FakePlaylists {
    playlists: HashMap<String, Vec<PlaylistTrack>>,
}

impl FakePlaylists {
    pub fn with_playlist(mut self, name: &str, tracks: Vec<PlaylistTrack>) -> Self {
        self.playlists.insert(name.to_string(), tracks);
        self
    }
}

#[async_trait]
impl PlaylistSource for FakePlaylists {
    async fn get_playlist_tracks(&self, name: &str) -> Result<Vec<PlaylistTrack>, PlaylistError> {
        self.playlists
            .get(name)
            .cloned()
            .ok_or_else(|| PlaylistError::NotFound(name.to_string()))
    }
}

/// Returns the same suggestions on every call, or a fixed error.
pub struct ScriptedSuggestions {
    response: Result<Vec<Suggestion>, SuggestionError>,
    pub calls: AtomicUsize,
}

impl ScriptedSuggestions {
    pub fn returning(names: &[&str]) -> Self {
        Self {
            response: Ok(names
                .iter()
                .map(|name| Suggestion {
                    name: name.to_string(),
                    genre: None,
                })
                .collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: SuggestionError) -> Self {
        Self {
            response: Err(error),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SuggestionService for ScriptedSuggestions {
    async fn suggest(
        &self,
        _context: &SeedContext,
        _genre_hint: Option<&str>,
    ) -> Result<Vec<Suggestion>, SuggestionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

/// A catalog that knows a fixed set of artists.
///
/// Names it was not told about are "not found"; names marked as failing
/// make the lookup fail as if the service were down.
///
/// Lookups can be slowed down with [`FakeCatalog::with_delay`] or held until
/// the test calls [`FakeCatalog::open_gate`].
pub struct FakeCatalog {
    name: String,
    known: HashMap<String, ArtistFragment>,
    failing: Mutex<HashSet<String>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    gate: Option<Semaphore>,
    pub lookup_started: Notify,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeCatalog {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            known: HashMap::new(),
            failing: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
            delay: None,
            gate: None,
            lookup_started: Notify::new(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Every lookup sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Lookups wait until [`FakeCatalog::open_gate`] is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn open_gate(&self) {
        // Closing releases every current and future waiter.
        if let Some(gate) = &self.gate {
            gate.close();
        }
    }

    /// Highest number of lookups that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Confirm each name as an artist of its own.
    pub fn confirming(mut self, names: &[&str]) -> Self {
        for name in names {
            let id = format!("{}:{}", self.name, normalize_name(name).replace(' ', "-"));
            self = self.resolving(name, name, &id);
        }
        self
    }

    /// Answer lookups of `query` with the artist `canonical` / `id`.
    pub fn resolving(mut self, query: &str, canonical: &str, id: &str) -> Self {
        let fragment = ArtistFragment {
            source: self.name.clone(),
            id: Some(id.to_string()),
            name: canonical.to_string(),
            country: "GB".to_string(),
            genres: vec!["electronic".to_string()],
            url: Some(format!("https://catalog.test/{}", id)),
            album_count: Some(3),
            ..Default::default()
        };
        self.known.insert(normalize_name(query), fragment);
        self
    }

    pub fn failing_for(self, names: &[&str]) -> Self {
        self.fail(names);
        self
    }

    /// Make lookups of `names` fail from now on.
    pub fn fail(&self, names: &[&str]) {
        let mut failing = self.failing.lock().unwrap();
        failing.extend(names.iter().map(|n| normalize_name(n)));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, name: &str) -> Result<Option<ArtistFragment>, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        self.lookup_started.notify_one();

        if let Some(gate) = &self.gate {
            let _ = gate.acquire().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let key = normalize_name(name);
        if self.failing.lock().unwrap().contains(&key) {
            return Err(CatalogError::Unavailable("connection reset".to_string()));
        }
        Ok(self.known.get(&key).cloned())
    }
}
