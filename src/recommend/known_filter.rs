//! Removal of candidates the listener already knows.

use super::candidates::Candidate;
use super::normalize::normalize_name;
use std::collections::HashSet;

/// The set of artists present in the source playlist, by normalized name.
///
/// Matching is exact on the normalized form. There is no fuzzy matching:
/// "The National" and "National" are different artists.
#[derive(Debug, Clone, Default)]
pub struct KnownArtists {
    normalized: HashSet<String>,
}

impl KnownArtists {
    pub fn new<I, S>(seed_artist_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized = seed_artist_names
            .into_iter()
            .map(|name| normalize_name(name.as_ref()))
            .filter(|name| !name.is_empty())
            .collect();
        Self { normalized }
    }

    pub fn len(&self) -> usize {
        self.normalized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.normalized.contains(&normalize_name(name))
    }

    /// Keep only the candidates not matching a known artist, in their
    /// original order.
    pub fn retain_unknown(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates
            .into_iter()
            .filter(|candidate| !self.contains(&candidate.name))
            .collect()
    }
}

/// Candidate names that do not match any seed artist name.
pub fn filter_known_artists<S: AsRef<str>>(seed_artist_names: &[S], candidates: &[S]) -> Vec<String> {
    let known = KnownArtists::new(seed_artist_names);
    candidates
        .iter()
        .map(|c| c.as_ref())
        .filter(|c| !known.contains(c))
        .map(str::to_string)
        .collect()
}
