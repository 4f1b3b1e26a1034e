//! Artist name normalization.
//!
//! Two names refer to the same artist for filtering and caching purposes iff
//! their normalized forms are equal. Normalization folds case, strips
//! diacritics and collapses whitespace; nothing else, so that similar but
//! distinct names stay distinct.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize an artist name for exact comparison.
///
/// Applies NFKD decomposition, drops combining marks, lowercases, and
/// collapses every whitespace run to a single space with no leading or
/// trailing whitespace.
pub fn normalize_name(name: &str) -> String {
    let folded: String = name
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Key under which an artist is stored in the artist cache.
pub fn cache_key(name: &str) -> String {
    normalize_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_case_and_diacritics() {
        assert_eq!(normalize_name("Björk"), "bjork");
        assert_eq!(normalize_name("Sigur Rós"), normalize_name("SIGUR ROS"));
        assert_eq!(normalize_name("Beyoncé"), "beyonce");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize_name("  Björk "), "bjork");
        assert_eq!(normalize_name("Boards\tof \n Canada"), "boards of canada");
        assert_eq!(normalize_name("   "), "");
    }

    #[test]
    fn keeps_punctuation_distinct() {
        assert_ne!(normalize_name("AC/DC"), normalize_name("ACDC"));
        assert_ne!(normalize_name("The Band"), normalize_name("Band"));
    }

    #[test]
    fn folds_compatibility_forms() {
        // U+FB01 LATIN SMALL LIGATURE FI
        assert_eq!(normalize_name("\u{FB01}sh"), "fish");
    }
}
