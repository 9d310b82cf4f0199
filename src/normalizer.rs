//! Case- and accent-insensitive text normalization.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Markers of postal-box style addresses that cannot receive door delivery.
const POSTAL_ONLY_MARKERS: [&str; 4] = ["bp", "boite postale", "cedex", "cs"];

/// Normalize text for comparison.
///
/// Lowercases, trims, and strips combining marks after canonical
/// decomposition, so `" École"` becomes `"ecole"`.
///
/// # Example
///
/// ```rust
/// use adresse_check::normalizer::normalize;
///
/// assert_eq!(normalize("  Allée des Châtaigniers "), "allee des chataigniers");
/// ```
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Check whether the text carries a postal-box marker (BP, CEDEX, CS, ...).
///
/// Markers are matched on whole words of the normalized text, so "Ducs"
/// does not count as "cs".
pub fn is_postal_only(text: &str) -> bool {
    let normalized = normalize(text);
    let words: Vec<&str> = normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    POSTAL_ONLY_MARKERS.iter().any(|marker| {
        let marker_words: Vec<&str> = marker.split(' ').collect();
        words
            .windows(marker_words.len())
            .any(|window| window == marker_words.as_slice())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_accents_and_case() {
        assert_eq!(normalize(" École"), "ecole");
        assert_eq!(normalize("ÉÉ"), "ee");
        assert_eq!(normalize("Boulevard Saint-Michel"), "boulevard saint-michel");
    }

    #[test]
    fn test_normalize_is_total() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("75001"), "75001");
    }

    #[test]
    fn test_postal_only_markers() {
        assert!(is_postal_only("BP 123"));
        assert!(is_postal_only("75008 Paris CEDEX 08"));
        assert!(is_postal_only("Boîte postale 42"));
        assert!(is_postal_only("CS 70001"));
        assert!(!is_postal_only("12 rue des Ducs"));
        assert!(!is_postal_only("12 rue de Paris"));
    }
}
