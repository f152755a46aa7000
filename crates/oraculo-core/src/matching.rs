//! Token-based identity matching between catalog names and scraped listings.
//!
//! A catalog name and a listing (title plus source URL) are reduced to sets of
//! significant tokens. A listing can only match when it contains every catalog
//! token (recall), and is then accepted when the Jaccard similarity of the two
//! sets clears the configured threshold (precision). Extra tokens on the
//! listing side are treated as variant descriptors that lower the score.

use std::collections::BTreeSet;

use percent_encoding::percent_decode_str;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.65;

/// Generic marketing, brand, line and unit words that never identify a figure.
///
/// TODO: line names (`origins`, `masterverse`) are filtered here, so an Origins
/// catalog entry can still match a Masterverse listing. Split them into a
/// separate series set and reject listings whose series disagrees with the
/// catalog entry's.
const STOP_WORDS: &[&str] = &[
    "masters",
    "universe",
    "universo",
    "motu",
    "origins",
    "masterverse",
    "mattel",
    "figure",
    "figura",
    "action",
    "toy",
    "juguete",
    "cm",
    "inch",
    "wave",
    "deluxe",
    "collection",
    "collector",
    "edicion",
    "edition",
    "new",
    "nuevo",
    "caja",
    "box",
    "original",
    "authentic",
    "classics",
    "super7",
    "reaction",
    "pop",
    "funko",
    "vinyl",
    "of",
    "the",
    "del",
    "de",
    "y",
    "and",
];

const URL_EXTENSIONS: &[&str] = &[".html", ".htm", ".php", ".aspx"];

/// Reduce free text to its significant tokens.
///
/// Diacritics are stripped (NFKD, combining marks dropped), remaining
/// non-ASCII is discarded, and the text is split on every non-alphanumeric
/// boundary. Stop words are removed, and single-character tokens survive only
/// when they are numeric.
#[must_use]
pub fn significant_tokens(text: &str) -> BTreeSet<String> {
    let folded: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .filter(char::is_ascii)
        .collect::<String>()
        .to_ascii_lowercase();

    folded
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .filter(|token| !STOP_WORDS.contains(token))
        .filter(|token| token.len() > 1 || token.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_owned)
        .collect()
}

/// Tokens carried by the last path segment of a listing URL.
///
/// Query strings and fragments are ignored, the segment is percent-decoded,
/// and a trailing page extension such as `.html` is removed.
#[must_use]
pub fn url_tokens(url: &str) -> BTreeSet<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or_default();
    let path = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| {
            rest.split_once('/').map_or("", |(_, path)| path)
        });
    let segment = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    let decoded = percent_decode_str(segment).decode_utf8_lossy();
    let lowered = decoded.to_ascii_lowercase();
    let stem = URL_EXTENSIONS
        .iter()
        .find_map(|ext| lowered.strip_suffix(ext))
        .unwrap_or(&lowered);

    significant_tokens(stem)
}

/// Why a candidate was accepted or rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchReason {
    EmptyCatalogName,
    EmptyListing,
    /// Catalog tokens absent from the listing.
    MissingTokens(Vec<String>),
    HighJaccard,
    /// Listing tokens the catalog name does not explain.
    LowJaccard { extra: Vec<String> },
}

impl std::fmt::Display for MatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchReason::EmptyCatalogName => write!(f, "empty catalog name"),
            MatchReason::EmptyListing => write!(f, "empty listing"),
            MatchReason::MissingTokens(missing) => {
                write!(f, "missing tokens: {}", missing.join(", "))
            }
            MatchReason::HighJaccard => write!(f, "high jaccard"),
            MatchReason::LowJaccard { extra } => {
                write!(f, "low jaccard (extra: {})", extra.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub is_match: bool,
    pub score: f64,
    pub reason: MatchReason,
}

impl MatchOutcome {
    fn rejected(reason: MatchReason) -> Self {
        Self {
            is_match: false,
            score: 0.0,
            reason,
        }
    }
}

/// Deterministic identity matcher. Holds no state besides its threshold.
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    threshold: f64,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl Matcher {
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Tokens the matcher compares against catalog tokens for one listing.
    #[must_use]
    pub fn listing_tokens(scraped_name: &str, scraped_url: &str) -> BTreeSet<String> {
        let mut tokens = significant_tokens(scraped_name);
        tokens.extend(url_tokens(scraped_url));
        tokens
    }

    /// Score a catalog name against a scraped listing.
    #[must_use]
    pub fn match_listing(
        &self,
        catalog_name: &str,
        scraped_name: &str,
        scraped_url: &str,
    ) -> MatchOutcome {
        let catalog = significant_tokens(catalog_name);
        let listing = Self::listing_tokens(scraped_name, scraped_url);
        self.match_tokens(&catalog, &listing)
    }

    /// Score pre-computed token sets. Used by [`crate::CatalogIndex`] so
    /// catalog names are tokenized once per pass.
    #[must_use]
    pub fn match_tokens(
        &self,
        catalog: &BTreeSet<String>,
        listing: &BTreeSet<String>,
    ) -> MatchOutcome {
        if catalog.is_empty() {
            return MatchOutcome::rejected(MatchReason::EmptyCatalogName);
        }
        if listing.is_empty() {
            return MatchOutcome::rejected(MatchReason::EmptyListing);
        }

        let missing: Vec<String> = catalog.difference(listing).cloned().collect();
        if !missing.is_empty() {
            return MatchOutcome::rejected(MatchReason::MissingTokens(missing));
        }

        let common = catalog.intersection(listing).count();
        let union = catalog.union(listing).count();
        #[allow(clippy::cast_precision_loss)]
        let score = common as f64 / union as f64;

        if score >= self.threshold {
            MatchOutcome {
                is_match: true,
                score,
                reason: MatchReason::HighJaccard,
            }
        } else {
            let extra = listing.difference(catalog).cloned().collect();
            MatchOutcome {
                is_match: false,
                score,
                reason: MatchReason::LowJaccard { extra },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tokens: &[&str]) -> BTreeSet<String> {
        tokens.iter().map(|t| (*t).to_owned()).collect()
    }

    #[test]
    fn significant_tokens_strips_stop_words_and_punctuation() {
        assert_eq!(significant_tokens("He-Man (Origins)"), set(&["he", "man"]));
    }

    #[test]
    fn significant_tokens_folds_diacritics() {
        assert_eq!(
            significant_tokens("Esqueletor Edición Cañón"),
            set(&["esqueletor", "canon"])
        );
    }

    #[test]
    fn significant_tokens_keeps_single_digits_and_drops_single_letters() {
        assert_eq!(
            significant_tokens("Battle Cat x 2 200x"),
            set(&["battle", "cat", "2", "200x"])
        );
    }

    #[test]
    fn significant_tokens_of_only_stop_words_is_empty() {
        assert!(significant_tokens("Masters of the Universe Origins Mattel").is_empty());
    }

    #[test]
    fn url_tokens_uses_last_segment_without_extension() {
        assert_eq!(
            url_tokens("https://shop.example/es/figuras/1234-he-man-origins.html?ref=x#top"),
            set(&["1234", "he", "man"])
        );
    }

    #[test]
    fn url_tokens_decodes_percent_escapes_and_trailing_slash() {
        assert_eq!(
            url_tokens("https://shop.example/producto/esqueletor-edici%C3%B3n/"),
            set(&["esqueletor"])
        );
    }

    #[test]
    fn url_tokens_of_bare_host_is_empty() {
        assert!(url_tokens("https://shop.example").is_empty());
    }

    #[test]
    fn accepts_listing_with_incidental_size_suffix() {
        let outcome = Matcher::default().match_listing(
            "He-Man (Origins)",
            "Figura He-Man Masters of the Universe Origins 14cm",
            "https://shop.example/he-man-origins.html",
        );
        assert!(outcome.is_match, "{outcome:?}");
        assert!((outcome.score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(outcome.reason, MatchReason::HighJaccard);
    }

    #[test]
    fn rejects_listing_with_variant_descriptor() {
        let outcome = Matcher::default().match_listing(
            "He-Man (Origins)",
            "He-Man Battle Armor Origins",
            "https://shop.example/he-man-origins.html",
        );
        assert!(!outcome.is_match);
        assert!((outcome.score - 0.5).abs() < 1e-9);
        assert_eq!(
            outcome.reason,
            MatchReason::LowJaccard {
                extra: vec!["armor".to_owned(), "battle".to_owned()]
            }
        );
        assert_eq!(outcome.reason.to_string(), "low jaccard (extra: armor, battle)");
    }

    #[test]
    fn missing_catalog_token_is_hard_non_match() {
        let outcome = Matcher::default().match_listing(
            "Battle Cat (Origins)",
            "Battle Ram Origins",
            "https://shop.example/battle-ram.html",
        );
        assert!(!outcome.is_match);
        assert!(outcome.score.abs() < f64::EPSILON);
        assert_eq!(outcome.reason, MatchReason::MissingTokens(vec!["cat".to_owned()]));
    }

    #[test]
    fn url_tokens_can_satisfy_recall() {
        let outcome = Matcher::default().match_listing(
            "Teela",
            "Figura Origins 14cm",
            "https://shop.example/teela.html",
        );
        assert!(!outcome.is_match);
        assert!((outcome.score - 0.5).abs() < 1e-9);

        let outcome = Matcher::default().match_listing(
            "Teela",
            "Figura Origins",
            "https://shop.example/teela.html",
        );
        assert!(outcome.is_match);
        assert!((outcome.score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_catalog_tokens_never_match() {
        let outcome = Matcher::default().match_listing(
            "Masters of the Universe",
            "Masters of the Universe",
            "https://shop.example/motu.html",
        );
        assert!(!outcome.is_match);
        assert_eq!(outcome.reason, MatchReason::EmptyCatalogName);
    }

    #[test]
    fn empty_listing_tokens_never_match() {
        let outcome = Matcher::default().match_listing("Skeletor", "Mattel", "https://shop.example/");
        assert!(!outcome.is_match);
        assert_eq!(outcome.reason, MatchReason::EmptyListing);
    }

    #[test]
    fn recall_rule_holds_for_every_partial_listing() {
        let matcher = Matcher::new(0.01);
        let catalog = "Skeletor Battle Armor 40th Anniversary";
        let catalog_tokens: Vec<String> = significant_tokens(catalog).into_iter().collect();

        for skip in 0..catalog_tokens.len() {
            let title: Vec<&str> = catalog_tokens
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, t)| t.as_str())
                .chain(["deluxe", "14cm"])
                .collect();
            let outcome =
                matcher.match_listing(catalog, &title.join(" "), "https://shop.example/p.html");
            assert!(!outcome.is_match, "title {title:?} should not match");
            assert!(outcome.score.abs() < f64::EPSILON);
        }
    }

    #[test]
    fn threshold_is_tunable() {
        let strict = Matcher::new(0.75);
        let outcome = strict.match_listing(
            "He-Man (Origins)",
            "Figura He-Man Origins 14cm",
            "https://shop.example/he-man.html",
        );
        assert!(!outcome.is_match);
        assert!((strict.threshold() - 0.75).abs() < f64::EPSILON);
    }
}
