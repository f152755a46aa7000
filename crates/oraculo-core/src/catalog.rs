//! Pre-tokenized view of the product catalog for best-match search.

use std::collections::BTreeSet;

use crate::matching::{significant_tokens, MatchOutcome, Matcher};

/// Score at which the search stops looking for a better candidate.
pub const NEAR_PERFECT_SCORE: f64 = 0.99;

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub product_id: i64,
    pub name: String,
    tokens: BTreeSet<String>,
}

impl CatalogEntry {
    #[must_use]
    pub fn new(product_id: i64, name: impl Into<String>) -> Self {
        let name = name.into();
        let tokens = significant_tokens(&name);
        Self {
            product_id,
            name,
            tokens,
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &BTreeSet<String> {
        &self.tokens
    }
}

/// Best candidate found for one listing.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub product_id: i64,
    pub product_name: String,
    pub outcome: MatchOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    entries: Vec<CatalogEntry>,
}

impl CatalogIndex {
    pub fn new<I, S>(products: I) -> Self
    where
        I: IntoIterator<Item = (i64, S)>,
        S: Into<String>,
    {
        Self {
            entries: products
                .into_iter()
                .map(|(id, name)| CatalogEntry::new(id, name))
                .collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn product_name(&self, product_id: i64) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.product_id == product_id)
            .map(|e| e.name.as_str())
    }

    /// Highest-scoring accepted candidate for a listing, if any.
    ///
    /// Only outcomes the matcher accepts are considered. Ties keep the first
    /// entry in catalog order, so results are stable for a given catalog.
    #[must_use]
    pub fn best_match(
        &self,
        matcher: &Matcher,
        scraped_name: &str,
        scraped_url: &str,
    ) -> Option<Candidate> {
        let listing = Matcher::listing_tokens(scraped_name, scraped_url);
        let mut best: Option<Candidate> = None;

        for entry in &self.entries {
            let outcome = matcher.match_tokens(&entry.tokens, &listing);
            if !outcome.is_match {
                continue;
            }
            let improves = best
                .as_ref()
                .is_none_or(|current| outcome.score > current.outcome.score);
            if improves {
                let near_perfect = outcome.score >= NEAR_PERFECT_SCORE;
                best = Some(Candidate {
                    product_id: entry.product_id,
                    product_name: entry.name.clone(),
                    outcome,
                });
                if near_perfect {
                    break;
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> CatalogIndex {
        CatalogIndex::new([
            (1, "He-Man (Origins)"),
            (2, "He-Man Battle Armor (Origins)"),
            (3, "Skeletor (Origins)"),
            (4, "Masters of the Universe"),
        ])
    }

    #[test]
    fn index_tokenizes_names_once() {
        let index = catalog();
        assert_eq!(index.len(), 4);
        assert_eq!(index.entries()[0].tokens().len(), 2);
        assert!(index.entries()[3].tokens().is_empty());
    }

    #[test]
    fn best_match_prefers_the_most_specific_product() {
        let best = catalog()
            .best_match(
                &Matcher::default(),
                "He-Man Battle Armor Origins",
                "https://shop.example/he-man-battle-armor.html",
            )
            .expect("candidate");
        assert_eq!(best.product_id, 2);
        assert!((best.outcome.score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn best_match_returns_none_when_nothing_is_accepted() {
        let best = catalog().best_match(
            &Matcher::default(),
            "Teela Origins",
            "https://shop.example/teela.html",
        );
        assert!(best.is_none());
    }

    #[test]
    fn best_match_stops_at_first_near_perfect_score() {
        let index = CatalogIndex::new([(10, "Skeletor"), (11, "Skeletor (Origins)")]);
        let best = index
            .best_match(&Matcher::default(), "Skeletor", "https://shop.example/skeletor")
            .expect("candidate");
        assert_eq!(best.product_id, 10);
    }
}
