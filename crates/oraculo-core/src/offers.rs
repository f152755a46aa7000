//! Typed records passed between the normalizer, the pipeline and the store.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CURRENCY: &str = "EUR";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OfferError {
    #[error("listing name is empty")]
    EmptyName,

    #[error("price must be positive, got {0}")]
    NonPositivePrice(Decimal),

    #[error("currency must be a three-letter code, got \"{0}\"")]
    InvalidCurrency(String),

    #[error("listing URL must be absolute http(s), got \"{0}\"")]
    InvalidUrl(String),
}

/// A validated listing ready for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedOffer {
    pub shop_name: String,
    pub name: String,
    pub price: Decimal,
    pub currency: String,
    pub url: String,
    pub image_url: Option<String>,
    pub available: bool,
}

impl ScrapedOffer {
    /// Build an offer, trimming the name, rounding the price to cents and
    /// upper-casing the currency.
    ///
    /// # Errors
    ///
    /// Returns [`OfferError`] if the name is blank, the price is not positive,
    /// the currency is not a three-letter code, or the URL is not absolute.
    pub fn new(
        shop_name: impl Into<String>,
        name: &str,
        price: Decimal,
        currency: &str,
        url: impl Into<String>,
        image_url: Option<String>,
        available: bool,
    ) -> Result<Self, OfferError> {
        let name = collapse_whitespace(name);
        if name.is_empty() {
            return Err(OfferError::EmptyName);
        }

        let price = price.round_dp(2);
        if price <= Decimal::ZERO {
            return Err(OfferError::NonPositivePrice(price));
        }

        let currency = currency.trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(OfferError::InvalidCurrency(currency));
        }

        let url = url.into();
        if !is_absolute_http(&url) {
            return Err(OfferError::InvalidUrl(url));
        }

        Ok(Self {
            shop_name: shop_name.into(),
            name,
            price,
            currency,
            url,
            image_url: image_url.filter(|u| is_absolute_http(u)),
            available,
        })
    }

    #[must_use]
    pub fn to_write_request(&self, product_id: i64) -> StoreWriteRequest {
        StoreWriteRequest {
            product_id,
            shop_name: self.shop_name.clone(),
            price: self.price,
            currency: self.currency.clone(),
            url: self.url.clone(),
            available: self.available,
        }
    }

    #[must_use]
    pub fn to_pending_draft(&self, best_candidate: Option<(i64, f64)>) -> PendingMatchDraft {
        PendingMatchDraft {
            scraped_name: self.name.clone(),
            price: self.price,
            currency: self.currency.clone(),
            url: self.url.clone(),
            shop_name: self.shop_name.clone(),
            image_url: self.image_url.clone(),
            available: self.available,
            candidate_product_id: best_candidate.map(|(id, _)| id),
            candidate_score: best_candidate.map(|(_, score)| score),
        }
    }
}

/// The only payload the offer write path accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreWriteRequest {
    pub product_id: i64,
    pub shop_name: String,
    pub price: Decimal,
    pub currency: String,
    pub url: String,
    pub available: bool,
}

/// A listing parked for manual review.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMatchDraft {
    pub scraped_name: String,
    pub price: Decimal,
    pub currency: String,
    pub url: String,
    pub shop_name: String,
    pub image_url: Option<String>,
    /// Stock state when scraped, carried onto the offer if bound later.
    pub available: bool,
    pub candidate_product_id: Option<i64>,
    pub candidate_score: Option<f64>,
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_absolute_http(url: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        url.len() > scheme.len()
            && url
                .get(..scheme.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn offer(name: &str, price: &str, url: &str) -> Result<ScrapedOffer, OfferError> {
        ScrapedOffer::new("fantasia", name, d(price), "eur", url, None, true)
    }

    #[test]
    fn new_normalizes_fields() {
        let o = ScrapedOffer::new(
            "fantasia",
            "  He-Man \n Origins  ",
            d("19.999"),
            " eur ",
            "https://shop.example/he-man.html",
            Some("/img/he-man.jpg".to_owned()),
            true,
        )
        .unwrap();
        assert_eq!(o.name, "He-Man Origins");
        assert_eq!(o.price, d("20.00"));
        assert_eq!(o.currency, "EUR");
        assert!(o.image_url.is_none(), "relative image must be dropped");
    }

    #[test]
    fn new_rejects_blank_name() {
        assert_eq!(
            offer("   ", "10", "https://shop.example/x"),
            Err(OfferError::EmptyName)
        );
    }

    #[test]
    fn new_rejects_zero_price() {
        assert!(matches!(
            offer("Skeletor", "0.001", "https://shop.example/x"),
            Err(OfferError::NonPositivePrice(_))
        ));
    }

    #[test]
    fn new_rejects_relative_url() {
        assert!(matches!(
            offer("Skeletor", "10", "/skeletor.html"),
            Err(OfferError::InvalidUrl(_))
        ));
    }

    #[test]
    fn new_rejects_bad_currency() {
        let result = ScrapedOffer::new(
            "fantasia",
            "Skeletor",
            d("10"),
            "€",
            "https://shop.example/x",
            None,
            true,
        );
        assert!(matches!(result, Err(OfferError::InvalidCurrency(_))));
    }

    #[test]
    fn pending_draft_carries_candidate_diagnostics() {
        let o = offer("Skeletor", "10", "https://shop.example/x").unwrap();
        let draft = o.to_pending_draft(Some((7, 0.5)));
        assert_eq!(draft.candidate_product_id, Some(7));
        assert_eq!(draft.url, o.url);

        let request = o.to_write_request(7);
        assert_eq!(request.product_id, 7);
        assert_eq!(request.price, o.price);
    }
}
