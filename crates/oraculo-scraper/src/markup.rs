//! Markup tier: CSS selection over rendered catalog pages.
//!
//! Each storefront platform is described by a [`MarkupRules`] table; the
//! extraction logic is shared.

use scraper::{ElementRef, Html, Selector};

use crate::error::ScraperError;
use crate::jsonld;
use crate::types::{ListingPage, ListingSource, PriceFormat, RawListing, RawPrice};

/// Attributes checked for an image URL, lazy-loading ones first.
const IMAGE_ATTRS: &[&str] = &[
    "data-src",
    "data-original",
    "data-lazy-src",
    "data-full-size-image-url",
    "src",
];

/// One way of reading a price from a listing card, tried in order.
#[derive(Debug, Clone, Copy)]
pub(crate) enum PriceRule {
    Attr {
        css: &'static str,
        attr: &'static str,
        format: PriceFormat,
    },
    Text {
        css: &'static str,
        format: PriceFormat,
    },
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct MarkupRules {
    /// Listing card container.
    pub item: &'static str,
    /// Title link inside the card; its text is the name, its `href` the URL.
    pub title: &'static str,
    pub price: &'static [PriceRule],
    /// Marker present only on out-of-stock cards.
    pub unavailable: Option<&'static str>,
    pub image: &'static str,
    /// Next-page link, searched in the whole document.
    pub next: &'static str,
}

fn selector(css: &str) -> Result<Selector, ScraperError> {
    Selector::parse(css).map_err(|e| ScraperError::Selector {
        selector: css.to_owned(),
        reason: e.to_string(),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn read_price(card: ElementRef<'_>, rules: &[PriceRule]) -> Result<Option<RawPrice>, ScraperError> {
    for rule in rules {
        let found = match *rule {
            PriceRule::Attr { css, attr, format } => {
                let sel = selector(css)?;
                card.select(&sel)
                    .find_map(|el| el.value().attr(attr).and_then(non_empty))
                    .map(|text| RawPrice::Text { text, format })
            }
            PriceRule::Text { css, format } => {
                let sel = selector(css)?;
                card.select(&sel)
                    .map(element_text)
                    .find(|text| text.chars().any(|c| c.is_ascii_digit()))
                    .map(|text| RawPrice::Text { text, format })
            }
        };
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

fn read_image(card: ElementRef<'_>, image: &Selector) -> Option<String> {
    let img = card.select(image).next()?;
    IMAGE_ATTRS
        .iter()
        .filter_map(|attr| img.value().attr(attr))
        .filter_map(non_empty)
        .find(|value| !value.starts_with("data:"))
}

/// Extract listing cards according to `rules`.
///
/// Cards missing a title, link or price are counted as skipped.
///
/// # Errors
///
/// Returns [`ScraperError::Selector`] if a rule selector fails to compile.
pub(crate) fn extract_listings(
    document: &Html,
    rules: &MarkupRules,
) -> Result<(Vec<RawListing>, usize), ScraperError> {
    let item = selector(rules.item)?;
    let title = selector(rules.title)?;
    let image = selector(rules.image)?;
    let unavailable = rules.unavailable.map(selector).transpose()?;

    let mut listings = Vec::new();
    let mut skipped = 0usize;

    for card in document.select(&item) {
        let Some(link) = card.select(&title).next() else {
            skipped += 1;
            continue;
        };
        let name = element_text(link);
        let href = link.value().attr("href").and_then(non_empty);
        let price = read_price(card, rules.price)?;

        let (Some(url), Some(price), false) = (href, price, name.is_empty()) else {
            tracing::debug!(name = %name, "skipping listing card with missing fields");
            skipped += 1;
            continue;
        };

        let available = unavailable
            .as_ref()
            .is_none_or(|marker| card.select(marker).next().is_none());

        listings.push(RawListing {
            name,
            price,
            currency: None,
            available,
            url,
            image: read_image(card, &image),
            source: ListingSource::Markup,
        });
    }

    Ok((listings, skipped))
}

/// `href` of the first next-page link, if any.
///
/// # Errors
///
/// Returns [`ScraperError::Selector`] if the selector fails to compile.
pub(crate) fn next_link(document: &Html, css: &str) -> Result<Option<String>, ScraperError> {
    let next = selector(css)?;
    Ok(document
        .select(&next)
        .filter(|el| {
            let class = el.value().attr("class").unwrap_or_default();
            !class.split_whitespace().any(|c| c == "disabled")
        })
        .find_map(|el| el.value().attr("href").and_then(non_empty)))
}

/// Two-tier extraction of one catalog page.
///
/// Structured metadata is tried first; markup selection runs only when it
/// yields nothing. The next-page link always comes from the markup.
///
/// # Errors
///
/// Returns [`ScraperError::Selector`] if a rule selector fails to compile.
pub(crate) fn extract_page(body: &str, rules: &MarkupRules) -> Result<ListingPage, ScraperError> {
    let document = Html::parse_document(body);

    let (structured, structured_skipped) = jsonld::extract_listings(&document)?;
    let (listings, skipped) = if structured.is_empty() {
        extract_listings(&document, rules)?
    } else {
        (structured, structured_skipped)
    };

    Ok(ListingPage {
        listings,
        next_url: next_link(&document, rules.next)?,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: MarkupRules = MarkupRules {
        item: "article.card",
        title: "h3 a",
        price: &[
            PriceRule::Attr {
                css: "span.price",
                attr: "content",
                format: PriceFormat::Machine,
            },
            PriceRule::Text {
                css: "span.price",
                format: PriceFormat::European,
            },
        ],
        unavailable: Some(".sold-out"),
        image: "img",
        next: "a.next",
    };

    #[test]
    fn extracts_cards_with_price_fallbacks() {
        let html = r#"
        <article class="card">
          <h3><a href="/he-man.html"> He-Man
             Origins </a></h3>
          <span class="price" content="24.99">24,99 €</span>
          <img src="data:image/gif;base64,R0lG" data-src="/img/he-man.jpg">
        </article>
        <article class="card">
          <h3><a href="/skeletor.html">Skeletor</a></h3>
          <span class="price">1.024,50 €</span>
          <span class="sold-out">Agotado</span>
        </article>
        <article class="card"><h3><a href="/orko.html">Orko</a></h3></article>
        <a class="next" href="?page=2">Siguiente</a>"#;

        let page = extract_page(html, &RULES).unwrap();
        assert_eq!(page.listings.len(), 2);
        assert_eq!(page.skipped, 1);
        assert_eq!(page.next_url.as_deref(), Some("?page=2"));

        let he_man = &page.listings[0];
        assert_eq!(he_man.name, "He-Man Origins");
        assert_eq!(he_man.url, "/he-man.html");
        assert_eq!(he_man.image.as_deref(), Some("/img/he-man.jpg"));
        assert_eq!(
            he_man.price,
            RawPrice::Text {
                text: "24.99".to_owned(),
                format: PriceFormat::Machine
            }
        );
        assert!(he_man.available);
        assert_eq!(he_man.source, ListingSource::Markup);

        let skeletor = &page.listings[1];
        assert!(!skeletor.available);
        assert_eq!(
            skeletor.price,
            RawPrice::Text {
                text: "1.024,50 €".to_owned(),
                format: PriceFormat::European
            }
        );
    }

    #[test]
    fn structured_data_wins_over_markup() {
        let html = r#"
        <script type="application/ld+json">{"@type":"Product","name":"Teela",
          "url":"https://shop.example/teela","offers":{"price":"18.00"}}</script>
        <article class="card"><h3><a href="/he-man.html">He-Man</a></h3>
          <span class="price">24,99 €</span></article>"#;
        let page = extract_page(html, &RULES).unwrap();
        assert_eq!(page.listings.len(), 1);
        assert_eq!(page.listings[0].name, "Teela");
        assert_eq!(page.listings[0].source, ListingSource::StructuredData);
    }

    #[test]
    fn disabled_next_link_is_ignored() {
        let html = r#"<a class="next disabled" href="?page=9">Siguiente</a>"#;
        let page = extract_page(html, &RULES).unwrap();
        assert!(page.next_url.is_none());
    }

    #[test]
    fn invalid_selector_is_reported() {
        let rules = MarkupRules {
            item: "article[",
            ..RULES
        };
        assert!(matches!(
            extract_page("<html></html>", &rules),
            Err(ScraperError::Selector { .. })
        ));
    }
}
