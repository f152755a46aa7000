//! Structured-metadata tier: schema.org `Product` / `ItemList` in JSON-LD.

use scraper::{Html, Selector};
use serde_json::Value;

use crate::error::ScraperError;
use crate::types::{ListingSource, PriceFormat, RawListing, RawPrice};

/// Extract product listings from every `application/ld+json` block.
///
/// Accepts top-level objects, arrays and `@graph` containers. `ItemList`
/// entries are unwrapped from their `ListItem.item`. Entries without a name,
/// URL or price are counted as skipped.
///
/// # Errors
///
/// Returns [`ScraperError::Selector`] only if the script selector fails to
/// compile.
pub(crate) fn extract_listings(document: &Html) -> Result<(Vec<RawListing>, usize), ScraperError> {
    let script = Selector::parse(r#"script[type="application/ld+json"]"#).map_err(|e| {
        ScraperError::Selector {
            selector: "script[type=\"application/ld+json\"]".to_owned(),
            reason: e.to_string(),
        }
    })?;

    let mut blocks = Vec::new();
    for element in document.select(&script) {
        let text = element.text().collect::<String>();
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value) => blocks.push(value),
            Err(_) => tracing::debug!("skipping malformed JSON-LD block"),
        }
    }

    let mut products = Vec::new();
    for block in &blocks {
        collect_products(block, &mut products);
    }

    let mut listings = Vec::new();
    let mut skipped = 0usize;
    for product in products {
        match product_to_listing(product) {
            Some(listing) => listings.push(listing),
            None => skipped += 1,
        }
    }
    Ok((listings, skipped))
}

fn collect_products<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    if let Some(items) = value.as_array() {
        for item in items {
            collect_products(item, out);
        }
        return;
    }

    if let Some(graph) = value.get("@graph").and_then(Value::as_array) {
        for item in graph {
            collect_products(item, out);
        }
    }

    if has_type(value, "Product") {
        out.push(value);
    } else if has_type(value, "ItemList") {
        let elements = value
            .get("itemListElement")
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice);
        for element in elements {
            let inner = element.get("item").unwrap_or(element);
            if has_type(inner, "Product") {
                out.push(inner);
            }
        }
    }
}

/// `@type` may be a plain string or an array of strings.
fn has_type(value: &Value, wanted: &str) -> bool {
    match value.get("@type") {
        Some(Value::String(s)) => s.eq_ignore_ascii_case(wanted),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|s| s.eq_ignore_ascii_case(wanted)),
        _ => false,
    }
}

fn product_to_listing(product: &Value) -> Option<RawListing> {
    let name = product.get("name").and_then(Value::as_str)?.trim();
    if name.is_empty() {
        return None;
    }

    let offer = match product.get("offers")? {
        Value::Array(offers) => offers.first()?,
        other => other,
    };

    let url = product
        .get("url")
        .or_else(|| offer.get("url"))
        .or_else(|| product.get("@id"))
        .and_then(Value::as_str)?;

    let price_node = offer.get("price").or_else(|| offer.get("lowPrice"))?;
    let text = match price_node {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let available = offer
        .get("availability")
        .and_then(Value::as_str)
        .is_none_or(|a| {
            let a = a.to_ascii_lowercase();
            !(a.contains("outofstock") || a.contains("soldout") || a.contains("discontinued"))
        });

    Some(RawListing {
        name: name.to_owned(),
        price: RawPrice::Text {
            text,
            format: PriceFormat::Machine,
        },
        currency: offer
            .get("priceCurrency")
            .and_then(Value::as_str)
            .map(str::to_owned),
        available,
        url: url.to_owned(),
        image: image_url(product.get("image")),
        source: ListingSource::StructuredData,
    })
}

fn image_url(node: Option<&Value>) -> Option<String> {
    match node? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => image_url(items.first()),
        Value::Object(_) => node?.get("url").and_then(Value::as_str).map(str::to_owned),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> (Vec<RawListing>, usize) {
        extract_listings(&Html::parse_document(html)).unwrap()
    }

    #[test]
    fn extracts_item_list_products() {
        let html = r#"<html><head><script type="application/ld+json">
        {"@context":"https://schema.org","@type":"ItemList","itemListElement":[
          {"@type":"ListItem","position":1,"item":{"@type":"Product","name":"He-Man Origins",
            "url":"https://shop.example/he-man.html","image":["https://shop.example/he.jpg"],
            "offers":{"@type":"Offer","price":"24.99","priceCurrency":"EUR",
                      "availability":"https://schema.org/InStock"}}},
          {"@type":"ListItem","position":2,"item":{"@type":"Product","name":"Skeletor Origins",
            "url":"https://shop.example/skeletor.html",
            "offers":[{"@type":"Offer","price":19.5,"availability":"https://schema.org/OutOfStock"}]}}
        ]}
        </script></head><body></body></html>"#;

        let (listings, skipped) = extract(html);
        assert_eq!(skipped, 0);
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].name, "He-Man Origins");
        assert_eq!(
            listings[0].price,
            RawPrice::Text {
                text: "24.99".to_owned(),
                format: PriceFormat::Machine
            }
        );
        assert_eq!(listings[0].currency.as_deref(), Some("EUR"));
        assert!(listings[0].available);
        assert_eq!(listings[0].image.as_deref(), Some("https://shop.example/he.jpg"));
        assert!(!listings[1].available);
        assert_eq!(
            listings[1].price,
            RawPrice::Text {
                text: "19.5".to_owned(),
                format: PriceFormat::Machine
            }
        );
    }

    #[test]
    fn extracts_products_inside_graph() {
        let html = r#"<script type="application/ld+json">
        {"@graph":[{"@type":"WebPage","name":"Busqueda"},
                   {"@type":["Product","Thing"],"name":"Teela","@id":"https://shop.example/teela",
                    "offers":{"lowPrice":"15.00"}}]}
        </script>"#;
        let (listings, _) = extract(html);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].url, "https://shop.example/teela");
        assert_eq!(listings[0].source, ListingSource::StructuredData);
    }

    #[test]
    fn products_without_price_are_skipped() {
        let html = r#"<script type="application/ld+json">
        [{"@type":"Product","name":"Orko","url":"https://shop.example/orko"},
         {"@type":"Product","name":"Beast Man","url":"https://shop.example/beast",
          "offers":{"price":"20"}}]
        </script>"#;
        let (listings, skipped) = extract(html);
        assert_eq!(listings.len(), 1);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn malformed_blocks_are_ignored() {
        let html = r#"<script type="application/ld+json">{ not json </script>
        <script type="application/ld+json">{"@type":"Organization","name":"Shop"}</script>"#;
        let (listings, skipped) = extract(html);
        assert!(listings.is_empty());
        assert_eq!(skipped, 0);
    }

    #[test]
    fn products_from_separate_blocks_are_all_kept() {
        let html = r#"<script type="application/ld+json">
        {"@type":"Product","name":"Battle Cat","url":"https://shop.example/battle-cat",
         "offers":{"price":"39.99"}}
        </script>
        <script type="application/ld+json">{ broken </script>
        <script type="application/ld+json">
        {"@type":"Product","name":"Man-At-Arms","url":"https://shop.example/man-at-arms",
         "offers":{"price":"21.00"}}
        </script>"#;
        let (listings, skipped) = extract(html);
        let names: Vec<_> = listings.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["Battle Cat", "Man-At-Arms"]);
        assert_eq!(skipped, 0);
    }
}
