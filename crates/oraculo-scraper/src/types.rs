use rust_decimal::Decimal;

/// How a price string encodes its decimal separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceFormat {
    /// Dot-decimal as found in `content=` / `data-price-amount=` attributes.
    Machine,
    /// Formatted display text: `.` groups thousands, `,` marks decimals.
    European,
}

/// Price exactly as an adapter found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawPrice {
    Text { text: String, format: PriceFormat },
    /// Integer amount in minor units, e.g. cents from a store API.
    MinorUnits { amount: String, minor_unit: u32 },
    Value(Decimal),
}

/// Which extraction tier produced a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingSource {
    StructuredData,
    Markup,
    Api,
}

/// One listing as extracted from a page, before validation.
///
/// URLs and images may still be relative to the page they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawListing {
    pub name: String,
    pub price: RawPrice,
    pub currency: Option<String>,
    pub available: bool,
    pub url: String,
    pub image: Option<String>,
    pub source: ListingSource,
}

/// Everything an adapter extracted from one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub listings: Vec<RawListing>,
    /// Link to the following page, possibly relative.
    pub next_url: Option<String>,
    /// Items present on the page that could not be extracted.
    pub skipped: usize,
}
