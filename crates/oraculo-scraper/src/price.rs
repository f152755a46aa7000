//! Localized price parsing.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::types::{PriceFormat, RawPrice};

static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d.,\s\u{a0}]*").expect("valid regex"));

/// Parse the first price in `text` according to its declared separator format.
///
/// Currency symbols and words are ignored. Returns `None` when no digits are
/// present or the number does not parse.
#[must_use]
pub fn parse_price(text: &str, format: PriceFormat) -> Option<Decimal> {
    let raw = PRICE_RE.find(text)?.as_str();
    let digits: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();
    let digits = digits.trim_end_matches(['.', ',']);

    let canonical = match format {
        PriceFormat::European => digits.replace('.', "").replace(',', "."),
        PriceFormat::Machine => digits.replace(',', ""),
    };
    canonical.parse::<Decimal>().ok()
}

/// Resolve any [`RawPrice`] to a major-unit decimal.
#[must_use]
pub fn resolve_price(price: &RawPrice) -> Option<Decimal> {
    match price {
        RawPrice::Text { text, format } => parse_price(text, *format),
        RawPrice::MinorUnits { amount, minor_unit } => {
            let amount = amount.trim().parse::<i128>().ok()?;
            Decimal::try_from_i128_with_scale(amount, *minor_unit).ok()
        }
        RawPrice::Value(value) => Some(*value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn european_text_with_grouping_and_symbol() {
        assert_eq!(parse_price("1.299,00 €", PriceFormat::European), Some(d("1299.00")));
        assert_eq!(parse_price("29,99\u{a0}€", PriceFormat::European), Some(d("29.99")));
        assert_eq!(parse_price("EUR 24,95", PriceFormat::European), Some(d("24.95")));
    }

    #[test]
    fn european_text_with_only_grouping_separator() {
        assert_eq!(parse_price("1.299 €", PriceFormat::European), Some(d("1299")));
    }

    #[test]
    fn machine_format_keeps_dot_decimal() {
        assert_eq!(parse_price("29.99", PriceFormat::Machine), Some(d("29.99")));
        assert_eq!(parse_price("1,299.50", PriceFormat::Machine), Some(d("1299.50")));
    }

    #[test]
    fn spaces_inside_number_are_grouping() {
        assert_eq!(parse_price("1 299,00 €", PriceFormat::European), Some(d("1299.00")));
    }

    #[test]
    fn only_first_price_is_taken() {
        assert_eq!(
            parse_price("Antes: 39,99 € Ahora 29,99 €", PriceFormat::European),
            Some(d("39.99"))
        );
    }

    #[test]
    fn text_without_digits_is_none() {
        assert_eq!(parse_price("Consultar precio", PriceFormat::European), None);
        assert_eq!(parse_price("", PriceFormat::Machine), None);
    }

    #[test]
    fn minor_units_are_scaled() {
        let price = RawPrice::MinorUnits {
            amount: "2999".to_owned(),
            minor_unit: 2,
        };
        assert_eq!(resolve_price(&price), Some(d("29.99")));
    }

    #[test]
    fn malformed_minor_units_are_none() {
        let price = RawPrice::MinorUnits {
            amount: "29.99".to_owned(),
            minor_unit: 2,
        };
        assert_eq!(resolve_price(&price), None);
    }
}
