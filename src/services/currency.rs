use rust_decimal::Decimal;
use std::str::FromStr;

/// Currencies rendered with a leading symbol; everything else falls back to
/// the ISO code prefix ("SEK 99.99").
fn symbol(currency: &str) -> Option<&'static str> {
    match currency {
        "USD" | "AUD" | "CAD" | "NZD" | "SGD" | "HKD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" | "CNY" => Some("¥"),
        _ => None,
    }
}

/// Format an amount for display in order comments, e.g. `$99.99` or
/// `SEK 99.99`. Always two decimal places, no digit grouping, so the value
/// survives a round-trip through [`parse`].
pub fn format(amount: Decimal, currency: &str) -> String {
    let amount = amount.round_dp(2);
    match symbol(currency) {
        Some(sym) => format!("{sym}{amount:.2}"),
        None => format!("{currency} {amount:.2}"),
    }
}

/// Parse an amount previously produced by [`format`]. Returns `None` for
/// strings that do not contain a decimal number.
pub fn parse(display: &str) -> Option<Decimal> {
    let numeric: String = display
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    Decimal::from_str(&numeric).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn formats_symbol_currencies() {
        assert_eq!(format(dec!(99.99), "USD"), "$99.99");
        assert_eq!(format(dec!(10), "EUR"), "€10.00");
        assert_eq!(format(dec!(0.5), "GBP"), "£0.50");
    }

    #[test]
    fn formats_code_currencies() {
        assert_eq!(format(dec!(123.4), "SEK"), "SEK 123.40");
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(format(dec!(10.005), "USD"), "$10.00");
        assert_eq!(format(dec!(10.015), "USD"), "$10.02");
    }

    #[test]
    fn round_trips_without_precision_loss() {
        for (amount, currency) in [
            (dec!(99.99), "USD"),
            (dec!(1234.50), "EUR"),
            (dec!(0.01), "SEK"),
            (dec!(100), "GBP"),
        ] {
            let display = format(amount, currency);
            let parsed = parse(&display).expect("formatted amount should parse");
            assert_eq!(parsed, amount.round_dp(2), "round-trip of {display}");
        }
    }

    #[test]
    fn parse_rejects_non_numeric() {
        assert!(parse("no amount here").is_none());
    }
}
