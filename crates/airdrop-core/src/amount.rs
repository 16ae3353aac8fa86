//! Token Amount Formatting
//!
//! Exact-decimal conversion between base-unit amounts and display strings
//! at a fixed 18 decimal places. All arithmetic is on decimal digit
//! strings over `U256`; floating point is never involved, so no amount is
//! ever rounded or rendered in scientific notation.

use alloy::primitives::U256;

/// Decimal places of the token. Must match the deployed token contract.
pub const DECIMALS: usize = 18;

/// Format a base-unit amount as a decimal string.
///
/// Zero-pads the decimal rendering to `DECIMALS + 1` digits, splits at the
/// fixed boundary, strips trailing fractional zeros, and omits the point
/// entirely when the fraction is empty.
#[must_use]
pub fn format_amount(amount: U256) -> String {
    let rendered = amount.to_string();
    let digits = format!("{rendered:0>width$}", width = DECIMALS + 1);
    let split = digits.len() - DECIMALS;
    let integer = &digits[..split];
    let fraction = digits[split..].trim_end_matches('0');

    if fraction.is_empty() {
        integer.to_string()
    } else {
        format!("{integer}.{fraction}")
    }
}

/// Parse a decimal string into a base-unit amount.
///
/// Accepts either `.` or `,` as the decimal separator. The fraction is
/// padded (or truncated) to exactly `DECIMALS` digits. Returns `None` on
/// any non-numeric input — signs, multiple separators, stray characters,
/// or an empty string — so callers can tell "nothing entered" from zero.
#[must_use]
pub fn parse_amount(text: &str) -> Option<U256> {
    let normalized = text.replace(',', ".");
    let mut parts = normalized.splitn(2, '.');
    let integer = parts.next().unwrap_or("");
    let fraction = parts.next().unwrap_or("");

    if fraction.contains('.') {
        return None;
    }
    if integer.is_empty() && fraction.is_empty() {
        return None;
    }
    if !integer.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let mut padded = fraction.to_string();
    padded.truncate(DECIMALS);
    while padded.len() < DECIMALS {
        padded.push('0');
    }

    let combined = format!("{integer}{padded}");
    U256::from_str_radix(&combined, 10).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn wei(s: &str) -> U256 {
        U256::from_str_radix(s, 10).unwrap()
    }

    #[test]
    fn test_format_whole_tokens() {
        assert_eq!(format_amount(wei("1000000000000000000")), "1");
        assert_eq!(format_amount(wei("25000000000000000000")), "25");
    }

    #[test]
    fn test_format_fractional() {
        assert_eq!(format_amount(wei("1500000000000000000")), "1.5");
        assert_eq!(format_amount(U256::from(1u64)), "0.000000000000000001");
        assert_eq!(
            format_amount(wei("123456789012345678")),
            "0.123456789012345678"
        );
    }

    #[test]
    fn test_format_zero() {
        assert_eq!(format_amount(U256::ZERO), "0");
    }

    #[test]
    fn test_format_no_trailing_point_or_leading_zeros() {
        for raw in ["0", "1", "1000000000000000000", "123456789012345678"] {
            let formatted = format_amount(wei(raw));
            assert!(!formatted.ends_with('.'), "{formatted}");
            let integer = formatted.split('.').next().unwrap();
            assert!(
                integer == "0" || !integer.starts_with('0'),
                "redundant leading zero in {formatted}"
            );
        }
    }

    #[test]
    fn test_parse_whole_and_fractional() {
        assert_eq!(parse_amount("1"), Some(wei("1000000000000000000")));
        assert_eq!(parse_amount("1.5"), Some(wei("1500000000000000000")));
        assert_eq!(parse_amount("0.000000000000000001"), Some(U256::from(1u64)));
    }

    #[test]
    fn test_parse_comma_separator() {
        assert_eq!(parse_amount("1,5"), Some(wei("1500000000000000000")));
    }

    #[test]
    fn test_parse_bare_fraction() {
        assert_eq!(parse_amount(".5"), Some(wei("500000000000000000")));
    }

    #[test]
    fn test_parse_excess_precision_truncates() {
        // 19th fractional digit is below base-unit resolution.
        assert_eq!(
            parse_amount("0.0000000000000000019"),
            Some(U256::from(1u64))
        );
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        for bad in ["", "abc", "1.2.3", "-1", "+1", "1e18", " 1", "1 ", "1,000.5"] {
            assert_eq!(parse_amount(bad), None, "accepted {bad:?}");
        }
    }

    #[test]
    fn test_round_trip_known_vectors() {
        for raw in ["0", "1", "1000000000000000000", "123456789012345678"] {
            let x = wei(raw);
            assert_eq!(parse_amount(&format_amount(x)), Some(x));
        }
    }

    proptest! {
        #[test]
        fn prop_round_trip(x in any::<u128>()) {
            let x = U256::from(x);
            prop_assert_eq!(parse_amount(&format_amount(x)), Some(x));
        }

        #[test]
        fn prop_format_shape(x in any::<u128>()) {
            let formatted = format_amount(U256::from(x));
            prop_assert!(!formatted.ends_with('.'));
            prop_assert!(!formatted.starts_with('.'));
            let integer = formatted.split('.').next().unwrap();
            prop_assert!(integer == "0" || !integer.starts_with('0'));
        }
    }
}
