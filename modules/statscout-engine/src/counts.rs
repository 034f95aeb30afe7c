//! Lenient parser for human-formatted counts ("12.3K", "1,204", "2M").
//!
//! Malformed input never errors; it reads as zero. Callers already treat
//! all-zero results as "no data found".

/// Parse a count token. Commas are thousands separators, a period is the
/// decimal point, and an optional trailing K/M/B (any case) scales the value.
/// Fractions left after scaling are truncated.
pub fn parse_count(raw: &str) -> u64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();

    let (number, multiplier) = match cleaned.chars().last() {
        Some('K') => (&cleaned[..cleaned.len() - 1], 1_000u64),
        Some('M') => (&cleaned[..cleaned.len() - 1], 1_000_000u64),
        Some('B') => (&cleaned[..cleaned.len() - 1], 1_000_000_000u64),
        _ => (cleaned.as_str(), 1u64),
    };

    scale_decimal(number, multiplier).unwrap_or(0)
}

/// `number * multiplier` computed on the decimal digits, so "4.35K" is
/// exactly 4350 rather than a float that truncates to 4349.
fn scale_decimal(number: &str, multiplier: u64) -> Option<u64> {
    let (whole, fraction) = match number.split_once('.') {
        Some((w, f)) => (w, f),
        None => (number, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole_value = if whole.is_empty() {
        0
    } else {
        whole.parse::<u64>().ok()?
    };
    let mut scaled = whole_value.checked_mul(multiplier)?;

    // Only as many fraction digits as the multiplier can resolve matter.
    let precision = multiplier.to_string().len() - 1;
    let kept: String = fraction.chars().take(precision).collect();
    if !kept.is_empty() {
        let digits = kept.parse::<u64>().ok()?;
        let unit = multiplier / 10u64.pow(kept.len() as u32);
        scaled = scaled.checked_add(digits.checked_mul(unit)?)?;
    }
    Some(scaled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_comma_grouped_numbers() {
        assert_eq!(parse_count("0"), 0);
        assert_eq!(parse_count("842"), 842);
        assert_eq!(parse_count("1,200"), 1200);
        assert_eq!(parse_count("1,204"), 1204);
        assert_eq!(parse_count(" 12,345,678 "), 12_345_678);
    }

    #[test]
    fn magnitude_suffixes_any_case() {
        assert_eq!(parse_count("1.5K"), 1500);
        assert_eq!(parse_count("1.5k"), 1500);
        assert_eq!(parse_count("12.3K"), 12_300);
        assert_eq!(parse_count("2M"), 2_000_000);
        assert_eq!(parse_count("2.3m"), 2_300_000);
        assert_eq!(parse_count("1B"), 1_000_000_000);
        assert_eq!(parse_count("1,234.5K"), 1_234_500);
    }

    #[test]
    fn suffix_math_is_exact() {
        assert_eq!(parse_count("4.35K"), 4350);
        assert_eq!(parse_count("1.0001K"), 1000);
        assert_eq!(parse_count(".5K"), 500);
    }

    #[test]
    fn fractions_without_suffix_truncate() {
        assert_eq!(parse_count("12.9"), 12);
        assert_eq!(parse_count("7."), 7);
    }

    #[test]
    fn malformed_input_reads_as_zero() {
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_count("   "), 0);
        assert_eq!(parse_count("K"), 0);
        assert_eq!(parse_count("abc"), 0);
        assert_eq!(parse_count("-5"), 0);
        assert_eq!(parse_count("1.2.3"), 0);
        assert_eq!(parse_count("12X"), 0);
        assert_eq!(parse_count("99999999999999999999B"), 0);
    }

    #[test]
    fn parsing_is_deterministic() {
        for s in ["1.5K", "1,200", "2M", "", "7b"] {
            assert_eq!(parse_count(s), parse_count(s));
        }
    }
}
