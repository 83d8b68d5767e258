//! Human-readable sizes and counts
//!
//! Sizes are measured in bits but shown in bytes with binary prefixes
//! ("5.00 MiB"); counts use decimal prefixes ("100 k"). Parsing is exact:
//! "1.5 KiB" is 12288 bits, while "5.3 b" is rejected as non-integral.

/// Binary size units above bytes
const SIZE_UNITS: [&str; 8] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];

/// Decimal count units above one
const COUNT_UNITS: [&str; 8] = ["k", "M", "G", "T", "P", "E", "Z", "Y"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitError {
    #[error("could not parse a quantity from '{0}'")]
    Malformed(String),

    #[error("invalid unit: {0}")]
    InvalidUnit(String),

    #[error("value is not an integer: {0}")]
    NotIntegral(String),

    #[error("value is too large: {0}")]
    Overflow(String),
}

/// Repeatedly divide by `threshold`, stopping once the value shown with `dp`
/// decimals drops below the threshold or the units run out.
fn scale(mut value: f64, threshold: f64, units: usize, dp: usize) -> (f64, usize) {
    let r = 10f64.powi(dp as i32);
    let mut unit = 0;
    value /= threshold;
    while (value.abs() * r).round() / r >= threshold && unit < units - 1 {
        value /= threshold;
        unit += 1;
    }
    (value, unit)
}

/// Format bits as human-readable text, e.g. `7 b`, `2 B`, `1.46 KiB`
pub fn format_bits(bits: u64, dp: usize) -> String {
    if bits < 8 {
        return format!("{} b", bits);
    }

    let bytes = bits as f64 / 8.0;
    if bytes < 1024.0 {
        return format!("{} B", bytes);
    }

    let (size, unit) = scale(bytes, 1024.0, SIZE_UNITS.len(), dp);
    format!("{:.*} {}", dp, size, SIZE_UNITS[unit])
}

/// Format a count as human-readable text, e.g. `16`, `1.46 k`, `3.00 M`
pub fn format_count(count: u64, dp: usize) -> String {
    if count < 1000 {
        return count.to_string();
    }

    let (value, unit) = scale(count as f64, 1000.0, COUNT_UNITS.len(), dp);
    format!("{:.*} {}", dp, value, COUNT_UNITS[unit])
}

/// Split `<digits>[.<digits>]<ws><unit>` into integer digits, fraction digits and unit.
fn split_quantity(input: &str) -> Result<(&str, &str, &str), UnitError> {
    let malformed = || UnitError::Malformed(input.to_string());
    let s = input.trim();

    let int_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (int_part, rest) = s.split_at(int_end);
    if int_part.is_empty() {
        return Err(malformed());
    }

    let (frac_part, rest) = match rest.strip_prefix('.') {
        Some(after_dot) => {
            let frac_end = after_dot
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(after_dot.len());
            after_dot.split_at(frac_end)
        }
        None => ("", rest),
    };

    let unit = rest.trim_start();
    if unit.chars().any(|c| !c.is_ascii_alphabetic()) {
        return Err(malformed());
    }
    Ok((int_part, frac_part, unit))
}

/// Compute `int.frac * multiplier` exactly, rejecting non-integral results.
fn apply_multiplier(
    input: &str,
    int_part: &str,
    frac_part: &str,
    multiplier: u128,
) -> Result<u64, UnitError> {
    let overflow = || UnitError::Overflow(input.to_string());

    let digits = format!("{}{}", int_part, frac_part);
    let mantissa: u128 = digits.parse().map_err(|_| overflow())?;
    let scale = 10u128
        .checked_pow(frac_part.len() as u32)
        .ok_or_else(overflow)?;

    let product = mantissa.checked_mul(multiplier).ok_or_else(overflow)?;
    if product % scale != 0 {
        return Err(UnitError::NotIntegral(input.to_string()));
    }
    u64::try_from(product / scale).map_err(|_| overflow())
}

/// Parse bits from human-readable text.
///
/// Units: none or `b` for bits, `B` for bytes, `KiB` through `YiB`.
pub fn parse_bits(input: &str) -> Result<u64, UnitError> {
    let (int_part, frac_part, unit) = split_quantity(input)?;

    let multiplier: u128 = match unit {
        "" | "b" => 1,
        "B" => 8,
        _ => {
            let index = SIZE_UNITS
                .iter()
                .position(|u| *u == unit)
                .ok_or_else(|| UnitError::InvalidUnit(unit.to_string()))?;
            8 * 1024u128.pow(index as u32 + 1)
        }
    };

    apply_multiplier(input, int_part, frac_part, multiplier)
}

/// Parse a count from human-readable text.
///
/// Units (case-insensitive): none, `k`, `M`, `G`, `T`, `P`, `E`, `Z`, `Y`.
pub fn parse_count(input: &str) -> Result<u64, UnitError> {
    let (int_part, frac_part, unit) = split_quantity(input)?;

    let multiplier: u128 = if unit.is_empty() {
        1
    } else {
        let index = COUNT_UNITS
            .iter()
            .position(|u| u.eq_ignore_ascii_case(unit))
            .ok_or_else(|| UnitError::InvalidUnit(unit.to_string()))?;
        1000u128.pow(index as u32 + 1)
    };

    apply_multiplier(input, int_part, frac_part, multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bits() {
        let cases: [(u64, &str); 6] = [
            (7, "7 b"),
            (16, "2 B"),
            (20, "2.5 B"),
            (3 * 8 * 1024u64.pow(2), "3.00 MiB"),
            (12 * 8 * 1024, "12.00 KiB"),
            (1023 * 8 * 1024u64.pow(5), "1023.00 PiB"),
        ];
        for (bits, want) in cases {
            assert_eq!(format_bits(bits, 2), want, "formatting {}", bits);
        }
    }

    #[test]
    fn test_format_bits_rolls_over_on_rounding() {
        // 1023.999 KiB shows as 1024.00 with two decimals, so move to MiB
        let bits = (1023.999 * 8.0 * 1024.0) as u64;
        assert_eq!(format_bits(bits, 2), "1.00 MiB");
    }

    #[test]
    fn test_format_bits_decimal_places() {
        let bits = 13_194_139; // ~1.5728 MiB
        assert_eq!(format_bits(bits, 0), "2 MiB");
        assert_eq!(format_bits(bits, 1), "1.6 MiB");
        assert_eq!(format_bits(bits, 2), "1.57 MiB");
        assert_eq!(format_bits(bits, 3), "1.573 MiB");
    }

    #[test]
    fn test_format_count() {
        let cases: [(u64, &str); 5] = [
            (16, "16"),
            (999, "999"),
            (1460, "1.46 k"),
            (3_000_000, "3.00 M"),
            (7 * 1000u64.pow(6), "7.00 E"),
        ];
        for (count, want) in cases {
            assert_eq!(format_count(count, 2), want, "formatting {}", count);
        }
    }

    #[test]
    fn test_format_count_decimal_places() {
        let count = 1_572_800;
        assert_eq!(format_count(count, 0), "2 M");
        assert_eq!(format_count(count, 1), "1.6 M");
        assert_eq!(format_count(count, 2), "1.57 M");
        assert_eq!(format_count(count, 3), "1.573 M");
        assert_eq!(format_count(count, 4), "1.5728 M");
        assert_eq!(format_count(count, 5), "1.57280 M");
    }

    #[test]
    fn test_parse_bits() {
        let cases: [(&str, u64); 10] = [
            ("29", 29),
            ("29 b", 29),
            ("29b", 29),
            ("3 B", 24),
            ("38 KiB", 38 * 8 * 1024),
            ("38KiB", 38 * 8 * 1024),
            ("38  KiB", 38 * 8 * 1024),
            ("38000 KiB", 38000 * 8 * 1024),
            ("53.5 GiB", 107 * 4 * 1024u64.pow(3)),
            ("53. GiB", 53 * 8 * 1024u64.pow(3)),
        ];
        for (input, want) in cases {
            assert_eq!(parse_bits(input), Ok(want), "parsing {:?}", input);
        }
    }

    #[test]
    fn test_parse_bits_rejects() {
        assert!(matches!(parse_bits("1a4"), Err(UnitError::Malformed(_))));
        assert!(matches!(parse_bits("KiB"), Err(UnitError::Malformed(_))));
        assert!(matches!(parse_bits("5 OiB"), Err(UnitError::InvalidUnit(_))));
        assert!(matches!(parse_bits("5.3 b"), Err(UnitError::NotIntegral(_))));
        assert!(matches!(
            parse_bits("5.25642 KiB"),
            Err(UnitError::NotIntegral(_))
        ));
        assert!(matches!(parse_bits("7 YiB"), Err(UnitError::Overflow(_))));
    }

    #[test]
    fn test_parse_count() {
        let cases: [(&str, u64); 8] = [
            ("29", 29),
            ("38 k", 38_000),
            ("38k", 38_000),
            ("38  k", 38_000),
            ("38000 K", 38_000_000),
            ("53.27 G", 53_270_000_000),
            ("53. G", 53_000_000_000),
            ("1m", 1_000_000),
        ];
        for (input, want) in cases {
            assert_eq!(parse_count(input), Ok(want), "parsing {:?}", input);
        }
    }

    #[test]
    fn test_parse_count_rejects() {
        assert!(matches!(parse_count("1a4"), Err(UnitError::Malformed(_))));
        assert!(matches!(parse_count("5 O"), Err(UnitError::InvalidUnit(_))));
        assert!(matches!(parse_count("5.3"), Err(UnitError::NotIntegral(_))));
        assert!(matches!(
            parse_count("5.2564 k"),
            Err(UnitError::NotIntegral(_))
        ));
        assert!(matches!(parse_count("20 E"), Err(UnitError::Overflow(_))));
    }

    #[test]
    fn test_format_parse_agree() {
        assert_eq!(parse_bits(&format_bits(3 * 8 * 1024u64.pow(2), 2)), Ok(3 * 8 * 1024u64.pow(2)));
        assert_eq!(parse_count(&format_count(3_000_000, 2)), Ok(3_000_000));
    }
}
