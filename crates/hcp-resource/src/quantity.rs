//! Quantity strings (`"500m"`, `"1.5"`, `"2Gi"`) to integers and back.
//!
//! Parsing uses exact integer arithmetic on the decimal digits so that
//! `"1.1"` CPU is 1100 millicores, not 1101 after float rounding.

use crate::error::{ResourceError, ResourceResult};

const MAX_DIGITS: usize = 30;

/// Parse a quantity into base units, rounding up.
pub fn parse_quantity(s: &str) -> ResourceResult<i64> {
    scaled(s, 1)
}

/// Parse a quantity into thousandths of a unit, rounding up.
///
/// Used for CPU: `"500m"` → 500, `"2"` → 2000.
pub fn parse_milli_quantity(s: &str) -> ResourceResult<i64> {
    scaled(s, 1000)
}

/// Suffix → (numerator, denominator) multiplier.
fn suffix_ratio(suffix: &str) -> Option<(i128, i128)> {
    let ratio: (i128, i128) = match suffix {
        "" => (1, 1),
        "m" => (1, 1000),
        "k" => (1_000, 1),
        "M" => (1_000_000, 1),
        "G" => (1_000_000_000, 1),
        "T" => (1_000_000_000_000, 1),
        "P" => (1_000_000_000_000_000, 1),
        "E" => (1_000_000_000_000_000_000, 1),
        "Ki" => (1 << 10, 1),
        "Mi" => (1 << 20, 1),
        "Gi" => (1 << 30, 1),
        "Ti" => (1 << 40, 1),
        "Pi" => (1 << 50, 1),
        "Ei" => (1 << 60, 1),
        _ => return None,
    };
    Some(ratio)
}

fn scaled(s: &str, factor: i128) -> ResourceResult<i64> {
    let invalid = || ResourceError::InvalidQuantity(s.to_string());

    let trimmed = s.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(trimmed.len());
    let (number, suffix) = trimmed.split_at(split);
    let (num, den) = suffix_ratio(suffix).ok_or_else(invalid)?;

    let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
    let digits = format!("{whole}{frac}");
    if digits.is_empty() || digits.len() > MAX_DIGITS {
        return Err(invalid());
    }
    let mantissa: i128 = digits.parse().map_err(|_| invalid())?;

    let scale = 10i128.checked_pow(frac.len() as u32).ok_or_else(invalid)?;
    let numerator = mantissa
        .checked_mul(num)
        .and_then(|v| v.checked_mul(factor))
        .ok_or_else(invalid)?;
    let denominator = scale.checked_mul(den).ok_or_else(invalid)?;
    let value = (numerator + denominator - 1) / denominator;

    i64::try_from(value).map_err(|_| invalid())
}

/// Format millicores: whole cores as `"2"`, otherwise `"1500m"`.
pub fn format_cpu(milli_cpu: i64) -> String {
    if milli_cpu % 1000 == 0 {
        format!("{}", milli_cpu / 1000)
    } else {
        format!("{milli_cpu}m")
    }
}

/// Format bytes with a binary suffix.
pub fn format_bytes(bytes: i64) -> String {
    const KI: i64 = 1024;
    const MI: i64 = KI * 1024;
    const GI: i64 = MI * 1024;

    if bytes >= GI {
        format!("{:.2}Gi", bytes as f64 / GI as f64)
    } else if bytes >= MI {
        format!("{:.2}Mi", bytes as f64 / MI as f64)
    } else if bytes >= KI {
        format!("{:.2}Ki", bytes as f64 / KI as f64)
    } else {
        format!("{bytes}")
    }
}
