/// Placeholder printed for an undefined statistic.
pub const UNDEFINED: &str = "-";

/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use engagement_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5,  1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let negative = value < 0.0;
    let abs_value = value.abs();

    // Nudge by half an ULP at the target precision so exact binary midpoints
    // round the way they read in decimal.
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + epsilon).round() / factor;

    let integer_part = rounded.trunc() as u64;
    let frac_part = rounded - rounded.trunc();
    let grouped = group_thousands(&integer_part.to_string());

    let result = if decimals == 0 {
        grouped
    } else {
        // `frac_str` starts with "0.", e.g. "0.50".
        let frac_str = format!("{:.prec$}", frac_part, prec = decimals as usize);
        format!("{}{}", grouped, &frac_str[1..])
    };

    if negative && rounded != 0.0 {
        format!("-{}", result)
    } else {
        result
    }
}

/// Format a playtime in hours, e.g. `"1,234.5h"`.
///
/// ```
/// use engagement_core::formatting::format_hours;
///
/// assert_eq!(format_hours(1234.46), "1,234.5h");
/// assert_eq!(format_hours(0.0), "0.0h");
/// ```
pub fn format_hours(hours: f64) -> String {
    format!("{}h", format_number(hours, 1))
}

/// Format a `[0, 1]` share as a percentage, e.g. `0.425` → `"42.5%"`.
///
/// ```
/// use engagement_core::formatting::format_rate;
///
/// assert_eq!(format_rate(0.425, 1), "42.5%");
/// assert_eq!(format_rate(1.0, 0), "100%");
/// ```
pub fn format_rate(rate: f64, decimals: u32) -> String {
    format!("{}%", format_number(rate * 100.0, decimals))
}

/// Format an optional statistic, printing [`UNDEFINED`] for `None`.
pub fn format_optional(value: Option<f64>, decimals: u32) -> String {
    match value {
        Some(v) if v.is_finite() => format_number(v, decimals),
        _ => UNDEFINED.to_string(),
    }
}

/// Right-align `text` in a column `width` characters wide.
pub fn pad_left(text: &str, width: usize) -> String {
    format!("{:>width$}", text, width = width)
}

/// Shorten `text` to at most `max` characters, marking the cut with `…`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", kept)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── format_number ────────────────────────────────────────────────────────

    #[test]
    fn test_format_number_zero() {
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_number(0.0, 2), "0.00");
    }

    #[test]
    fn test_format_number_with_thousands() {
        assert_eq!(format_number(1_234.5, 1), "1,234.5");
        assert_eq!(format_number(1_234_567.0, 0), "1,234,567");
    }

    #[test]
    fn test_format_number_negative() {
        assert_eq!(format_number(-9_876.5, 1), "-9,876.5");
    }

    #[test]
    fn test_format_number_negative_rounding_to_zero() {
        assert_eq!(format_number(-0.001, 1), "0.0");
    }

    #[test]
    fn test_format_number_rounds_up() {
        assert_eq!(format_number(1.005, 2), "1.01");
    }

    // ── hours / rates ────────────────────────────────────────────────────────

    #[test]
    fn test_format_hours() {
        assert_eq!(format_hours(12_345.04), "12,345.0h");
        assert_eq!(format_hours(0.25), "0.3h");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(0.5, 1), "50.0%");
        assert_eq!(format_rate(0.0, 2), "0.00%");
        assert_eq!(format_rate(0.3333, 1), "33.3%");
    }

    // ── format_optional ──────────────────────────────────────────────────────

    #[test]
    fn test_format_optional() {
        assert_eq!(format_optional(Some(2.5), 2), "2.50");
        assert_eq!(format_optional(None, 2), UNDEFINED);
        assert_eq!(format_optional(Some(f64::NAN), 2), UNDEFINED);
    }

    // ── layout helpers ───────────────────────────────────────────────────────

    #[test]
    fn test_pad_left() {
        assert_eq!(pad_left("42", 5), "   42");
        assert_eq!(pad_left("123456", 3), "123456");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Dota 2", 10), "Dota 2");
        assert_eq!(truncate("The Elder Scrolls V Skyrim", 10), "The Elder…");
    }
}
