//! Display helpers for popularity metrics.
use crate::numbers::u64_to_f64;

const SUFFIXES: [(u64, &str); 3] = [
    (1_000_000_000, "B"),
    (1_000_000, "M"),
    (1_000, "K"),
];

/// Compact metric: `1234 -> "1.2K"`, `1234567 -> "1.2M"`, `1234567890 -> "1.2B"`.
///
/// One decimal place, with a trailing `.0` dropped. Values under a thousand
/// are comma grouped like [`format_with_commas`].
#[must_use]
pub fn format_compact(metric: u64) -> String {
    for (scale, suffix) in SUFFIXES {
        if metric >= scale {
            let scaled = format!("{:.1}", u64_to_f64(metric) / u64_to_f64(scale));
            let trimmed = scaled.strip_suffix(".0").unwrap_or(&scaled);
            return format!("{trimmed}{suffix}");
        }
    }
    format_with_commas(metric)
}

/// Metric with thousands separators: `1234567 -> "1,234,567"`.
#[must_use]
pub fn format_with_commas(metric: u64) -> String {
    let digits = metric.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
