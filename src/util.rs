use std::path::Path;

use uuid::Uuid;

use crate::types::BPS_SCALE;

/// Generate a prefixed record id, e.g. `pay-6f1c…`.
pub fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

/// Compute `amount × numerator / denominator`, rounding half away from zero.
///
/// Intermediate math is done in `i128` so large fund amounts cannot overflow.
/// Results outside `i64` saturate. A zero denominator yields 0.
pub fn mul_div_round(amount: i64, numerator: i64, denominator: i64) -> i64 {
    if denominator == 0 {
        return 0;
    }
    let product = amount as i128 * numerator as i128;
    let den = denominator as i128;
    let magnitude = (product.abs() * 2 + den.abs()) / (den.abs() * 2);
    let signed = if (product < 0) != (den < 0) {
        -magnitude
    } else {
        magnitude
    };
    signed.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Apply a basis-point rate to an amount, rounding to the nearest unit.
///
/// `apply_bps(100_000, 500) == 5_000`
pub fn apply_bps(amount: i64, bps: u32) -> i64 {
    mul_div_round(amount, bps as i64, BPS_SCALE as i64)
}

/// Lowercase, hyphen-separated form of a name.
///
/// Example: "Iyer Family" → "iyer-family"
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Write a file by writing a sibling temp file and renaming it into place.
pub fn atomic_write_str(path: &Path, content: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)
}
