// ─────────────────────────────────────────────────────────────────────────────
// BigDecimal helpers
// ─────────────────────────────────────────────────────────────────────────────

use substreams::scalar::BigDecimal;

/// Check if a BigDecimal value is zero
#[inline]
pub fn is_zero(big_decimal: &BigDecimal) -> bool {
    big_decimal == &BigDecimal::zero()
}

/// Divide, returning zero instead of panicking on a zero denominator
pub fn safe_div(numerator: &BigDecimal, denominator: &BigDecimal) -> BigDecimal {
    if is_zero(denominator) {
        BigDecimal::zero()
    } else {
        numerator.clone() / denominator.clone()
    }
}

/// Format a BigDecimal to a string with at most 18 decimal places
/// Removes trailing zeros and decimal point if unnecessary
pub fn format_bigdecimal(big_decimal: &BigDecimal) -> String {
    let mut decimal_string = big_decimal.to_string();

    if let Some(decimal_point_index) = decimal_string.find('.') {
        // Truncate to maximum 18 decimal places
        let truncate_position = usize::min(decimal_point_index + 1 + 18, decimal_string.len());
        decimal_string.truncate(truncate_position);

        while decimal_string.ends_with('0') {
            decimal_string.pop();
        }

        if decimal_string.ends_with('.') {
            decimal_string.pop();
        }
    }

    if decimal_string.is_empty() {
        "0".into()
    } else {
        decimal_string
    }
}
