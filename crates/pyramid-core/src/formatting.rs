/// Render `value` with comma thousands separators and `decimals` fraction
/// digits.
///
/// # Examples
///
/// ```
/// use pyramid_core::formatting::format_number;
///
/// assert_eq!(format_number(4372.0, 0), "4,372");
/// assert_eq!(format_number(279489.02, 2), "279,489.02");
/// assert_eq!(format_number(-250.5, 2), "-250.50");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let fixed = format!("{:.prec$}", value.abs(), prec = decimals as usize);
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::with_capacity(fixed.len() + fixed.len() / 3 + 1);
    // "-0.00" would read oddly; only show the sign for a non-zero result.
    if value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Format a monetary amount with two decimal places and thousands separators.
///
/// # Examples
///
/// ```
/// use pyramid_core::formatting::format_currency;
///
/// assert_eq!(format_currency(17850.4), "$17,850.40");
/// assert_eq!(format_currency(-12.5), "$-12.50");
/// ```
pub fn format_currency(amount: f64) -> String {
    format!("${}", format_number(amount, 2))
}

/// Share of `part` in `whole` as a percentage, rounded to `decimal_places`.
///
/// Returns `0.0` if `whole` is zero.
///
/// # Examples
///
/// ```
/// use pyramid_core::formatting::percentage;
///
/// assert_eq!(percentage(15.0, 100.0, 1), 15.0);
/// assert_eq!(percentage(1.0, 0.0, 1), 0.0);
/// ```
pub fn percentage(part: f64, whole: f64, decimal_places: u32) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    let scale = 10_f64.powi(decimal_places as i32);
    (part * 100.0 / whole * scale).round() / scale
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// `"1234567"` → `"1,234,567"`.
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────
