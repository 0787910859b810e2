//! Display strings for dashboard figures.
//!
//! All output uses en-US conventions: `,` between thousands and `.` before
//! the fraction. Non-finite input renders as zero.

/// Plain count, up to three fraction digits, trailing zeros dropped.
///
/// # Examples
/// ```
/// use floor_dashboard::format::format_count;
///
/// assert_eq!(format_count(1234567.0), "1,234,567");
/// assert_eq!(format_count(-0.5), "-0.5");
/// assert_eq!(format_count(2.0004), "2");
/// ```
pub fn format_count(value: f64) -> String {
    let (negative, body) = count_body(value);
    if negative {
        format!("-{}", body)
    } else {
        body
    }
}

/// Dollar amount with the same precision as [`format_count`].
///
/// Used for per-day values in the floor tables.
pub fn format_dollar(value: f64) -> String {
    let (negative, body) = count_body(value);
    if negative {
        format!("-${}", body)
    } else {
        format!("${}", body)
    }
}

/// Whole US dollars, halves rounded away from zero.
///
/// # Examples
/// ```
/// use floor_dashboard::format::format_currency;
///
/// assert_eq!(format_currency(1234.5), "$1,235");
/// assert_eq!(format_currency(-98000.0), "-$98,000");
/// ```
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return "$0".to_string();
    }
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let grouped = group_thousands(&digits);
    if rounded < 0.0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

fn count_body(value: f64) -> (bool, String) {
    if !value.is_finite() {
        return (false, "0".to_string());
    }

    let fixed = format!("{:.3}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut body = group_thousands(int_part);
    if !frac_part.is_empty() {
        body.push('.');
        body.push_str(frac_part);
    }

    // -0.0001 rounds to zero; don't print "-0".
    let negative = value < 0.0 && body != "0";
    (negative, body)
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    let lead = digits.len() % 3;

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - lead) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    grouped
}
