//! Unit conversions for queue rates and human-readable totals.

/// Bytes per second in one declared "Mbps" of a billing plan.
pub const BYTES_PER_MBPS: f64 = 1_000_000.0;

/// Bytes in one "KB" of a plan burst allowance.
pub const BYTES_PER_KB: f64 = 1_000.0;

/// Significant digits kept when rendering a float.
const SIGNIFICANT_DIGITS: i32 = 14;

const MAGNITUDE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

pub fn mbps_to_bytes(mbps: f64) -> f64 {
    mbps * BYTES_PER_MBPS
}

pub fn kb_to_bytes(kb: f64) -> f64 {
    kb * BYTES_PER_KB
}

/// Render a number as a plain decimal string: no exponent, no grouping,
/// no trailing zeros, at most 14 significant digits.
///
/// `10_000_000.0` → `"10000000"`, `2.5` → `"2.5"`, `0.1 * 3.0` → `"0.3"`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
pub fn format_decimal(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return "0".into();
    }

    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (SIGNIFICANT_DIGITS - 1 - magnitude).clamp(0, 17) as usize;
    let mut out = format!("{value:.decimals$}");

    if out.contains('.') {
        let trimmed = out.trim_end_matches('0').trim_end_matches('.').len();
        out.truncate(trimmed);
    }
    if out == "-0" {
        out = "0".into();
    }
    out
}

/// Magnitude-scaled total for summary logs: rounds to an integer, then
/// divides by 1000 while the value exceeds 1000.
///
/// `12_345_678.0` → `"12.345678MB"`. Past terabytes the unit is `" ?"`.
pub fn format_magnitude(value: f64) -> String {
    let mut scaled = value.round();
    let mut steps = 0usize;
    while scaled > 1000.0 {
        scaled /= 1000.0;
        steps += 1;
    }

    match MAGNITUDE_UNITS.get(steps) {
        Some(unit) => format!("{}{unit}", format_decimal(scaled)),
        None => format!("{} ?", format_decimal(scaled)),
    }
}
