//! Human-readable rendering of values for check summaries.
//!
//! The output of these helpers is advisory text only.

/// Render a byte count with binary units, e.g. `"1.50 GB"`.
pub fn bytes(value: f64) -> String {
    const UNITS: [&str; 5] = ["B", "kB", "MB", "GB", "TB"];
    let mut scaled = value;
    let mut unit = 0;
    while scaled.abs() >= 1024.0 && unit < UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", value.round() as i64)
    } else {
        format!("{:.2} {}", scaled, UNITS[unit])
    }
}

/// Render a percentage with two decimals, e.g. `"70.00%"`.
pub fn percent(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Render a plain number with two decimals.
pub fn float(value: f64) -> String {
    format!("{:.2}", value)
}

/// Render a duration in seconds compactly, e.g. `"1 h 5 m"` or `"42 s"`.
pub fn age(seconds: f64) -> String {
    let secs = seconds.max(0.0).round() as u64;
    let (days, rest) = (secs / 86_400, secs % 86_400);
    let (hours, rest) = (rest / 3600, rest % 3600);
    let (minutes, secs) = (rest / 60, rest % 60);
    if days > 0 {
        format!("{} d {} h", days, hours)
    } else if hours > 0 {
        if minutes > 0 {
            format!("{} h {} m", hours, minutes)
        } else {
            format!("{} h", hours)
        }
    } else if minutes > 0 {
        if secs > 0 {
            format!("{} m {} s", minutes, secs)
        } else {
            format!("{} m", minutes)
        }
    } else {
        format!("{} s", secs)
    }
}
