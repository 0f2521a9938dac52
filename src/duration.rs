//! Parsing of human-readable intervals for command-line options.

use std::time::Duration;

/// Parse a positive interval such as `1s`, `500ms`, `2m` or `1h`.
///
/// A bare number is read as seconds.
///
/// # Examples
/// ```
/// use radio_bridge::duration::parse_interval;
/// use std::time::Duration;
///
/// assert_eq!(parse_interval("3s").unwrap(), Duration::from_secs(3));
/// assert_eq!(parse_interval("500ms").unwrap(), Duration::from_millis(500));
/// assert_eq!(parse_interval("2").unwrap(), Duration::from_secs(2));
/// ```
pub fn parse_interval(src: &str) -> Result<Duration, String> {
    let src = src.trim();
    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    let digits_end = src
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(src.len());
    let (number, unit) = src.split_at(digits_end);

    let amount: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {src}"))?;

    let duration = match unit.trim() {
        "ms" => Duration::from_millis(amount),
        "" | "s" => Duration::from_secs(amount),
        "m" => Duration::from_secs(amount.saturating_mul(60)),
        "h" => Duration::from_secs(amount.saturating_mul(3600)),
        other => return Err(format!("unknown unit '{other}' in duration: {src}")),
    };

    if duration.is_zero() {
        return Err(format!("duration must be greater than zero: {src}"));
    }

    Ok(duration)
}
