//! Parsing of command-line durations and permission modes

use std::time::Duration;

/// Parse a duration such as `500ms`, `2s`, `1.5m`, or a bare number of seconds
///
/// # Errors
///
/// Returns a message describing the problem if the string is empty, negative,
/// not a number, or uses an unknown suffix.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }

    let split = input
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(input.len());
    let (number, unit) = input.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration '{}'", input))?;

    let secs = match unit {
        "ms" => value / 1000.0,
        "" | "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        other => return Err(format!("unknown duration suffix '{}'", other)),
    };

    Duration::try_from_secs_f64(secs)
        .map_err(|_| format!("duration out of range '{}'", input))
}

/// Parse octal permission bits: `644`, `0644`, or `0o644`
///
/// # Errors
///
/// Returns a message if the string is not octal or sets bits above `0o7777`.
pub fn parse_mode(input: &str) -> Result<u32, String> {
    let digits = input.trim();
    let digits = digits.strip_prefix("0o").unwrap_or(digits);
    let mode =
        u32::from_str_radix(digits, 8).map_err(|_| format!("invalid octal mode '{}'", input))?;
    if mode > 0o7777 {
        return Err(format!("mode out of range '{}'", input));
    }
    Ok(mode)
}
