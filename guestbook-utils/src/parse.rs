use std::time::Duration;

/// Parse a compact duration token like `30s`, `10m`, `2h`, `1d`, `1h30m`, or plain seconds.
///
/// A bare number is only accepted on its own; once a unit segment appears every
/// segment needs a unit.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let compact: String = raw.chars().filter(|ch| !ch.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    if compact.bytes().all(|byte| byte.is_ascii_digit()) {
        let seconds = compact.parse::<u64>().ok().filter(|value| *value > 0)?;
        return Some(Duration::from_secs(seconds));
    }

    let mut total_seconds = 0_u64;
    let mut digits = String::new();

    for ch in compact.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }

        let multiplier = match ch.to_ascii_lowercase() {
            's' => 1_u64,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 60 * 60 * 24,
            _ => return None,
        };

        let number = digits.parse::<u64>().ok().filter(|value| *value > 0)?;
        digits.clear();
        total_seconds = total_seconds.checked_add(number.checked_mul(multiplier)?)?;
    }

    if !digits.is_empty() || total_seconds == 0 {
        return None;
    }

    Some(Duration::from_secs(total_seconds))
}

/// Parse a boolean switch such as `1`, `true`, `yes`, `on` (and their negatives).
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
