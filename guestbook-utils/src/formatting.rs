use std::time::Duration;

/// Format a duration into a compact human-readable form (e.g. 59s, 1m, 1h 30m, 1d 2h).
///
/// Sub-second remainders are rounded up so a wait hint never reads `0s` while
/// the caller still has to wait.
pub fn format_compact_duration(duration: Duration) -> String {
    let mut total_seconds = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        total_seconds += 1;
    }

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    let parts: Vec<String> = if days > 0 {
        [(days, 'd'), (hours, 'h')]
            .into_iter()
            .filter(|(value, _)| *value > 0)
            .map(|(value, unit)| format!("{value}{unit}"))
            .collect()
    } else {
        [(hours, 'h'), (minutes, 'm'), (seconds, 's')]
            .into_iter()
            .filter(|(value, _)| *value > 0)
            .map(|(value, unit)| format!("{value}{unit}"))
            .collect()
    };

    if parts.is_empty() {
        "0s".to_owned()
    } else {
        parts.join(" ")
    }
}

/// User-facing hint shown when a caller has been rate limited.
pub fn format_wait_hint(retry_after: Duration) -> String {
    format!(
        "Too many messages. Try again in {}.",
        format_compact_duration(retry_after.max(Duration::from_secs(1)))
    )
}
