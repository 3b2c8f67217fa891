use chrono::{DateTime, Duration, Utc, Weekday};

use crate::database::models::MonitoringSettings;

/// Minimum spacing between probes of a single endpoint, selected by the day
/// the sweep started. The weekend/weekday decision is made once per sweep
/// from the sweep's start time, not recomputed per endpoint.
pub fn effective_interval(settings: &MonitoringSettings, sweep_day: Weekday) -> Duration {
    let minutes = match sweep_day {
        Weekday::Sat | Weekday::Sun => settings.interval_weekend_minutes,
        _ => settings.interval_weekday_minutes,
    };
    Duration::minutes(minutes)
}

/// Whether an endpoint is due for a new probe. Never-checked endpoints are
/// always due.
pub fn is_due(last_checked_at: Option<DateTime<Utc>>, now: DateTime<Utc>, interval: Duration) -> bool {
    match last_checked_at {
        None => true,
        Some(checked) => now - checked >= interval,
    }
}
