use chrono::{SecondsFormat, Utc};

/// Current time as RFC 3339 with millisecond precision
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Seconds since the Unix epoch, fractional
pub fn now_secs_f64() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Round to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
