use std::time::{SystemTime, UNIX_EPOCH};

/// Return the current unix timestamp in fractional seconds.
pub fn now_unix_secs_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |duration| duration.as_secs_f64())
}
