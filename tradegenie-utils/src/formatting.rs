use crate::risk::PositionSize;

/// Format seconds as the two most significant units (e.g. `59s`, `1h 1m`, `2d 3h`).
pub fn format_compact_duration(total_seconds: u64) -> String {
    const UNITS: [(u64, &str); 4] = [(86_400, "d"), (3_600, "h"), (60, "m"), (1, "s")];

    let mut remaining = total_seconds;
    let mut parts = Vec::with_capacity(2);

    for (unit_seconds, suffix) in UNITS {
        let count = remaining / unit_seconds;
        remaining %= unit_seconds;

        if count > 0 {
            parts.push(format!("{count}{suffix}"));
        } else if !parts.is_empty() {
            // Stop at the first gap so `1h 0m 5s` renders as `1h`.
            break;
        }

        if parts.len() == 2 {
            break;
        }
    }

    if parts.is_empty() {
        "0s".to_owned()
    } else {
        parts.join(" ")
    }
}

/// One-line summary of a sizing result for chat replies.
pub fn format_position_summary(asset: &str, size: &PositionSize) -> String {
    format!(
        "{}: {:.2} lots (risking {:.2}, {:.2} per lot)",
        asset.trim().to_ascii_uppercase(),
        size.lots,
        size.risk_amount,
        size.risk_per_lot
    )
}
