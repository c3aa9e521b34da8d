/// Environment variable readers with defaults.
pub mod env;
/// Compact duration and position-size formatting.
pub mod formatting;
/// PNG normalization and Base64 encoding for vision requests.
pub mod image;
/// Pure parser helpers (trade parameters, pip tables, durations).
pub mod parse;
/// Position sizing from account risk.
pub mod risk;
/// Shared time helpers.
pub mod time;
